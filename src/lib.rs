//! A small line-oriented shell that runs pipelines of external programs.
//!
//! Each input line is split into `|`-separated commands, every command is
//! tokenized (whitespace separated, `'`/`"` grouping), the program names are
//! resolved against a list of search directories and the whole pipeline is
//! started with one child process per command. A single command may send its
//! output to a file with `cmd args > file`.
//!
//! The main entry point is [`Interpreter`], which also knows a handful of
//! built-in commands (`cd`, `path`, `exit`, ...) run inside the shell process.
//! The lower-level pieces are public so they can be driven on their own:
//! [`lexer`] and [`parser`] turn text into a [`parser::Pipeline`], and
//! [`exec::run_pipeline`] starts and reaps it.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod exec;
pub mod expand;
pub mod external;
mod interpreter;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod redirect;
pub mod signal;

/// Just a convenient re-export of the line interpreter.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, PROMPT};

pub use env::Environment;
pub use error::ShellError;
