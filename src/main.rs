use argh::FromArgs;
use log::{LevelFilter, info};
use pipesh::config::{Config, DEFAULT_SEARCH_PATHS, Limits};
use pipesh::error::report;
use pipesh::{Environment, Interpreter, logging, signal};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(FromArgs)]
/// Run pipelines of programs, interactively or from a script file.
struct Args {
    #[argh(positional)]
    /// script to run, one command line per line; interactive when omitted.
    script: Option<PathBuf>,

    #[argh(option)]
    /// directory searched for programs; repeat to add more, replaces the defaults.
    path: Vec<String>,

    #[argh(option, default = "Limits::default().max_stages")]
    /// most commands allowed in one pipeline.
    max_stages: usize,

    #[argh(option, default = "Limits::default().max_tokens")]
    /// most words allowed in one command.
    max_tokens: usize,

    #[argh(option, default = "Limits::default().max_line")]
    /// longest input line in bytes; the rest of a longer line is dropped.
    max_line: usize,

    #[argh(option, default = "LevelFilter::Warn")]
    /// diagnostic verbosity (off, error, warn, info, debug, trace).
    log_level: LevelFilter,

    #[argh(option)]
    /// write diagnostics to this file instead of standard error.
    log_file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> Config {
        let search_paths = if self.path.is_empty() {
            DEFAULT_SEARCH_PATHS.iter().map(|s| s.to_string()).collect()
        } else {
            self.path.clone()
        };
        Config {
            search_paths,
            limits: Limits {
                max_line: self.max_line,
                max_stages: self.max_stages,
                max_tokens: self.max_tokens,
            },
        }
    }
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    if let Err(e) = logging::init(args.log_level, args.log_file.as_deref()) {
        report(&format!("{e:#}"));
        return ExitCode::FAILURE;
    }

    let script = match &args.script {
        Some(path) => match File::open(path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) => {
                report(&format!("cannot open {}: {e}", path.display()));
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    if let Err(errno) = signal::install() {
        report(&format!("cannot install signal handlers: {errno}"));
        return ExitCode::FAILURE;
    }

    let mut shell = Interpreter::new(Environment::new(args.config()));
    let result = match script {
        Some(input) => shell.run_script(input),
        None => shell.repl(),
    };

    match result {
        Ok(()) => {
            info!("bye");
            ExitCode::SUCCESS
        }
        Err(e) => {
            report(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
