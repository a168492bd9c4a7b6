use nix::errno::Errno;
use std::{error, fmt};

/// Prefix put in front of every error the shell reports on stderr.
pub const ERROR_PREFIX: &str = "pipesh: ";

/// Errors raised while turning an input line into running processes.
///
/// Everything except [`ShellError::AllocationFailed`] aborts only the line
/// being evaluated; the read loop carries on with the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    /// A segment ended while a quote was still open.
    UnclosedQuote,
    /// One of the pipeline stages has no tokens.
    EmptyCommand,
    /// More stages than the configured limit.
    TooManyStages { limit: usize },
    /// A stage has more tokens than the configured limit.
    TooManyTokens { limit: usize },
    /// Neither a search directory nor the name itself yields an executable.
    CommandNotFound(String),
    /// `>` is not immediately followed by exactly one final target token.
    InvalidRedirectionSyntax,
    PipeCreationFailed(Errno),
    ForkFailed(Errno),
    /// The stage could not be prepared for `execv`, e.g. a token holds a NUL byte.
    ExecFailed(String),
    WaitFailed(Errno),
    AllocationFailed,
}

impl ShellError {
    /// Fatal errors end the whole shell instead of the current line.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::AllocationFailed)
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShellError::UnclosedQuote => write!(f, "unclosed quote"),
            ShellError::EmptyCommand => write!(f, "empty command"),
            ShellError::TooManyStages { limit } => {
                write!(f, "too many commands in pipeline (limit is {limit})")
            }
            ShellError::TooManyTokens { limit } => {
                write!(f, "too many arguments (limit is {limit})")
            }
            ShellError::CommandNotFound(name) => write!(f, "{name}: command not found"),
            ShellError::InvalidRedirectionSyntax => write!(f, "invalid redirection syntax"),
            ShellError::PipeCreationFailed(e) => write!(f, "cannot create pipe: {e}"),
            ShellError::ForkFailed(e) => write!(f, "fork failed: {e}"),
            ShellError::ExecFailed(reason) => write!(f, "failed to execute: {reason}"),
            ShellError::WaitFailed(e) => write!(f, "waitpid failed: {e}"),
            ShellError::AllocationFailed => write!(f, "memory allocation failed"),
        }
    }
}

impl error::Error for ShellError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ShellError::PipeCreationFailed(e)
            | ShellError::ForkFailed(e)
            | ShellError::WaitFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// Write `err` to stderr with the shell's error prefix.
pub fn report(err: &dyn fmt::Display) {
    eprintln!("{ERROR_PREFIX}{err}");
}
