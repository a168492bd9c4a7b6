use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. They are only considered for
/// lines consisting of a single command.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Names the command answers to; the first one is canonical.
    fn names() -> &'static [&'static str];

    /// Executes the command using the provided output stream and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        <T as BuiltinCommand>::execute(*self, stdout, env)
    }
}

/// Stands in for a builtin whose arguments did not parse.
struct UsageError {
    message: String,
}

impl ExecutableCommand for UsageError {
    fn execute(self: Box<Self>, _stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        Err(anyhow!("{}", self.message))
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if !T::names().contains(&name) {
            return None;
        }
        // Everything the user typed is an operand, even words that look like flags.
        let operands: Vec<&str> = std::iter::once("--").chain(args.iter().copied()).collect();
        Some(match T::from_args(&[name], &operands) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, .. }) => Box::new(UsageError {
                message: output.lines().next().unwrap_or_default().to_string(),
            }),
        })
    }
}

#[derive(FromArgs)]
/// Leave the shell.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn names() -> &'static [&'static str] {
        &["exit"]
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: String,
}

impl BuiltinCommand for Cd {
    fn names() -> &'static [&'static str] {
        &["cd"]
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = PathBuf::from(&self.target);
        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: cannot change directory to {}", self.target))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: cannot change directory to {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn names() -> &'static [&'static str] {
        &["pwd"]
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Replace the directories searched for executables.
pub struct Path {
    #[argh(positional, greedy)]
    /// directories to search, in order; none leaves only direct paths runnable.
    pub dirs: Vec<String>,
}

impl BuiltinCommand for Path {
    fn names() -> &'static [&'static str] {
        &["path", "paths"]
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.set_search_paths(self.dirs);
        Ok(0)
    }
}

const HELP_TEXT: &str = "\
pipesh - a small pipeline shell
Built-in commands:
  exit        - Exit the shell
  cd <dir>    - Change directory
  pwd         - Print working directory
  path <dirs> - Set executable search paths
  help        - Show this help message
  env         - Show environment variables
  history     - Show command history
  alias       - Show/set command aliases

Features:
  - Piping: command1 | command2
  - Redirection: command > file
  - Signal handling: Ctrl+C, Ctrl+Z
";

#[derive(FromArgs)]
/// Describe the built-in commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn names() -> &'static [&'static str] {
        &["help"]
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        stdout.write_all(HELP_TEXT.as_bytes())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the environment inherited by launched programs.
pub struct Env {}

impl BuiltinCommand for Env {
    fn names() -> &'static [&'static str] {
        &["env"]
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        for (key, value) in env::vars_os() {
            writeln!(stdout, "{}={}", key.to_string_lossy(), value.to_string_lossy())?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show the commands entered in this session.
pub struct History {}

impl BuiltinCommand for History {
    fn names() -> &'static [&'static str] {
        &["history"]
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let mut empty = true;
        for (i, line) in env.history().enumerate() {
            writeln!(stdout, "{:3}  {}", i + 1, line)?;
            empty = false;
        }
        if empty {
            writeln!(stdout, "No commands in history")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List aliases, or define one with `alias name command`.
pub struct Alias {
    #[argh(positional, greedy)]
    /// alias name followed by the command it stands for.
    pub args: Vec<String>,
}

impl BuiltinCommand for Alias {
    fn names() -> &'static [&'static str] {
        &["alias"]
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        match self.args.as_slice() {
            [] => {
                let mut empty = true;
                for (name, command) in env.aliases() {
                    writeln!(stdout, "alias {name}='{command}'")?;
                    empty = false;
                }
                if empty {
                    writeln!(stdout, "No aliases defined")?;
                }
                Ok(0)
            }
            [name, command] => {
                env.set_alias(name, command)?;
                writeln!(stdout, "Alias '{name}' set to '{command}'")?;
                Ok(0)
            }
            _ => Err(anyhow!("alias usage: alias [name command]")),
        }
    }
}
