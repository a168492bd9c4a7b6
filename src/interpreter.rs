use crate::command::{CommandFactory, ExitCode};
use crate::config::truncate_line;
use crate::env::Environment;
use crate::error::{self, ShellError};
use crate::exec;
use crate::expand::expand_word;
use crate::parser::Pipeline;
use crate::redirect::analyze_redirection;
use anyhow::{Context, Result};
use log::{debug, info};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{BufRead, Write};

/// Prompt shown before each line in interactive mode.
pub const PROMPT: &str = "pipesh> ";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports the builtin commands defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// A line-oriented interpreter running builtins in-process and everything else as pipelines.
///
/// Example
/// ```no_run
/// use pipesh::{Environment, Interpreter};
/// let mut sh = Interpreter::new(Environment::default());
/// let code = sh.eval("echo hello | tr a-z A-Z").unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    pub fn new(env: Environment) -> Self {
        use crate::builtin::*;
        Self::with_commands(
            env,
            vec![
                Box::new(Factory::<Exit>::default()),
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<Pwd>::default()),
                Box::new(Factory::<Path>::default()),
                Box::new(Factory::<Help>::default()),
                Box::new(Factory::<Env>::default()),
                Box::new(Factory::<History>::default()),
                Box::new(Factory::<Alias>::default()),
            ],
        )
    }

    /// Create a new interpreter with a custom set of builtin factories.
    pub fn with_commands(env: Environment, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self { env, commands }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Evaluate one input line.
    ///
    /// Builtin output goes to the process's standard output. Errors abort the
    /// line; the caller reports them and moves on.
    pub fn eval(&mut self, line: &str) -> Result<ExitCode, ShellError> {
        self.eval_with_output(line, &mut std::io::stdout())
    }

    fn eval_with_output(&mut self, line: &str, stdout: &mut dyn Write) -> Result<ExitCode, ShellError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(0);
        }

        let env = &self.env;
        let mut pipeline = Pipeline::parse_with(line, &env.limits, |word| expand_word(word, env))?;

        if pipeline.is_single() {
            let stage = &mut pipeline.stages_mut()[0];
            if let Some(command) = self.env.lookup_alias(stage.name()) {
                debug!("alias {} -> {}", stage.name(), command);
                let command = command.to_string();
                if let Some(first) = stage.argv.first_mut() {
                    *first = command;
                }
            }

            if let Some(code) = self.run_builtin(&stage.argv, stdout) {
                return Ok(code);
            }

            if let Some((argv, target)) = analyze_redirection(&stage.argv)? {
                stage.argv = argv;
                stage.redirect = Some(target);
            }
        }

        let mut report = exec::run_pipeline(&mut pipeline, &self.env.search_paths)?;
        for err in report.wait_errors() {
            error::report(err);
        }
        if let Some(failure) = report.failure.take() {
            return Err(failure);
        }
        Ok(report.exit_code())
    }

    /// Run `argv` as a builtin if one answers to its name.
    ///
    /// Returns `None` when no builtin matched. Builtin failures are reported here.
    fn run_builtin(&mut self, argv: &[String], stdout: &mut dyn Write) -> Option<ExitCode> {
        let (name, args) = argv.split_first()?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let cmd = self
            .commands
            .iter()
            .find_map(|factory| factory.try_create(name, &args))?;

        debug!("running builtin {name}");
        let code = match cmd.execute(stdout, &mut self.env) {
            Ok(code) => code,
            Err(e) => {
                error::report(&format!("{e:#}"));
                1
            }
        };
        let _ = stdout.flush();
        Some(code)
    }

    /// Evaluate a line read by the loop, reporting any error.
    ///
    /// Only fatal errors are passed on.
    fn eval_reported(&mut self, line: &str) -> Result<()> {
        let line = truncate_line(line, self.env.limits.max_line);
        match self.eval(line) {
            Ok(code) => {
                debug!("line finished with status {code}");
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e).context("unrecoverable error"),
            Err(e) => {
                error::report(&e);
                Ok(())
            }
        }
    }

    /// Read-eval loop over a script: one command per line, no prompt, no history.
    ///
    /// Bytes that are not valid UTF-8 are replaced, so a bad line only affects itself.
    pub fn run_script(&mut self, mut input: impl BufRead) -> Result<()> {
        let mut buf = Vec::new();
        while !self.env.should_exit {
            buf.clear();
            if input.read_until(b'\n', &mut buf).context("cannot read script")? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            self.eval_reported(line.trim_end_matches(['\n', '\r']))?;
        }
        Ok(())
    }

    /// Interactive read-eval loop with line editing, until EOF or `exit`.
    pub fn repl(&mut self) -> Result<()> {
        let mut rl = DefaultEditor::new().context("cannot start line editor")?;

        while !self.env.should_exit {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);
                    self.env.add_history(trimmed);
                    self.eval_reported(trimmed)?;
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => return Err(err).context("cannot read input"),
            }
        }

        info!("leaving interactive session");
        Ok(())
    }
}
