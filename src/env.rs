use crate::config::{Config, Limits};
use regex::Regex;
use std::collections::VecDeque;
use std::env as stdenv;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Most commands kept in the history.
pub const MAX_HISTORY: usize = 100;

/// Most aliases that can be defined at once.
pub const MAX_ALIASES: usize = 50;

static ALIAS_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("valid alias pattern"));

/// Reasons an alias cannot be defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasError {
    InvalidName(String),
    TableFull,
}

impl std::fmt::Display for AliasError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AliasError::InvalidName(name) => write!(f, "invalid alias name '{name}'"),
            AliasError::TableFull => write!(f, "cannot set alias: at most {MAX_ALIASES} aliases"),
        }
    }
}

impl std::error::Error for AliasError {}

/// Mutable state of one shell session.
///
/// The read loop is the only writer; the pipeline engine borrows the parts it
/// needs (`search_paths`, `limits`) read-only.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Directories scanned for executables, in scan order.
    pub search_paths: Vec<String>,
    pub limits: Limits,
    /// The current working directory, kept in sync with the process one by `cd`.
    pub current_dir: PathBuf,
    /// When set to true, the read loop stops after the current line.
    pub should_exit: bool,
    aliases: Vec<(String, String)>,
    history: VecDeque<String>,
}

impl Environment {
    pub fn new(config: Config) -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            search_paths: config.search_paths,
            limits: config.limits,
            current_dir,
            should_exit: false,
            aliases: Vec::new(),
            history: VecDeque::new(),
        }
    }

    /// Get the value of a variable, as seen by word expansion.
    ///
    /// `PWD` reflects the shell's own directory; everything else comes from
    /// the process environment.
    pub fn get_var(&self, key: &str) -> Option<String> {
        match key {
            "PWD" => Some(self.current_dir.to_string_lossy().into_owned()),
            _ => stdenv::var(key).ok(),
        }
    }

    /// Replace the search directories wholesale.
    pub fn set_search_paths(&mut self, dirs: Vec<String>) {
        self.search_paths = dirs;
    }

    /// Command an alias stands for.
    pub fn lookup_alias(&self, name: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, command)| command.as_str())
    }

    /// Define an alias, or update it if it already exists.
    pub fn set_alias(&mut self, name: &str, command: &str) -> Result<(), AliasError> {
        if !ALIAS_NAME.is_match(name) {
            return Err(AliasError::InvalidName(name.to_string()));
        }
        if let Some(entry) = self.aliases.iter_mut().find(|(n, _)| n == name) {
            entry.1 = command.to_string();
            return Ok(());
        }
        if self.aliases.len() >= MAX_ALIASES {
            return Err(AliasError::TableFull);
        }
        self.aliases.push((name.to_string(), command.to_string()));
        Ok(())
    }

    /// Aliases in definition order.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }

    /// Record a command line, dropping the oldest one once the history is full.
    pub fn add_history(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        if self.history.len() == MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(line.to_string());
    }

    /// Recorded command lines, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
