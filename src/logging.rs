//! Diagnostic logging setup.
//!
//! Diagnostics never share a stream with the programs the shell runs: they go
//! to standard error, or to a file when one is given.

use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;
use std::path::Path;

/// Install the global logger. Call once, before the first line is read.
pub fn init(level: LevelFilter, file: Option<&Path>) -> Result<()> {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();

    match file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            WriteLogger::init(level, config, file)
        }
        None => TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto),
    }
    .context("logger already installed")
}
