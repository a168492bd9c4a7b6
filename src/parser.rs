//! Turns an input line into a [`Pipeline`] of tokenized stages.

use crate::config::Limits;
use crate::error::ShellError;
use crate::lexer::{self, Word};
use std::path::PathBuf;

/// Separator between pipeline stages.
pub const PIPE: char = '|';

/// One command of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Argument vector; `argv[0]` is the program name as typed.
    pub argv: Vec<String>,
    /// Executable path, filled in by the resolver right before the stage is forked.
    pub program: Option<PathBuf>,
    /// Output redirection target. Only ever set on the stage of a one-stage pipeline.
    pub redirect: Option<String>,
}

impl Stage {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            program: None,
            redirect: None,
        }
    }

    /// Program name as typed; empty if the stage has no arguments at all.
    pub fn name(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }
}

/// A non-empty sequence of stages, each feeding its output to the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Parse a line without any word expansion.
    pub fn parse(line: &str, limits: &Limits) -> Result<Self, ShellError> {
        Self::parse_with(line, limits, |word| word.text)
    }

    /// Parse a line, passing every word through `expand` to build the argument vectors.
    ///
    /// Lines with more stages, or stages with more tokens, than `limits`
    /// allows are rejected rather than cut short. A stage without tokens makes
    /// the whole line an [`ShellError::EmptyCommand`].
    pub fn parse_with<F>(line: &str, limits: &Limits, mut expand: F) -> Result<Self, ShellError>
    where
        F: FnMut(Word) -> String,
    {
        let segments = parse_pipeline(line, limits.max_stages.saturating_add(1));
        if segments.len() > limits.max_stages {
            return Err(ShellError::TooManyStages {
                limit: limits.max_stages,
            });
        }

        let mut stages = Vec::new();
        stages
            .try_reserve_exact(segments.len())
            .map_err(|_| ShellError::AllocationFailed)?;

        for segment in &segments {
            let words = lexer::split_words(segment, limits.max_tokens.saturating_add(1))?;
            if words.is_empty() {
                return Err(ShellError::EmptyCommand);
            }
            if words.len() > limits.max_tokens {
                return Err(ShellError::TooManyTokens {
                    limit: limits.max_tokens,
                });
            }
            stages.push(Stage::new(words.into_iter().map(&mut expand).collect()));
        }

        Ok(Self { stages })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_single(&self) -> bool {
        self.stages.len() == 1
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stages_mut(&mut self) -> &mut [Stage] {
        &mut self.stages
    }
}

/// Split `line` on the pipe character and trim every segment.
///
/// At most `max_stages` segments are returned; later ones are dropped. A line
/// without a pipe character gives a single segment.
pub fn parse_pipeline(line: &str, max_stages: usize) -> Vec<String> {
    line.split(PIPE)
        .take(max_stages)
        .map(|segment| segment.trim().to_string())
        .collect()
}
