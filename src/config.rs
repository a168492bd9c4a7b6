//! Startup configuration: size limits and the default search directories.

/// Directories scanned for executables until the `path` built-in replaces them.
pub const DEFAULT_SEARCH_PATHS: [&str; 3] = ["/bin", "/usr/bin", "/usr/local/bin"];

/// Bounds applied to every input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Longest line, in bytes, handed to the parser. The rest of a longer line is dropped.
    pub max_line: usize,
    /// Most commands allowed in one pipeline.
    pub max_stages: usize,
    /// Most tokens (program name included) allowed in one command.
    pub max_tokens: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_line: 1024,
            max_stages: 10,
            max_tokens: 10,
        }
    }
}

/// Everything the interpreter needs to know before the first line is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub search_paths: Vec<String>,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_paths: DEFAULT_SEARCH_PATHS.iter().map(|s| s.to_string()).collect(),
            limits: Limits::default(),
        }
    }
}

/// Cut `line` to at most `max` bytes without splitting a UTF-8 sequence.
pub fn truncate_line(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
