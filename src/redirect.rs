use crate::error::ShellError;

/// Token that introduces an output redirection.
pub const REDIRECT_OUT: &str = ">";

/// Argument vector and target file split out of a redirecting command.
pub type Redirection = (Vec<String>, String);

/// Look for an output redirection in the tokens of a single-stage command.
///
/// Only the first `>` is considered, and it must sit exactly second-to-last
/// with a command in front of it: `cmd args > file`. Returns `Ok(None)` when
/// no `>` token is present. On success the returned argument vector holds
/// neither the `>` nor the target.
pub fn analyze_redirection(tokens: &[String]) -> Result<Option<Redirection>, ShellError> {
    let Some(pos) = tokens.iter().position(|t| t == REDIRECT_OUT) else {
        return Ok(None);
    };
    if pos == 0 || pos + 2 != tokens.len() {
        return Err(ShellError::InvalidRedirectionSyntax);
    }
    let argv = tokens[..pos].to_vec();
    let target = tokens[pos + 1].clone();
    Ok(Some((argv, target)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_valid_redirection() {
        let result = analyze_redirection(&strings("cmd arg > out.txt")).unwrap();
        assert_eq!(result, Some((strings("cmd arg"), "out.txt".to_string())));
    }

    #[test]
    fn test_no_redirection() {
        assert_eq!(analyze_redirection(&strings("ls -l")).unwrap(), None);
    }

    #[test]
    fn test_invalid_positions() {
        for line in ["cmd > out.txt extra", "> out.txt", "cmd arg1 arg2 >", ">"] {
            assert_eq!(
                analyze_redirection(&strings(line)),
                Err(ShellError::InvalidRedirectionSyntax),
                "line: {line:?}"
            );
        }
    }

    #[test]
    fn test_only_first_marker_counts() {
        assert_eq!(
            analyze_redirection(&strings("cmd > a > b")),
            Err(ShellError::InvalidRedirectionSyntax)
        );
    }

    #[test]
    fn test_glued_marker_is_an_ordinary_argument() {
        assert_eq!(analyze_redirection(&strings("echo a>b")).unwrap(), None);
    }
}
