//! Trivial word expansion: `~` and `$NAME` / `${NAME}`.

use crate::env::Environment;
use crate::lexer::Word;

/// Expand an unquoted word against `env`; quoted words are returned untouched.
///
/// Unknown variables are left as written.
pub fn expand_word(word: Word, env: &Environment) -> String {
    if word.quoted || !(word.text.starts_with('~') || word.text.contains('$')) {
        return word.text;
    }
    let home = || env.get_var("HOME");
    let lookup = |name: &str| env.get_var(name);
    shellexpand::full_with_context_no_errors(&word.text, home, lookup).into_owned()
}
