//! Quoting for arguments that end up inside an `sh -c` command line

use std::borrow::Cow;

/// Characters that never need quoting in a POSIX shell word
fn is_plain(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | '=' | ':' | ',' | '@' | '%')
}

/// Quote `word` so the shell passes it through as exactly one argument.
///
/// Plain words are returned untouched. Anything else is wrapped in single
/// quotes, with embedded single quotes written as `'\''`.
#[must_use]
pub fn quote(word: &str) -> Cow<'_, str> {
    if !word.is_empty() && word.chars().all(is_plain) {
        return Cow::Borrowed(word);
    }
    Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
}
