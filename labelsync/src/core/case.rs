//! First-character case folding for titles.
//!
//! Wiki titles always start with an upper-case letter while item labels are
//! frequently written in running-text case ("oslo kommune"). Comparisons try
//! both forms.

use thiserror::Error;

/// Returned when asked to fold an empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot lowercase the first character of an empty string")]
pub struct EmptyInputError;

/// Lowercase the first character of `title`, leaving the rest untouched.
///
/// A first character whose lowercase form spans several chars (`İ`) is
/// expanded in place.
pub fn lcfirst(title: &str) -> Result<String, EmptyInputError> {
    let mut chars = title.chars();
    let first = chars.next().ok_or(EmptyInputError)?;
    let mut folded = String::with_capacity(title.len());
    folded.extend(first.to_lowercase());
    folded.push_str(chars.as_str());
    Ok(folded)
}

/// Apply [`lcfirst`] to every title, collecting into the caller's container.
///
/// Fails on the first empty entry.
pub fn lcfirst_all<'a, I, C>(titles: I) -> Result<C, EmptyInputError>
where
    I: IntoIterator<Item = &'a str>,
    C: FromIterator<String>,
{
    titles.into_iter().map(lcfirst).collect()
}
