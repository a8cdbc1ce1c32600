//! Forbidden-substring policy for automatic label changes.
//!
//! Substrings are matched literally. A change may remove a forbidden substring
//! but never introduce one that the current label does not already carry.

/// Ordered list of substrings that must not be introduced into a label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ForbiddenPolicy {
    substrings: Vec<String>,
}

impl ForbiddenPolicy {
    pub fn new<I, S>(substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            substrings: substrings.into_iter().map(Into::into).collect(),
        }
    }

    pub fn substrings(&self) -> &[String] {
        &self.substrings
    }

    /// Substrings present in `proposed` but absent from `current`, in configuration order.
    pub fn introduced<'a>(&'a self, current: &str, proposed: &str) -> Vec<&'a str> {
        self.substrings
            .iter()
            .map(String::as_str)
            .filter(|needle| proposed.contains(needle) && !current.contains(needle))
            .collect()
    }

    pub fn is_introducing_forbidden(&self, current: &str, proposed: &str) -> bool {
        !self.introduced(current, proposed).is_empty()
    }

    /// Every configured substring found in `label`.
    pub fn contains_forbidden<'a>(&'a self, label: &str) -> Vec<&'a str> {
        self.substrings
            .iter()
            .map(String::as_str)
            .filter(|needle| label.contains(needle))
            .collect()
    }
}
