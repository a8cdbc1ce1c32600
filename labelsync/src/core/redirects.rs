//! Redirect title set used to recognise an item label as an older page title.

use std::collections::BTreeSet;

use regex::Regex;

/// Truncates titles at the earliest occurrence of any configured pattern.
///
/// Patterns are literal substrings (typically the start of a disambiguation
/// qualifier such as `" ("`). They are escaped and compiled into a single
/// alternation so that the leftmost match across all patterns wins.
#[derive(Debug, Clone)]
pub struct TitleSplitter {
    pattern: Option<Regex>,
}

impl TitleSplitter {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = patterns
            .into_iter()
            .map(|pattern| regex::escape(pattern.as_ref()))
            .filter(|escaped| !escaped.is_empty())
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }
        let pattern = Regex::new(&format!("(?:{})", alternatives.join("|")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// Prefix of `title` before the first pattern match (the whole title if none).
    pub fn truncate<'a>(&self, title: &'a str) -> &'a str {
        match self.pattern.as_ref().and_then(|re| re.find(title)) {
            Some(found) => &title[..found.start()],
            None => title,
        }
    }
}

/// Truncated titles of every page redirecting to the move target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedirectTitleSet {
    titles: BTreeSet<String>,
}

impl RedirectTitleSet {
    /// Truncate and deduplicate `titles`.
    ///
    /// A title that truncates to nothing carries no comparable name and is dropped.
    pub fn build<I, S>(splitter: &TitleSplitter, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let titles = titles
            .into_iter()
            .map(|title| splitter.truncate(title.as_ref()).to_string())
            .filter(|title| !title.is_empty())
            .collect();
        Self { titles }
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.titles.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RedirectTitleSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            titles: iter.into_iter().map(Into::into).collect(),
        }
    }
}
