//! Label decision engine.
//!
//! Given the item's current label and what is known about a page move, decide
//! whether the label should follow the new page title. Rules are evaluated in
//! a fixed priority order and the first match wins:
//!
//! 1. no label: add the target title
//! 2. label is a (truncated) redirect title: replace, keep old label as alias
//! 3. same as 2 with the first character lowercased
//! 4. label is the source title (moved without redirect): replace, no alias
//! 5. same as 4 with the first character lowercased
//! 6. label matches neither target form: unsure, leave for manual triage
//! 7. label already matches the target: nothing to do

use crate::core::case::{EmptyInputError, lcfirst};
use crate::core::redirects::RedirectTitleSet;

/// Which rule produced a [`Decision::Replace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    RedirectTitle,
    RedirectTitleLowercased,
    SourceTitle,
    SourceTitleLowercased,
}

impl MatchRule {
    pub fn keeps_alias(self) -> bool {
        matches!(self, Self::RedirectTitle | Self::RedirectTitleLowercased)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The item has no label in this language yet.
    Add { label: String },
    /// Replace the label, optionally keeping the old one as an alias.
    Replace {
        label: String,
        keep_alias: bool,
        rule: MatchRule,
    },
    /// The label matches nothing we know about; needs a human.
    Unsure,
    /// The label already follows the target title.
    AlreadyCurrent,
}

/// Decide how the label of the item linked to `target` should change.
///
/// Fails only if `target` or `source` is empty.
pub fn decide(
    current: Option<&str>,
    target: &str,
    source: &str,
    redirects: &RedirectTitleSet,
) -> Result<Decision, EmptyInputError> {
    let target_lc = lcfirst(target)?;
    let source_lc = lcfirst(source)?;

    let Some(current) = current else {
        return Ok(Decision::Add {
            label: target.to_string(),
        });
    };

    if redirects.contains(current) {
        return Ok(replace(target.to_string(), MatchRule::RedirectTitle));
    }
    if matches_lowercased(current, redirects)? {
        return Ok(replace(target_lc, MatchRule::RedirectTitleLowercased));
    }
    if current == source {
        return Ok(replace(target.to_string(), MatchRule::SourceTitle));
    }
    if current == source_lc {
        return Ok(replace(target_lc, MatchRule::SourceTitleLowercased));
    }
    if current != target && current != target_lc {
        return Ok(Decision::Unsure);
    }
    Ok(Decision::AlreadyCurrent)
}

fn replace(label: String, rule: MatchRule) -> Decision {
    Decision::Replace {
        label,
        keep_alias: rule.keeps_alias(),
        rule,
    }
}

fn matches_lowercased(current: &str, redirects: &RedirectTitleSet) -> Result<bool, EmptyInputError> {
    for title in redirects.iter() {
        if lcfirst(title)? == current {
            return Ok(true);
        }
    }
    Ok(false)
}
