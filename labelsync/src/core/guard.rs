//! Change guard applied to every proposed label write.

use crate::core::policy::ForbiddenPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Proposed label equals the current one; nothing to write.
    Unchanged,
    /// The change would introduce forbidden substrings.
    Rejected { introduced: Vec<String> },
    /// The change may be written. `needs_review` lists forbidden substrings the
    /// new label carries (only possible when they were already present, or
    /// when there was no label before).
    Accepted { needs_review: Vec<String> },
}

impl GuardVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Check a proposed label against the current one.
///
/// With no current label there is nothing to compare against, so the
/// introduction check does not apply; any forbidden substring in the proposal
/// is reported for manual review instead.
pub fn evaluate_change(
    current: Option<&str>,
    proposed: &str,
    policy: &ForbiddenPolicy,
) -> GuardVerdict {
    if current == Some(proposed) {
        return GuardVerdict::Unchanged;
    }
    if let Some(current) = current {
        let introduced = policy.introduced(current, proposed);
        if !introduced.is_empty() {
            return GuardVerdict::Rejected {
                introduced: to_owned(introduced),
            };
        }
    }
    GuardVerdict::Accepted {
        needs_review: to_owned(policy.contains_forbidden(proposed)),
    }
}

fn to_owned(found: Vec<&str>) -> Vec<String> {
    found.into_iter().map(str::to_string).collect()
}
