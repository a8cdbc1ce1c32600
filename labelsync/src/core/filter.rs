//! Move event filter.
//!
//! Each check looks at one fact about the event. The orchestrator gathers the
//! facts lazily in the order below and stops at the first skip, so an event
//! that fails early never costs the later lookups:
//!
//! 1. [`check_namespace`]
//! 2. [`check_source`]
//! 3. [`check_target`]
//! 4. [`check_linkage`]

use std::fmt;

use crate::core::types::{MoveEvent, PageStatus};

/// How a skip is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The page was moved into a namespace we do not track.
    OutsideNamespace { namespace: i64 },
    /// The old title exists as a regular page again (move reverted or contested).
    SourceIsArticle,
    /// The new title does not exist any more.
    TargetMissing,
    /// The new title is itself a redirect (moved again since).
    TargetIsRedirect { redirects_to: String },
    /// The item still points at the old title; the sitelink has not followed the move yet.
    LinkageNotMigrated { source_item: String },
    /// The old title is linked to an item although the new title is linked too.
    SourceStillLinked {
        source_item: String,
        target_item: String,
    },
    /// Nothing is linked to the new title.
    TargetUnlinked,
}

impl SkipReason {
    pub fn severity(&self) -> Severity {
        match self {
            Self::LinkageNotMigrated { .. } | Self::SourceStillLinked { .. } => Severity::Warning,
            _ => Severity::Info,
        }
    }

    /// Human-readable line for the journal.
    pub fn describe(&self, event: &MoveEvent) -> String {
        format!(
            "Skipping move \"{}\" -> \"{}\": {}",
            event.source, event.target, self
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutsideNamespace { namespace } => {
                write!(f, "target is in namespace {namespace}")
            }
            Self::SourceIsArticle => f.write_str("source exists and is not a redirect"),
            Self::TargetMissing => f.write_str("target does not exist"),
            Self::TargetIsRedirect { redirects_to } => {
                write!(f, "target is a redirect to \"{redirects_to}\"")
            }
            Self::LinkageNotMigrated { source_item } => write!(
                f,
                "source is still linked to {source_item} while target is unlinked"
            ),
            Self::SourceStillLinked {
                source_item,
                target_item,
            } => write!(
                f,
                "source is linked to {source_item} and target to {target_item}"
            ),
            Self::TargetUnlinked => f.write_str("no item linked to target"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterStep {
    Continue,
    Skip(SkipReason),
}

pub fn check_namespace(event: &MoveEvent, namespace: i64) -> FilterStep {
    if event.target_namespace == namespace {
        FilterStep::Continue
    } else {
        FilterStep::Skip(SkipReason::OutsideNamespace {
            namespace: event.target_namespace,
        })
    }
}

/// A missing source (moved without redirect) and a redirecting source both continue.
pub fn check_source(status: &PageStatus) -> FilterStep {
    match status {
        PageStatus::Article => FilterStep::Skip(SkipReason::SourceIsArticle),
        PageStatus::Missing | PageStatus::Redirect { .. } => FilterStep::Continue,
    }
}

pub fn check_target(status: &PageStatus) -> FilterStep {
    match status {
        PageStatus::Missing => FilterStep::Skip(SkipReason::TargetMissing),
        PageStatus::Redirect { target } => FilterStep::Skip(SkipReason::TargetIsRedirect {
            redirects_to: target.clone(),
        }),
        PageStatus::Article => FilterStep::Continue,
    }
}

/// Compare the items linked to the old and new titles.
pub fn check_linkage(source_item: Option<&str>, target_item: Option<&str>) -> FilterStep {
    match (source_item, target_item) {
        (Some(source_item), None) => FilterStep::Skip(SkipReason::LinkageNotMigrated {
            source_item: source_item.to_string(),
        }),
        (Some(source_item), Some(target_item)) => {
            FilterStep::Skip(SkipReason::SourceStillLinked {
                source_item: source_item.to_string(),
                target_item: target_item.to_string(),
            })
        }
        (None, None) => FilterStep::Skip(SkipReason::TargetUnlinked),
        (None, Some(_)) => FilterStep::Continue,
    }
}
