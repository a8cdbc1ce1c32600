//! Shared deterministic types for label reconciliation.
//!
//! These are snapshots handed to the core by the I/O adapters. None of them
//! reach back into a collaborator; the core only reads them and proposes writes.

use crate::core::cursor::Position;

/// A single entry from the wiki move log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEvent {
    /// Move log entry id; orders entries that share a timestamp.
    pub log_id: u64,
    /// ISO-8601 UTC timestamp of the move (`2024-05-01T12:00:00Z`).
    pub timestamp: String,
    /// Title before the move.
    pub source: String,
    /// Title after the move.
    pub target: String,
    /// Namespace id the page was moved into.
    pub target_namespace: i64,
}

impl MoveEvent {
    pub fn position(&self) -> Position {
        Position::new(self.timestamp.clone(), self.log_id)
    }
}

/// Existence and redirect status of a wiki page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStatus {
    /// The page does not exist (deleted, or moved without leaving a redirect).
    Missing,
    /// The page exists and redirects to `target`.
    Redirect { target: String },
    /// The page exists and is a regular page.
    Article,
}

/// Label and aliases of an item in the configured language.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelState {
    pub label: Option<String>,
    pub aliases: Vec<String>,
}

impl LabelState {
    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|existing| existing == alias)
    }
}

/// An item linked to a wiki page, as seen by the item store at lookup time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    /// Item id (`Q42`).
    pub id: String,
    pub state: LabelState,
}

impl ItemSnapshot {
    pub fn label(&self) -> Option<&str> {
        self.state.label.as_deref()
    }
}
