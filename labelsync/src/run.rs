//! Batch loop for `labelsync run`.
//!
//! Streams move events after the persisted cursor, reconciles them one at a
//! time and persists the cursor after each event whose processing completed.
//! The first collaborator failure halts the run with the cursor still at the
//! last completed event, so a rerun picks up exactly there.

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::cursor::{Position, advance};
use crate::core::types::MoveEvent;
use crate::io::checkpoint::CheckpointStore;
use crate::io::wiki::EventFeed;
use crate::reconcile::{EventOutcome, ReconcileContext, reconcile_event};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum number of events to process.
    pub limit: usize,
}

/// Reason why `run_batch` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStop {
    /// The feed has no more events after the cursor.
    Exhausted,
    /// `limit` events were processed; more may be waiting.
    LimitReached,
}

/// Summary of a batch invocation. Cursors are rendered in their stored form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub edition: String,
    /// Cursor the run resumed from.
    pub resumed_from: Option<String>,
    /// Cursor after the run (persisted unless dry-run).
    pub cursor: Option<String>,
    pub processed: usize,
    pub written: usize,
    pub skipped: usize,
    pub stop: RunStop,
}

/// Attached as context when a collaborator failure halts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("run halted at {position}; cursor left at {}", .cursor.as_deref().unwrap_or("<none>"))]
pub struct RunHalted {
    /// What was being processed (a move, or the move log itself).
    pub position: String,
    pub cursor: Option<String>,
}

/// Process up to `options.limit` move events after the persisted cursor.
///
/// `on_event` is called after each event has been fully processed and its
/// cursor persisted.
pub fn run_batch<F, C, H>(
    feed: &F,
    checkpoints: &C,
    ctx: &ReconcileContext<'_>,
    options: &RunOptions,
    mut on_event: H,
) -> Result<RunOutcome>
where
    F: EventFeed + ?Sized,
    C: CheckpointStore + ?Sized,
    H: FnMut(&MoveEvent, &EventOutcome),
{
    let edition = ctx.profile.edition.clone();
    let resumed_from = load_cursor(checkpoints, &edition)?;
    info!(edition = %edition, cursor = ?resumed_from, limit = options.limit, dry_run = ctx.dry_run, "starting batch");

    let mut cursor = resumed_from.clone();
    let mut processed = 0usize;
    let mut written = 0usize;
    let mut skipped = 0usize;

    for next in feed.move_events(resumed_from.as_ref(), options.limit) {
        let event = next.with_context(|| RunHalted {
            position: "move log".to_string(),
            cursor: render(cursor.as_ref()),
        })?;
        let outcome = reconcile_event(&event, ctx).with_context(|| RunHalted {
            position: format!(
                "move {} \"{}\" -> \"{}\"",
                event.position(),
                event.source,
                event.target
            ),
            cursor: render(cursor.as_ref()),
        })?;

        if let Some(advanced) = advance(cursor.as_ref(), &event.position()) {
            if !ctx.dry_run {
                checkpoints
                    .save(&edition, &advanced.to_string())
                    .with_context(|| RunHalted {
                        position: format!("saving cursor {advanced} for {edition}"),
                        cursor: render(cursor.as_ref()),
                    })?;
            }
            cursor = Some(advanced);
        }

        processed += 1;
        if outcome.is_write() {
            written += 1;
        }
        if matches!(outcome, EventOutcome::Skipped(_)) {
            skipped += 1;
        }
        debug!(position = %event.position(), ?outcome, "event processed");
        on_event(&event, &outcome);
    }

    let stop = if processed >= options.limit {
        RunStop::LimitReached
    } else {
        RunStop::Exhausted
    };
    info!(processed, written, skipped, ?stop, "batch finished");
    Ok(RunOutcome {
        edition,
        resumed_from: render(resumed_from.as_ref()),
        cursor: render(cursor.as_ref()),
        processed,
        written,
        skipped,
        stop,
    })
}

/// A store that cannot be read halts the run; a malformed cursor is a config error.
fn load_cursor<C: CheckpointStore + ?Sized>(
    checkpoints: &C,
    edition: &str,
) -> Result<Option<Position>> {
    let raw = checkpoints.load(edition).with_context(|| RunHalted {
        position: format!("loading cursor for {edition}"),
        cursor: None,
    })?;
    raw.map(|raw| raw.parse::<Position>())
        .transpose()
        .with_context(|| format!("stored cursor for {edition}"))
}

fn render(cursor: Option<&Position>) -> Option<String> {
    cursor.map(Position::to_string)
}
