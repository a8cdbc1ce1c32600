//! Append-only change and review journals.
//!
//! # Separation of Concerns
//!
//! - **Journals (this module)**: product output under `<state_dir>/<edition>/`.
//!   `changes.log` records what the tool did, `review.log` what a human should
//!   look at. Always written, unaffected by `RUST_LOG`.
//!
//! - **Tracing (`logging`)**: dev diagnostics on stderr. Every journal record is
//!   mirrored there as well.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

/// Sink for the two human-readable record streams.
pub trait Journal {
    /// Informational record: a change that was made, or a skip worth knowing about.
    fn info(&self, message: &str) -> Result<()>;
    /// Warning or manual-review record.
    fn warn(&self, message: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JournalPaths {
    pub dir: PathBuf,
    pub changes_path: PathBuf,
    pub review_path: PathBuf,
}

impl JournalPaths {
    pub fn new(state_dir: &Path, edition: &str) -> Self {
        let dir = state_dir.join(edition);
        Self {
            changes_path: dir.join("changes.log"),
            review_path: dir.join("review.log"),
            dir,
        }
    }
}

/// Appends one line per record, `YYYY-MM-DD HH:MM:SS LEVEL message` in UTC.
#[derive(Debug)]
pub struct FileJournal {
    paths: JournalPaths,
}

impl FileJournal {
    pub fn open(state_dir: &Path, edition: &str) -> Result<Self> {
        let paths = JournalPaths::new(state_dir, edition);
        fs::create_dir_all(&paths.dir)
            .with_context(|| format!("create journal dir {}", paths.dir.display()))?;
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &JournalPaths {
        &self.paths
    }
}

impl Journal for FileJournal {
    fn info(&self, message: &str) -> Result<()> {
        info!("{message}");
        append_line(&self.paths.changes_path, "INFO", message)
    }

    fn warn(&self, message: &str) -> Result<()> {
        warn!("{message}");
        append_line(&self.paths.review_path, "WARNING", message)
    }
}

fn append_line(path: &Path, level: &str, message: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open journal {}", path.display()))?;
    let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
    // Keep one record per line even if a title smuggles in a newline.
    let message = message.replace('\n', " ");
    writeln!(file, "{stamp} {level} {message}")
        .with_context(|| format!("append journal {}", path.display()))
}
