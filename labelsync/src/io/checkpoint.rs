//! Persisted resume cursors, one per edition.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Key-value store for resume cursors.
pub trait CheckpointStore {
    /// Cursor stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>>;
    /// Overwrite the cursor stored under `key`. Must be durable when it returns.
    fn save(&self, key: &str, cursor: &str) -> Result<()>;
    fn clear(&self, key: &str) -> Result<()>;
}

/// Stores each cursor as `<dir>/<key>.cursor` holding a single line.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.cursor"))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(path = %path.display(), "no cursor stored");
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read cursor {}", path.display()))?;
        let cursor = contents.trim();
        if cursor.is_empty() {
            return Ok(None);
        }
        debug!(path = %path.display(), cursor, "cursor loaded");
        Ok(Some(cursor.to_string()))
    }

    fn save(&self, key: &str, cursor: &str) -> Result<()> {
        let path = self.path_for(key);
        debug!(path = %path.display(), cursor, "writing cursor");
        write_durable(&path, &format!("{cursor}\n"))
    }

    fn clear(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("remove cursor {}", path.display()))?;
        }
        Ok(())
    }
}

/// Temp file + fsync + rename, so a crash leaves either the old or the new cursor.
fn write_durable(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("cursor path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("cursor.tmp");
    let mut file = File::create(&tmp_path)
        .with_context(|| format!("create temp cursor {}", tmp_path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("write temp cursor {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("sync temp cursor {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace cursor {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cursor_loads_as_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileCheckpointStore::new(temp.path());
        assert_eq!(store.load("sv").expect("load"), None);
    }

    #[test]
    fn save_then_load_per_key() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileCheckpointStore::new(temp.path().join("state"));
        store.save("sv", "2024-05-01T12:00:00Z").expect("save sv");
        store.save("nb", "2023-01-01T00:00:00Z").expect("save nb");

        assert_eq!(
            store.load("sv").expect("load").as_deref(),
            Some("2024-05-01T12:00:00Z")
        );
        assert_eq!(
            store.load("nb").expect("load").as_deref(),
            Some("2023-01-01T00:00:00Z")
        );
        let raw = fs::read_to_string(store.path_for("sv")).expect("read");
        assert_eq!(raw, "2024-05-01T12:00:00Z\n");
    }

    #[test]
    fn clear_removes_cursor() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileCheckpointStore::new(temp.path());
        store.save("nn", "2024-05-01T12:00:00Z").expect("save");
        store.clear("nn").expect("clear");
        assert_eq!(store.load("nn").expect("load"), None);
        store.clear("nn").expect("clear twice");
    }
}
