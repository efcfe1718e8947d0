//! Cursor persistence (§4.9): tracks the last successfully committed
//! changenumber so the driver resumes correctly across restarts.

use adr_common::errors::{Error, ErrorCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CursorFile {
    last_applied_changenumber: i64,
}

/// Persists and loads the last applied changenumber.
pub trait CursorStore: Send + Sync {
    fn load(&self) -> Result<Option<i64>, Error>;
    fn store(&self, changenumber: i64) -> Result<(), Error>;
}

/// File-backed [`CursorStore`]. Writes go to a sibling temp file and are
/// renamed into place so a crash mid-write never leaves a truncated cursor.
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        let file_name = tmp.file_name().map(|n| format!("{}.tmp", n.to_string_lossy())).unwrap_or_else(|| "cursor.tmp".to_string());
        tmp.set_file_name(file_name);
        tmp
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> Result<Option<i64>, Error> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Internal(ErrorCode::InternalCursorIoError, e.to_string()))?;
        let parsed: CursorFile = serde_json::from_str(&text)
            .map_err(|e| Error::Internal(ErrorCode::InternalCursorIoError, e.to_string()))?;
        Ok(Some(parsed.last_applied_changenumber))
    }

    fn store(&self, changenumber: i64) -> Result<(), Error> {
        let body = serde_json::to_string_pretty(&CursorFile {
            last_applied_changenumber: changenumber,
        })
        .map_err(|e| Error::Internal(ErrorCode::InternalCursorIoError, e.to_string()))?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, body).map_err(|e| Error::Internal(ErrorCode::InternalCursorIoError, e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| Error::Internal(ErrorCode::InternalCursorIoError, e.to_string()))?;
        Ok(())
    }
}

/// In-memory [`CursorStore`] for tests and dry-run mode.
pub struct InMemoryCursorStore {
    current: std::sync::Mutex<Option<i64>>,
}

impl InMemoryCursorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: std::sync::Mutex::new(None),
        }
    }
}

impl Default for InMemoryCursorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorStore for InMemoryCursorStore {
    fn load(&self) -> Result<Option<i64>, Error> {
        Ok(*self.current.lock().expect("cursor lock poisoned"))
    }

    fn store(&self, changenumber: i64) -> Result<(), Error> {
        *self.current.lock().expect("cursor lock poisoned") = Some(changenumber);
        Ok(())
    }
}

/// Helper used by tests that need a throwaway path under a tempdir.
#[cfg(test)]
fn scratch_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_path(dir.path(), "cursor.json");
        let store = FileCursorStore::new(&path);
        assert_eq!(store.load().unwrap(), None);
        store.store(42).unwrap();
        assert_eq!(store.load().unwrap(), Some(42));
        store.store(43).unwrap();
        assert_eq!(store.load().unwrap(), Some(43));
    }

    #[test]
    fn file_store_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_path(dir.path(), "cursor.json");
        let store = FileCursorStore::new(&path);
        store.store(1).unwrap();
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn in_memory_store_round_trips() {
        let store = InMemoryCursorStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.store(7).unwrap();
        assert_eq!(store.load().unwrap(), Some(7));
    }
}
