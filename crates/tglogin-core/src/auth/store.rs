//! Durable storage for the renewal credential.
//!
//! Exactly one value lives under [`REFRESH_TOKEN_KEY`]. Every write replaces
//! it whole and `remove` erases it, so a reader never sees a partial value.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fixed storage key for the renewal credential
pub const REFRESH_TOKEN_KEY: &str = "telegram_auth_refresh_token";

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Key-value store holding the single persisted renewal credential.
pub trait RenewalStore: Send + Sync {
    fn get(&self) -> Result<Option<String>>;
    fn set(&self, token: &str) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

/// In-process store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    token: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a credential already stored, as if left by a prior run
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl RenewalStore for MemoryStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.token.lock().clone())
    }

    fn set(&self, token: &str) -> Result<()> {
        *self.token.lock() = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.token.lock() = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    refresh_token: String,
    saved_at: DateTime<Utc>,
}

/// Renewal credential kept in `session.json` under a cache directory.
pub struct FileStore {
    cache_dir: PathBuf,
}

impl FileStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }

    /// When the stored credential was written, if there is one
    pub fn saved_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read()?.map(|s| s.saved_at))
    }

    fn read(&self) -> Result<Option<StoredSession>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        match serde_json::from_str(&contents) {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt session file");
                Ok(None)
            }
        }
    }
}

impl RenewalStore for FileStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.read()?.map(|s| s.refresh_token))
    }

    fn set(&self, token: &str) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let stored = StoredSession {
            refresh_token: token.to_string(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;

        // Write beside the target and rename over it, so a concurrent reader
        // sees either the old file or the new one.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.cache_dir)
            .context("Failed to create temporary session file")?;
        tmp.write_all(contents.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .context("Failed to write session file")?;
        tmp.persist(self.path())
            .map_err(|e| e.error)
            .context("Failed to replace session file")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryStore::new();
        assert_eq!(store.get().unwrap(), None);

        store.set("first").unwrap();
        store.set("second").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("second"));

        store.remove().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("tglogin");

        FileStore::new(cache_dir.clone()).set("r-1").unwrap();

        let reopened = FileStore::new(cache_dir);
        assert_eq!(reopened.get().unwrap().as_deref(), Some("r-1"));
        assert!(reopened.saved_at().unwrap().is_some());

        reopened.remove().unwrap();
        assert!(!reopened.path().exists());
        assert_eq!(reopened.get().unwrap(), None);
        // removing twice is fine
        reopened.remove().unwrap();
    }

    #[test]
    fn test_file_store_rewrite_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.set("first").unwrap();

        let path = store.path();
        let reader = std::thread::spawn(move || {
            let mut seen = 0;
            for _ in 0..500 {
                let contents = std::fs::read_to_string(&path).expect("session file present");
                let parsed: StoredSession =
                    serde_json::from_str(&contents).expect("session file complete");
                assert!(
                    parsed.refresh_token == "first" || parsed.refresh_token.starts_with("rotated-")
                );
                seen += 1;
            }
            seen
        });

        for i in 0..200 {
            store.set(&format!("rotated-{i}")).unwrap();
        }
        assert_eq!(reader.join().unwrap(), 500);
        assert_eq!(store.get().unwrap().as_deref(), Some("rotated-199"));

        // only session.json remains, no leftover temporaries
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        std::fs::write(store.path(), "{not json").unwrap();

        assert_eq!(store.get().unwrap(), None);

        store.set("fresh").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("fresh"));
    }
}
