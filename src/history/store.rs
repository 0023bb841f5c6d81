use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::log::HistoryEntry;

#[derive(Debug, Error)]
pub enum HistoryStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load-once / save-on-change persistence for the history log. Records are
/// exchanged newest first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load(&self) -> Result<Vec<HistoryEntry>, HistoryStoreError>;
    async fn save(&self, newest_first: &[HistoryEntry]) -> Result<(), HistoryStoreError>;
}

/// History kept as a JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Like [`HistoryStore::load`], but an unreadable or corrupt file yields an
    /// empty history instead of an error.
    pub async fn load_or_empty(&self) -> Vec<HistoryEntry> {
        match self.load().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(%err, path = %self.path.display(), "failed to load history; starting empty");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl HistoryStore for JsonFileStore {
    #[instrument(skip_all)]
    async fn load(&self) -> Result<Vec<HistoryEntry>, HistoryStoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let entries: Vec<HistoryEntry> = serde_json::from_str(&content)?;
        info!(count = entries.len(), path = %self.path.display(), "loaded history");
        Ok(entries)
    }

    #[instrument(skip_all)]
    async fn save(&self, newest_first: &[HistoryEntry]) -> Result<(), HistoryStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(newest_first)?;
        // Write-then-rename; a per-save tmp name keeps concurrent saves apart.
        let tmp = self
            .path
            .with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Volatile store for front ends that do not persist history.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn load(&self) -> Result<Vec<HistoryEntry>, HistoryStoreError> {
        Ok(self.saved())
    }

    async fn save(&self, newest_first: &[HistoryEntry]) -> Result<(), HistoryStoreError> {
        if let Ok(mut entries) = self.entries.lock() {
            *entries = newest_first.to_vec();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Surface, Tone};
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_is_empty_history() {
        let td = tempdir().unwrap();
        let store = JsonFileStore::new(td.path().join("history.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load() {
        let td = tempdir().unwrap();
        let store = JsonFileStore::new(td.path().join("nested").join("history.json"));
        let entries = vec![
            HistoryEntry::new(Tone::Witty, vec![Surface::Twitter]),
            HistoryEntry::new(Tone::Casual, vec![Surface::LinkedIn, Surface::Threads]),
        ];
        store.save(&entries).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].surfaces, vec![Surface::LinkedIn, Surface::Threads]);
        // millisecond precision survives
        assert_eq!(
            loaded[0].timestamp.timestamp_millis(),
            entries[0].timestamp.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn concurrent_saves_do_not_share_a_tmp_file() {
        let td = tempdir().unwrap();
        let store = JsonFileStore::new(td.path().join("history.json"));
        let one = vec![HistoryEntry::new(Tone::Witty, vec![Surface::Twitter])];
        let two = vec![
            HistoryEntry::new(Tone::Casual, vec![Surface::Threads]),
            HistoryEntry::new(Tone::Witty, vec![Surface::Twitter]),
        ];
        let (a, b) = tokio::join!(store.save(&one), store.save(&two));
        a.unwrap();
        b.unwrap();
        let loaded = store.load().await.unwrap();
        assert!(loaded.len() == 1 || loaded.len() == 2);
        let leftovers = std::fs::read_dir(td.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_empty() {
        let td = tempdir().unwrap();
        let path = td.path().join("history.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let store = JsonFileStore::new(&path);
        assert!(store.load().await.is_err());
        assert!(store.load_or_empty().await.is_empty());
    }

    #[tokio::test]
    async fn reads_plain_json_records() {
        let td = tempdir().unwrap();
        let path = td.path().join("history.json");
        tokio::fs::write(
            &path,
            r#"[{"timestamp":1700000000000,"tone":"Urgent","surfaces":["Instagram"]}]"#,
        )
        .await
        .unwrap();
        let loaded = JsonFileStore::new(&path).load().await.unwrap();
        assert_eq!(loaded[0].tone, Tone::Urgent);
        assert_eq!(loaded[0].timestamp.timestamp_millis(), 1_700_000_000_000);
    }
}
