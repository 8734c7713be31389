use async_trait::async_trait;
use media_sync_models::{MediaIdentity, PartialDate};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("original date store I/O failed: {0}")]
    Io(String),
    #[error("original date store could not be encoded: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Completion dates overwritten by a rewatch, kept so the rewatch can be undone.
///
/// At most one date per key: the first completion. Only reconciliation writes and
/// only undo clears.
#[async_trait]
pub trait OriginalDateStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<PartialDate>, StoreError>;
    async fn write(&self, key: &str, date: PartialDate) -> Result<(), StoreError>;
    async fn clear(&self, key: &str) -> Result<(), StoreError>;
}

/// Side-store key for an item on one service, e.g. `anilist:show:154587`.
/// `None` when the identity has no id for that service.
pub fn store_key(service: &str, media: &MediaIdentity) -> Option<String> {
    media
        .ids
        .id_for_service(service)
        .map(|id| format!("{}:{}:{}", service.to_lowercase(), media.kind, id))
}

/// JSON file backed store. The whole table is small, so it is kept in memory and
/// rewritten on every change.
pub struct FileOriginalDateStore {
    path: PathBuf,
    dates: Mutex<BTreeMap<String, PartialDate>>,
}

impl FileOriginalDateStore {
    /// Load the table at `path`. A missing file starts an empty table; a corrupted
    /// one is moved aside to `.json.bak` first.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let dates = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match serde_json::from_str::<BTreeMap<String, PartialDate>>(&content) {
                Ok(dates) => {
                    debug!("Loaded {} original completion dates from {:?}", dates.len(), path);
                    dates
                }
                Err(e) => {
                    let backup_path = path.with_extension("json.bak");
                    warn!(
                        "Original completion dates at {:?} are corrupted ({}). Moving them to {:?} and starting empty.",
                        path, e, backup_path
                    );
                    std::fs::rename(path, &backup_path)?;
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            dates: Mutex::new(dates),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.dates.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.dates.lock().await.is_empty()
    }

    /// Drop every stored date
    pub async fn clear_all(&self) -> Result<usize, StoreError> {
        let mut dates = self.dates.lock().await;
        let removed = dates.len();
        self.persist(&BTreeMap::new())?;
        dates.clear();
        info!("Cleared {} original completion dates", removed);
        Ok(removed)
    }

    fn persist(&self, dates: &BTreeMap<String, PartialDate>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(dates)?;
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl OriginalDateStore for FileOriginalDateStore {
    async fn read(&self, key: &str) -> Result<Option<PartialDate>, StoreError> {
        Ok(self.dates.lock().await.get(key).copied())
    }

    async fn write(&self, key: &str, date: PartialDate) -> Result<(), StoreError> {
        let mut dates = self.dates.lock().await;
        // Memory only changes once the file does
        let mut updated = dates.clone();
        updated.insert(key.to_string(), date);
        self.persist(&updated)?;
        *dates = updated;
        debug!("Stashed original completion date {} for {}", date, key);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        let mut dates = self.dates.lock().await;
        if dates.contains_key(key) {
            let mut updated = dates.clone();
            updated.remove(key);
            self.persist(&updated)?;
            *dates = updated;
            debug!("Cleared original completion date for {}", key);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryOriginalDateStore {
    dates: Mutex<HashMap<String, PartialDate>>,
}

impl MemoryOriginalDateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> HashMap<String, PartialDate> {
        self.dates.lock().await.clone()
    }
}

#[async_trait]
impl OriginalDateStore for MemoryOriginalDateStore {
    async fn read(&self, key: &str) -> Result<Option<PartialDate>, StoreError> {
        Ok(self.dates.lock().await.get(key).copied())
    }

    async fn write(&self, key: &str, date: PartialDate) -> Result<(), StoreError> {
        self.dates.lock().await.insert(key.to_string(), date);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.dates.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_sync_models::MediaIds;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> PartialDate {
        PartialDate::ymd(y, m, d).unwrap()
    }

    #[test]
    fn test_store_key() {
        let show = MediaIdentity::show(MediaIds::anilist(154587));
        assert_eq!(store_key("AniList", &show).as_deref(), Some("anilist:show:154587"));
        assert_eq!(store_key("simkl", &show), None);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("original_completion_dates.json");

        let store = FileOriginalDateStore::open(&path).unwrap();
        assert!(store.is_empty().await);
        store.write("anilist:movie:1", date(2024, 6, 1)).await.unwrap();
        store.write("anilist:show:2", PartialDate::new(2023, None, None).unwrap()).await.unwrap();
        drop(store);

        let reopened = FileOriginalDateStore::open(&path).unwrap();
        assert_eq!(reopened.len().await, 2);
        assert_eq!(reopened.read("anilist:movie:1").await.unwrap(), Some(date(2024, 6, 1)));
        assert_eq!(
            reopened.read("anilist:show:2").await.unwrap().and_then(|d| d.month),
            None
        );

        reopened.clear("anilist:movie:1").await.unwrap();
        let reopened = FileOriginalDateStore::open(&path).unwrap();
        assert_eq!(reopened.read("anilist:movie:1").await.unwrap(), None);
        assert_eq!(reopened.clear_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupted_file_is_backed_up_and_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("original_completion_dates.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FileOriginalDateStore::open(&path).unwrap();
        assert!(store.is_empty().await);
        let backup = std::fs::read_to_string(dir.path().join("original_completion_dates.json.bak")).unwrap();
        assert_eq!(backup, "{ not json");
        store.write("anilist:movie:1", date(2024, 1, 2)).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("anilist:movie:1"));
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_table_unchanged() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = FileOriginalDateStore::open(&blocker.join("original_completion_dates.json")).unwrap();

        let result = store.write("anilist:movie:1", date(2024, 6, 1)).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(store.read("anilist:movie:1").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryOriginalDateStore::new();
        store.write("k", date(2024, 1, 1)).await.unwrap();
        store.write("k", date(2024, 2, 1)).await.unwrap();
        assert_eq!(store.read("k").await.unwrap(), Some(date(2024, 2, 1)));
        store.clear("k").await.unwrap();
        store.clear("missing").await.unwrap();
        assert!(store.snapshot().await.is_empty());
    }
}
