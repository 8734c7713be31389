use anyhow::Result;
use async_trait::async_trait;
use media_sync_models::{EntryFields, EntryId, MediaIdentity, ScoreFormat, WatchEntry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use crate::error::SourceError;
use crate::traits::ListService;

/// A list service kept on this machine.
///
/// Behaves like a remote list: entries are keyed by media kind and the id the
/// identity carries for this service, and get numeric entry ids on creation.
/// With a backing file every mutation is persisted as JSON.
pub struct LocalListService {
    name: String,
    score_format: ScoreFormat,
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, WatchEntry>>,
}

impl LocalListService {
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score_format: ScoreFormat::default(),
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Open (or start) a list persisted at `path`. A corrupted file is moved aside
    /// and the list starts empty.
    pub fn open(name: impl Into<String>, path: &Path) -> Result<Self> {
        let name = name.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match serde_json::from_str::<BTreeMap<String, WatchEntry>>(&content) {
                Ok(entries) => {
                    debug!("Loaded {} local list entries for {}", entries.len(), name);
                    entries
                }
                Err(e) => {
                    let backup_path = path.with_extension("json.bak");
                    warn!(
                        "Local list {:?} is corrupted ({}). Moving it to {:?} and starting empty.",
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
            name,
            score_format: ScoreFormat::default(),
            path: Some(path.to_path_buf()),
            entries: Mutex::new(entries),
        })
    }

    pub fn with_score_format(mut self, score_format: ScoreFormat) -> Self {
        self.score_format = score_format;
        self
    }

    /// Put an entry in place as if the user had edited the list by hand.
    pub async fn seed(&self, media: &MediaIdentity, mut entry: WatchEntry) -> Result<EntryId, SourceError> {
        let key = self.key_for(media)?;
        let mut entries = self.entries.lock().await;
        let id = match entry.id.clone() {
            Some(id) => id,
            None => next_id(&entries),
        };
        entry.id = Some(id.clone());
        entries.insert(key, entry);
        self.persist(&entries)?;
        Ok(id)
    }

    /// All entries, keyed by `kind:id`.
    pub async fn entries(&self) -> BTreeMap<String, WatchEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn clear(&self) -> Result<usize, SourceError> {
        let mut entries = self.entries.lock().await;
        let removed = entries.len();
        entries.clear();
        self.persist(&entries)?;
        Ok(removed)
    }

    fn key_for(&self, media: &MediaIdentity) -> Result<String, SourceError> {
        let id = media.ids.id_for_service(&self.name).ok_or_else(|| {
            SourceError::NotFound(format!("{} has no {} id", media.label(), self.name))
        })?;
        Ok(format!("{}:{}", media.kind, id))
    }

    fn persist(&self, entries: &BTreeMap<String, WatchEntry>) -> Result<(), SourceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }
}

fn next_id(entries: &BTreeMap<String, WatchEntry>) -> EntryId {
    let max = entries
        .values()
        .filter_map(|e| match e.id {
            Some(EntryId::Number(n)) => Some(n),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    EntryId::Number(max + 1)
}

#[async_trait]
impl ListService for LocalListService {
    fn service_name(&self) -> &str {
        &self.name
    }

    fn score_format(&self) -> ScoreFormat {
        self.score_format
    }

    async fn fetch_entry(&self, media: &MediaIdentity) -> Result<Option<WatchEntry>, SourceError> {
        let key = self.key_for(media)?;
        Ok(self.entries.lock().await.get(&key).cloned())
    }

    async fn write_entry(&self, media: &MediaIdentity, fields: &EntryFields) -> Result<EntryId, SourceError> {
        let key = self.key_for(media)?;
        let mut entries = self.entries.lock().await;
        let new_id = next_id(&entries);
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            let mut entry = WatchEntry::new(media.kind);
            entry.id = Some(new_id);
            entry
        });
        entry.apply_fields(fields);
        let id = entry.id.clone().ok_or_else(|| SourceError::Storage(format!("entry {} has no id", key)))?;
        info!(
            "{}: wrote {} ({} progress={} repeat={})",
            self.name, key, fields.status, fields.progress, fields.repeat
        );
        self.persist(&entries)?;
        Ok(id)
    }

    async fn delete_entry(&self, id: &EntryId) -> Result<(), SourceError> {
        let mut entries = self.entries.lock().await;
        let key = entries
            .iter()
            .find(|(_, e)| e.id.as_ref() == Some(id))
            .map(|(k, _)| k.clone())
            .ok_or_else(|| SourceError::NotFound(format!("no entry with id {}", id)))?;
        entries.remove(&key);
        info!("{}: deleted {} (entry {})", self.name, key, id);
        self.persist(&entries)?;
        Ok(())
    }

    async fn set_score(&self, media: &MediaIdentity, score: f32) -> Result<EntryId, SourceError> {
        let key = self.key_for(media)?;
        let mut entries = self.entries.lock().await;
        let new_id = next_id(&entries);
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            let mut entry = WatchEntry::new(media.kind);
            entry.id = Some(new_id);
            entry
        });
        entry.score = Some(score);
        let id = entry.id.clone().ok_or_else(|| SourceError::Storage(format!("entry {} has no id", key)))?;
        info!("{}: scored {} = {}", self.name, key, score);
        self.persist(&entries)?;
        Ok(id)
    }
}
