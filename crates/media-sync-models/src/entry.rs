use serde::{Deserialize, Serialize};
use std::fmt;
use crate::date::PartialDate;
use crate::media::MediaKind;
use crate::status::WatchStatus;

/// Opaque identifier of a remote list entry. AniList uses numbers, other
/// services use strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum EntryId {
    Number(u64),
    Text(String),
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Number(id) => write!(f, "{}", id),
            EntryId::Text(id) => f.write_str(id),
        }
    }
}

impl From<u64> for EntryId {
    fn from(id: u64) -> Self {
        EntryId::Number(id)
    }
}

impl From<&str> for EntryId {
    fn from(id: &str) -> Self {
        EntryId::Text(id.to_string())
    }
}

/// One user's list entry for one media item, as the remote service reports it.
///
/// Every field except `media_kind` may be missing: the service omits what it has
/// never recorded. The engines normalize absent `progress`/`repeat` to zero on input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntryId>,
    pub media_kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WatchStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<PartialDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<PartialDate>,
    /// Episode count of a show, when the service knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_episodes: Option<u32>,
    /// Score in the service's own format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl WatchEntry {
    pub fn new(media_kind: MediaKind) -> Self {
        Self {
            id: None,
            media_kind,
            status: None,
            progress: None,
            repeat: None,
            started_at: None,
            completed_at: None,
            total_episodes: None,
            score: None,
        }
    }

    /// Full-replace of the reconciled fields; id, total and score are untouched.
    pub fn apply_fields(&mut self, fields: &EntryFields) {
        self.status = Some(fields.status);
        self.progress = Some(fields.progress);
        self.repeat = Some(fields.repeat);
        self.started_at = fields.started_at;
        self.completed_at = fields.completed_at;
    }

    pub fn apply_patch(&mut self, patch: &EntryPatch) {
        if let Some(status) = patch.status {
            self.status = Some(status);
        }
        if let Some(progress) = patch.progress {
            self.progress = Some(progress);
        }
        if let Some(repeat) = patch.repeat {
            self.repeat = Some(repeat);
        }
        match patch.completed_at {
            DateChange::Keep => {}
            DateChange::Set(date) => self.completed_at = Some(date),
            DateChange::Clear => self.completed_at = None,
        }
    }

    /// The reconciled fields of this entry, as an absolute write target.
    /// `None` when the entry has no status to write.
    pub fn fields(&self) -> Option<EntryFields> {
        Some(EntryFields {
            status: self.status?,
            progress: self.progress.unwrap_or(0),
            repeat: self.repeat.unwrap_or(0),
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

/// The fields the reconciliation engine owns. Written as a whole, never as a delta,
/// so a retried write cannot double-apply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryFields {
    pub status: WatchStatus,
    pub progress: u32,
    pub repeat: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<PartialDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<PartialDate>,
}

/// Change to an optional date: leave it, overwrite it, or remove it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DateChange {
    #[default]
    Keep,
    Set(PartialDate),
    Clear,
}

/// Partial update produced by undo; `None` fields are left as they are.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryPatch {
    pub status: Option<WatchStatus>,
    pub progress: Option<u32>,
    pub repeat: Option<u32>,
    pub completed_at: DateChange,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_show() -> WatchEntry {
        WatchEntry {
            id: Some(EntryId::Number(7)),
            status: Some(WatchStatus::Completed),
            progress: Some(12),
            repeat: Some(0),
            completed_at: Some(PartialDate::ymd(2024, 1, 5).unwrap()),
            total_episodes: Some(12),
            ..WatchEntry::new(MediaKind::Show)
        }
    }

    #[test]
    fn test_apply_patch_only_touches_set_fields() {
        let mut entry = completed_show();
        entry.apply_patch(&EntryPatch {
            status: Some(WatchStatus::Current),
            progress: Some(11),
            completed_at: DateChange::Clear,
            ..EntryPatch::default()
        });
        assert_eq!(entry.status, Some(WatchStatus::Current));
        assert_eq!(entry.progress, Some(11));
        assert_eq!(entry.repeat, Some(0));
        assert_eq!(entry.completed_at, None);
        assert_eq!(entry.total_episodes, Some(12));
    }

    #[test]
    fn test_fields_round_trip_through_apply() {
        let entry = completed_show();
        let fields = entry.fields().unwrap();
        let mut fresh = WatchEntry::new(MediaKind::Show);
        fresh.apply_fields(&fields);
        assert_eq!(fresh.fields(), Some(fields));
        assert_eq!(WatchEntry::new(MediaKind::Movie).fields(), None);
    }

    #[test]
    fn test_entry_id_serializes_untagged() {
        assert_eq!(serde_json::to_string(&EntryId::Number(5)).unwrap(), "5");
        let text: EntryId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(text, EntryId::from("abc"));
        assert_eq!(text.to_string(), "abc");
    }
}
