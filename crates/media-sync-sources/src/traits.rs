use async_trait::async_trait;
use media_sync_models::{EntryFields, EntryId, MediaIdentity, ScoreFormat, WatchEntry};
use crate::error::SourceError;

/// The transport side of a tracking service, as seen by the reconciliation engines.
///
/// Implementations resolve the service-specific id from the identity themselves
/// (see [`media_sync_models::MediaIds::id_for_service`]).
#[async_trait]
pub trait ListService: Send + Sync {
    // Service metadata
    fn service_name(&self) -> &str;

    /// Scale the service stores ratings in
    fn score_format(&self) -> ScoreFormat {
        ScoreFormat::Point10
    }

    /// Authoritative current entry, or `None` if the item is not on the user's list.
    async fn fetch_entry(&self, media: &MediaIdentity) -> Result<Option<WatchEntry>, SourceError>;

    /// Full-replace write of the reconciled fields. Creates the entry if needed.
    async fn write_entry(&self, media: &MediaIdentity, fields: &EntryFields) -> Result<EntryId, SourceError>;

    async fn delete_entry(&self, id: &EntryId) -> Result<(), SourceError>;

    /// Store a score, already converted to [`ListService::score_format`].
    async fn set_score(&self, media: &MediaIdentity, score: f32) -> Result<EntryId, SourceError>;
}
