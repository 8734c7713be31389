use crate::dedup::{OperationGuard, OperationKey, OperationKind, Outcome, RetryPolicy};
use crate::original_dates::{store_key, OriginalDateStore, StoreError};
use crate::reconcile::{reconcile, Decision, ObservationError};
use crate::undo::{compute_undo, UndoAction};
use media_sync_models::{EntryId, MediaIdentity, Observation, PartialDate, Rating, WatchEntry};
use media_sync_sources::{ListService, SourceError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// What a context operation did to the remote list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrobbleOutcome {
    Written(EntryId),
    Deleted,
    /// Nothing to change; carries the existing entry id if there is one
    Ignored(Option<EntryId>),
    /// The service reported the write as already performed
    AlreadyApplied,
    /// Undo found no entry on the list
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrobbleError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("unreconcilable observation: {0}")]
    Observation(#[from] ObservationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{media} has no {service} id")]
    MissingRemoteId { service: String, media: String },
}

/// Everything an in-flight operation needs, shared with the guarded futures.
struct Backend {
    service: Arc<dyn ListService>,
    store: Arc<dyn OriginalDateStore>,
    policy: RetryPolicy,
}

/// Pairs the reconciliation and undo engines with one list service and the
/// original-date side store.
///
/// Identical operations issued while one is running join it instead of hitting
/// the service twice.
pub struct ScrobbleContext {
    backend: Arc<Backend>,
    guard: OperationGuard<ScrobbleOutcome, ScrobbleError>,
}

impl ScrobbleContext {
    pub fn new(
        service: Arc<dyn ListService>,
        store: Arc<dyn OriginalDateStore>,
        policy: RetryPolicy,
    ) -> Self {
        let guard = OperationGuard::new(policy.clone());
        Self {
            backend: Arc::new(Backend {
                service,
                store,
                policy,
            }),
            guard,
        }
    }

    pub fn service_name(&self) -> &str {
        self.backend.service.service_name()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.backend.policy
    }

    /// Record a finished view of `media`.
    pub async fn watch(
        &self,
        media: &MediaIdentity,
        observation: &Observation,
        now: PartialDate,
    ) -> Result<ScrobbleOutcome, ScrobbleError> {
        let remote_id = self.remote_id(media)?;
        let (season, episode) = match observation {
            Observation::Movie => (None, None),
            Observation::Show { episode, .. } => (media.season, *episode),
        };
        let key = OperationKey::new(OperationKind::Stop, media.kind, &remote_id, season, episode);
        let stash_key = self.stash_key(media)?;

        let backend = Arc::clone(&self.backend);
        let media = media.clone();
        let observation = *observation;
        let label = key.to_string();
        self.guard
            .coalesce(key, async move {
                backend.watch(&label, &media, &observation, now, &stash_key).await
            })
            .await
    }

    /// Revert the last watch recorded for `media`.
    pub async fn undo(&self, media: &MediaIdentity) -> Result<ScrobbleOutcome, ScrobbleError> {
        let remote_id = self.remote_id(media)?;
        let key = OperationKey::new(OperationKind::Undo, media.kind, &remote_id, None, None);
        let stash_key = self.stash_key(media)?;

        let backend = Arc::clone(&self.backend);
        let media = media.clone();
        let label = key.to_string();
        self.guard
            .coalesce(key, async move { backend.undo(&label, &media, &stash_key).await })
            .await
    }

    /// Store `rating`, converted to the service's score format.
    pub async fn rate(&self, media: &MediaIdentity, rating: Rating) -> Result<ScrobbleOutcome, ScrobbleError> {
        let remote_id = self.remote_id(media)?;
        let key = OperationKey::new(OperationKind::Rate, media.kind, &remote_id, None, None);
        let score = self.backend.service.score_format().from_rating(rating);

        let backend = Arc::clone(&self.backend);
        let media = media.clone();
        let label = key.to_string();
        self.guard
            .coalesce(key, async move { backend.rate(&label, &media, rating, score).await })
            .await
    }

    /// The entry as the service reports it right now.
    pub async fn current_entry(&self, media: &MediaIdentity) -> Result<Option<WatchEntry>, ScrobbleError> {
        self.remote_id(media)?;
        let entry = self
            .backend
            .policy
            .retry("fetch", || self.backend.service.fetch_entry(media))
            .await?;
        Ok(entry)
    }

    /// The stashed first completion date for `media`, if a rewatch is in progress.
    pub async fn original_completion_date(
        &self,
        media: &MediaIdentity,
    ) -> Result<Option<PartialDate>, ScrobbleError> {
        let key = self.stash_key(media)?;
        Ok(self.backend.store.read(&key).await?)
    }

    fn remote_id(&self, media: &MediaIdentity) -> Result<String, ScrobbleError> {
        media
            .ids
            .id_for_service(self.service_name())
            .ok_or_else(|| self.missing_id(media))
    }

    fn stash_key(&self, media: &MediaIdentity) -> Result<String, ScrobbleError> {
        store_key(self.service_name(), media).ok_or_else(|| self.missing_id(media))
    }

    fn missing_id(&self, media: &MediaIdentity) -> ScrobbleError {
        ScrobbleError::MissingRemoteId {
            service: self.service_name().to_string(),
            media: media.label(),
        }
    }
}

impl Backend {
    async fn watch(
        &self,
        label: &str,
        media: &MediaIdentity,
        observation: &Observation,
        now: PartialDate,
        stash_key: &str,
    ) -> Result<ScrobbleOutcome, ScrobbleError> {
        let existing = self.fetch(label, media).await?;
        let upsert = match reconcile(existing.as_ref(), observation, now)? {
            Decision::Ignore(id) => {
                debug!("{}: nothing to record for {}", label, media.label());
                return Ok(ScrobbleOutcome::Ignored(id));
            }
            Decision::Upsert(upsert) => upsert,
        };

        // Stash before the write overwrites the first completion date
        if let Some(original) = upsert.original_completion_date {
            self.store.write(stash_key, original).await?;
        }

        let outcome = self
            .policy
            .run(label, || self.service.write_entry(media, &upsert.fields))
            .await?;
        info!(
            "{}: {} now {} (progress={} repeat={})",
            label,
            media.label(),
            upsert.fields.status,
            upsert.fields.progress,
            upsert.fields.repeat
        );
        Ok(written(outcome))
    }

    async fn undo(
        &self,
        label: &str,
        media: &MediaIdentity,
        stash_key: &str,
    ) -> Result<ScrobbleOutcome, ScrobbleError> {
        let Some(current) = self.fetch(label, media).await? else {
            info!("{}: {} is not on the list, nothing to undo", label, media.label());
            return Ok(ScrobbleOutcome::Missing);
        };
        let original = self.store.read(stash_key).await?;
        let plan = compute_undo(&current, original);

        let outcome = match &plan.action {
            UndoAction::Delete => {
                let id = current.id.clone().ok_or_else(|| {
                    SourceError::Other(format!("{} entry has no id to delete", media.label()))
                })?;
                let outcome = self
                    .policy
                    .run(label, || self.service.delete_entry(&id))
                    .await?;
                info!("{}: removed {} from the list", label, media.label());
                match outcome {
                    Outcome::Applied(()) => ScrobbleOutcome::Deleted,
                    Outcome::AlreadyApplied => ScrobbleOutcome::AlreadyApplied,
                }
            }
            UndoAction::Update(patch) => {
                let mut target = current.clone();
                target.apply_patch(patch);
                let fields = target.fields().ok_or_else(|| {
                    SourceError::Other(format!("{} entry has no status after undo", media.label()))
                })?;
                let outcome = self
                    .policy
                    .run(label, || self.service.write_entry(media, &fields))
                    .await?;
                info!(
                    "{}: reverted {} to {} (progress={} repeat={})",
                    label,
                    media.label(),
                    fields.status,
                    fields.progress,
                    fields.repeat
                );
                written(outcome)
            }
        };

        if plan.clear_original_date {
            self.store.clear(stash_key).await?;
        }
        Ok(outcome)
    }

    async fn rate(
        &self,
        label: &str,
        media: &MediaIdentity,
        rating: Rating,
        score: f32,
    ) -> Result<ScrobbleOutcome, ScrobbleError> {
        let outcome = self
            .policy
            .run(label, || self.service.set_score(media, score))
            .await?;
        info!("{}: rated {} as {} (score {})", label, media.label(), rating, score);
        Ok(written(outcome))
    }

    async fn fetch(&self, label: &str, media: &MediaIdentity) -> Result<Option<WatchEntry>, SourceError> {
        self.policy
            .retry(label, || self.service.fetch_entry(media))
            .await
    }
}

fn written(outcome: Outcome<EntryId>) -> ScrobbleOutcome {
    match outcome {
        Outcome::Applied(id) => ScrobbleOutcome::Written(id),
        Outcome::AlreadyApplied => ScrobbleOutcome::AlreadyApplied,
    }
}
