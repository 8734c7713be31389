use async_trait::async_trait;
use media_sync_core::{
    FileOriginalDateStore, MemoryOriginalDateStore, OriginalDateStore, RetryPolicy, ScrobbleContext,
    ScrobbleError, ScrobbleOutcome,
};
use media_sync_models::{
    EntryFields, EntryId, MediaIdentity, MediaIds, Observation, PartialDate, Rating, ScoreFormat,
    WatchEntry, WatchStatus,
};
use media_sync_sources::{ListService, LocalListService, SourceError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Local list with scripted write failures and a slow round trip, counting calls.
struct FlakyService {
    inner: LocalListService,
    write_failures: Mutex<VecDeque<SourceError>>,
    latency: Duration,
    writes: AtomicUsize,
    fetches: AtomicUsize,
}

impl FlakyService {
    fn new(inner: LocalListService) -> Self {
        Self {
            inner,
            write_failures: Mutex::new(VecDeque::new()),
            latency: Duration::from_millis(20),
            writes: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fail_writes_with(self, errors: Vec<SourceError>) -> Self {
        *self.write_failures.lock().unwrap() = errors.into();
        self
    }

    fn next_failure(&self) -> Option<SourceError> {
        self.write_failures.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl ListService for FlakyService {
    fn service_name(&self) -> &str {
        self.inner.service_name()
    }

    fn score_format(&self) -> ScoreFormat {
        self.inner.score_format()
    }

    async fn fetch_entry(&self, media: &MediaIdentity) -> Result<Option<WatchEntry>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.inner.fetch_entry(media).await
    }

    async fn write_entry(&self, media: &MediaIdentity, fields: &EntryFields) -> Result<EntryId, SourceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        self.inner.write_entry(media, fields).await
    }

    async fn delete_entry(&self, id: &EntryId) -> Result<(), SourceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        self.inner.delete_entry(id).await
    }

    async fn set_score(&self, media: &MediaIdentity, score: f32) -> Result<EntryId, SourceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_score(media, score).await
    }
}

fn date(y: i32, m: u32, d: u32) -> PartialDate {
    PartialDate::ymd(y, m, d).unwrap()
}

fn movie() -> MediaIdentity {
    MediaIdentity::movie(MediaIds::anilist(123)).with_title("Perfect Blue", Some(1997))
}

fn show() -> MediaIdentity {
    MediaIdentity::show(MediaIds::anilist(55)).with_season(1)
}

fn policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(800))
}

fn context(service: Arc<FlakyService>) -> (ScrobbleContext, Arc<MemoryOriginalDateStore>) {
    let store = Arc::new(MemoryOriginalDateStore::new());
    let ctx = ScrobbleContext::new(service, store.clone(), policy());
    (ctx, store)
}

async fn entry(service: &FlakyService, media: &MediaIdentity) -> Option<WatchEntry> {
    service.inner.fetch_entry(media).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_movie_watch_rewatch_and_undo() {
    let service = Arc::new(FlakyService::new(LocalListService::in_memory("anilist")));
    let (ctx, store) = context(service.clone());

    let first = ctx.watch(&movie(), &Observation::Movie, date(2024, 6, 1)).await.unwrap();
    assert_eq!(first, ScrobbleOutcome::Written(EntryId::Number(1)));

    ctx.watch(&movie(), &Observation::Movie, date(2024, 7, 1)).await.unwrap();
    let rewatched = entry(&service, &movie()).await.unwrap();
    assert_eq!(rewatched.status, Some(WatchStatus::Repeating));
    assert_eq!(rewatched.repeat, Some(1));
    assert_eq!(rewatched.started_at, Some(date(2024, 6, 1)));
    assert_eq!(rewatched.completed_at, Some(date(2024, 7, 1)));
    assert_eq!(
        ctx.original_completion_date(&movie()).await.unwrap(),
        Some(date(2024, 6, 1))
    );

    let undone = ctx.undo(&movie()).await.unwrap();
    assert_eq!(undone, ScrobbleOutcome::Written(EntryId::Number(1)));
    let restored = entry(&service, &movie()).await.unwrap();
    assert_eq!(restored.status, Some(WatchStatus::Completed));
    assert_eq!(restored.repeat, Some(0));
    assert_eq!(restored.completed_at, Some(date(2024, 6, 1)));
    assert!(store.snapshot().await.is_empty());

    assert_eq!(ctx.undo(&movie()).await.unwrap(), ScrobbleOutcome::Deleted);
    assert_eq!(entry(&service, &movie()).await, None);
    assert_eq!(ctx.undo(&movie()).await.unwrap(), ScrobbleOutcome::Missing);
}

#[tokio::test(start_paused = true)]
async fn test_show_rewatch_round_trip() {
    let service = Arc::new(FlakyService::new(LocalListService::in_memory("anilist")));
    service
        .inner
        .seed(
            &show(),
            WatchEntry {
                status: Some(WatchStatus::Completed),
                progress: Some(12),
                repeat: Some(0),
                started_at: Some(date(2024, 1, 1)),
                completed_at: Some(date(2024, 3, 1)),
                total_episodes: Some(12),
                ..WatchEntry::new(media_sync_models::MediaKind::Show)
            },
        )
        .await
        .unwrap();
    let (ctx, _store) = context(service.clone());

    ctx.watch(&show(), &Observation::episode(1, Some(12)), date(2024, 9, 1))
        .await
        .unwrap();
    let rewatching = entry(&service, &show()).await.unwrap();
    assert_eq!(rewatching.status, Some(WatchStatus::Repeating));
    assert_eq!(rewatching.repeat, Some(1));
    assert_eq!(rewatching.completed_at, None);

    ctx.undo(&show()).await.unwrap();
    let restored = entry(&service, &show()).await.unwrap();
    assert_eq!(restored.status, Some(WatchStatus::Completed));
    assert_eq!(restored.progress, Some(12));
    assert_eq!(restored.repeat, Some(0));
    assert_eq!(restored.completed_at, Some(date(2024, 3, 1)));
    assert_eq!(ctx.original_completion_date(&show()).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_backward_view_writes_nothing() {
    let service = Arc::new(FlakyService::new(LocalListService::in_memory("anilist")));
    let (ctx, _store) = context(service.clone());
    ctx.watch(&show(), &Observation::episode(10, Some(12)), date(2024, 6, 1))
        .await
        .unwrap();
    let writes = service.writes.load(Ordering::SeqCst);

    let outcome = ctx
        .watch(&show(), &Observation::episode(5, Some(12)), date(2024, 6, 2))
        .await
        .unwrap();
    assert_eq!(outcome, ScrobbleOutcome::Ignored(Some(EntryId::Number(1))));
    assert_eq!(service.writes.load(Ordering::SeqCst), writes);
    assert_eq!(entry(&service, &show()).await.unwrap().progress, Some(10));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_identical_watches_write_once() {
    let service = Arc::new(FlakyService::new(LocalListService::in_memory("anilist")));
    let (ctx, store) = context(service.clone());
    ctx.watch(&movie(), &Observation::Movie, date(2024, 6, 1)).await.unwrap();
    let writes = service.writes.load(Ordering::SeqCst);

    // Without collapsing, the second rewatch would count twice
    let media = movie();
    let (a, b) = tokio::join!(
        ctx.watch(&media, &Observation::Movie, date(2024, 7, 1)),
        ctx.watch(&media, &Observation::Movie, date(2024, 7, 1)),
    );
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(service.writes.load(Ordering::SeqCst), writes + 1);
    assert_eq!(entry(&service, &movie()).await.unwrap().repeat, Some(1));
    assert_eq!(store.snapshot().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_different_episodes_are_not_collapsed() {
    let service = Arc::new(FlakyService::new(LocalListService::in_memory("anilist")));
    let (ctx, _store) = context(service.clone());
    ctx.watch(&show(), &Observation::episode(1, Some(12)), date(2024, 6, 1))
        .await
        .unwrap();
    ctx.watch(&show(), &Observation::episode(2, Some(12)), date(2024, 6, 1))
        .await
        .unwrap();
    assert_eq!(entry(&service, &show()).await.unwrap().progress, Some(2));
    assert_eq!(service.writes.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_write_is_retried() {
    let service = Arc::new(
        FlakyService::new(LocalListService::in_memory("anilist")).fail_writes_with(vec![
            SourceError::RateLimited("429".into()),
            SourceError::Network("connection reset".into()),
        ]),
    );
    let (ctx, _store) = context(service.clone());
    let outcome = ctx.watch(&movie(), &Observation::Movie, date(2024, 6, 1)).await.unwrap();
    assert!(matches!(outcome, ScrobbleOutcome::Written(_)));
    assert_eq!(service.writes.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_the_error() {
    let service = Arc::new(
        FlakyService::new(LocalListService::in_memory("anilist"))
            .fail_writes_with(vec![SourceError::RateLimited("429".into()); 4]),
    );
    let (ctx, _store) = context(service.clone());
    let result = ctx.watch(&movie(), &Observation::Movie, date(2024, 6, 1)).await;
    assert_eq!(
        result,
        Err(ScrobbleError::Source(SourceError::RateLimited("429".into())))
    );
    assert_eq!(service.writes.load(Ordering::SeqCst), 3);
    assert_eq!(entry(&service, &movie()).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_conflict_counts_as_already_applied() {
    let service = Arc::new(
        FlakyService::new(LocalListService::in_memory("anilist"))
            .fail_writes_with(vec![SourceError::Conflict("already scrobbled".into())]),
    );
    let (ctx, _store) = context(service.clone());
    let outcome = ctx.watch(&movie(), &Observation::Movie, date(2024, 6, 1)).await.unwrap();
    assert_eq!(outcome, ScrobbleOutcome::AlreadyApplied);
    assert_eq!(service.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unreconcilable_observation_is_reported() {
    let service = Arc::new(FlakyService::new(LocalListService::in_memory("anilist")));
    let (ctx, _store) = context(service.clone());
    let no_episode = Observation::Show {
        episode: None,
        total_episodes: Some(12),
    };
    let result = ctx.watch(&show(), &no_episode, date(2024, 6, 1)).await;
    assert!(matches!(result, Err(ScrobbleError::Observation(_))));
    assert_eq!(service.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_identity_without_service_id_is_rejected() {
    let service = Arc::new(FlakyService::new(LocalListService::in_memory("anilist")));
    let (ctx, _store) = context(service.clone());
    let trakt_only = MediaIdentity::movie(MediaIds::trakt(481));
    let result = ctx.watch(&trakt_only, &Observation::Movie, date(2024, 6, 1)).await;
    assert!(matches!(result, Err(ScrobbleError::MissingRemoteId { .. })));
    assert_eq!(service.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rating_is_converted_to_service_scale() {
    let local = LocalListService::in_memory("anilist").with_score_format(ScoreFormat::Point100);
    let service = Arc::new(FlakyService::new(local));
    let (ctx, _store) = context(service.clone());
    let rating = Rating::new(8).unwrap();
    assert!(matches!(
        ctx.rate(&movie(), rating).await.unwrap(),
        ScrobbleOutcome::Written(_)
    ));
    assert_eq!(entry(&service, &movie()).await.unwrap().score, Some(80.0));
}

#[tokio::test]
async fn test_stash_and_list_survive_restart() {
    let dir = TempDir::new().unwrap();
    let list_path = dir.path().join("lists").join("anilist.json");
    let stash_path = dir.path().join("original_completion_dates.json");

    {
        let service = Arc::new(LocalListService::open("anilist", &list_path).unwrap());
        let store = Arc::new(FileOriginalDateStore::open(&stash_path).unwrap());
        let ctx = ScrobbleContext::new(service, store, RetryPolicy::default());
        ctx.watch(&movie(), &Observation::Movie, date(2024, 6, 1)).await.unwrap();
        ctx.watch(&movie(), &Observation::Movie, date(2024, 7, 1)).await.unwrap();
    }

    let service = Arc::new(LocalListService::open("anilist", &list_path).unwrap());
    let store = Arc::new(FileOriginalDateStore::open(&stash_path).unwrap());
    assert_eq!(
        store.read("anilist:movie:123").await.unwrap(),
        Some(date(2024, 6, 1))
    );
    let ctx = ScrobbleContext::new(service.clone(), store.clone(), RetryPolicy::default());
    ctx.undo(&movie()).await.unwrap();

    let restored = service.fetch_entry(&movie()).await.unwrap().unwrap();
    assert_eq!(restored.completed_at, Some(date(2024, 6, 1)));
    assert_eq!(restored.status, Some(WatchStatus::Completed));
    assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_rated_movie_first_watch_is_not_a_rewatch() {
    let service = Arc::new(FlakyService::new(LocalListService::in_memory("anilist")));
    let (ctx, store) = context(service.clone());
    ctx.rate(&movie(), Rating::new(8).unwrap()).await.unwrap();
    let rated = entry(&service, &movie()).await.unwrap();
    assert_eq!(rated.status, None);

    ctx.watch(&movie(), &Observation::Movie, date(2024, 6, 1)).await.unwrap();
    let watched = entry(&service, &movie()).await.unwrap();
    assert_eq!(watched.status, Some(WatchStatus::Completed));
    assert_eq!(watched.repeat, Some(0));
    assert_eq!(watched.started_at, Some(date(2024, 6, 1)));
    assert_eq!(watched.completed_at, Some(date(2024, 6, 1)));
    assert!(store.snapshot().await.is_empty());

    // The only watch is undone, so the entry goes away
    assert_eq!(ctx.undo(&movie()).await.unwrap(), ScrobbleOutcome::Deleted);
    assert_eq!(entry(&service, &movie()).await, None);
}
