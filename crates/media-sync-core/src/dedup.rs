use futures::future::{BoxFuture, FutureExt, Shared};
use media_sync_config::RetryConfig;
use media_sync_models::MediaKind;
use media_sync_sources::SourceError;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Remote-mutating operations the guard distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Playback stopped: record the watch
    Stop,
    Undo,
    Rate,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Stop => "stop",
            OperationKind::Undo => "undo",
            OperationKind::Rate => "rate",
        }
    }
}

/// Identity of one logical remote mutation, e.g. `stop-show-55-s1-e4`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey(String);

impl OperationKey {
    pub fn new(
        kind: OperationKind,
        media_kind: MediaKind,
        remote_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Self {
        let mut key = format!("{}-{}-{}", kind.as_str(), media_kind, remote_id);
        if let Some(season) = season {
            key.push_str(&format!("-s{}", season));
        }
        if let Some(episode) = episode {
            key.push_str(&format!("-e{}", episode));
        }
        Self(key)
    }

    /// A key built by the caller
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a guarded mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Applied(T),
    /// The service reported the action as already performed
    AlreadyApplied,
}

/// Bounded exponential backoff: `base * 2^(attempt-1)`, capped at `max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
    max: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            max,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Run `op`, retrying rate-limit and network failures. Anything else is
    /// returned as soon as it happens.
    pub async fn retry<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{}: {} error (attempt {}/{}), backing off {}ms: {}",
                        label,
                        err.category(),
                        attempt,
                        self.max_attempts,
                        delay.as_millis(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!("{}: giving up after {} attempts: {}", label, attempt, err);
                    }
                    return Err(err);
                }
            }
        }
    }

    /// [`RetryPolicy::retry`], with a conflict turned into [`Outcome::AlreadyApplied`].
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<Outcome<T>, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        match self.retry(label, op).await {
            Ok(value) => Ok(Outcome::Applied(value)),
            Err(err) if err.is_conflict() => {
                warn!("{}: already applied remotely ({})", label, err);
                Ok(Outcome::AlreadyApplied)
            }
            Err(err) => Err(err),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.backoff_base(), config.backoff_max())
    }
}

type SharedOp<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Collapses concurrent identical operations into one in-flight future.
///
/// The first caller for a key starts the operation; callers arriving while it runs
/// await the same future and get the same result. The key is released when the
/// operation finishes, successfully or not.
pub struct OperationGuard<T, E = SourceError> {
    in_flight: Arc<Mutex<HashMap<OperationKey, SharedOp<T, E>>>>,
    policy: RetryPolicy,
}

impl<T, E> Clone for OperationGuard<T, E> {
    fn clone(&self) -> Self {
        Self {
            in_flight: Arc::clone(&self.in_flight),
            policy: self.policy.clone(),
        }
    }
}

impl<T, E> OperationGuard<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Run `fut` under `key`, or join the operation already running under it.
    pub async fn coalesce<Fut>(&self, key: OperationKey, fut: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&key) {
                Some(running) => {
                    debug!(%key, "Joining in-flight operation");
                    running.clone()
                }
                None => {
                    let registry = Arc::clone(&self.in_flight);
                    let release_key = key.clone();
                    let op = async move {
                        let result = fut.await;
                        registry.lock().await.remove(&release_key);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, op.clone());
                    op
                }
            }
        };
        shared.await
    }
}

impl<T> OperationGuard<Outcome<T>, SourceError>
where
    T: Clone + Send + Sync + 'static,
{
    /// Deduplicated, retried remote mutation. A conflict response counts as success.
    pub async fn execute<F, Fut>(&self, key: OperationKey, op: F) -> Result<Outcome<T>, SourceError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, SourceError>> + Send + 'static,
    {
        let policy = self.policy.clone();
        let label = key.to_string();
        self.coalesce(key, async move { policy.run(&label, op).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn guard() -> OperationGuard<Outcome<u32>> {
        OperationGuard::new(RetryPolicy::new(3, Duration::from_millis(1_000), Duration::from_millis(8_000)))
    }

    /// An operation that counts its invocations and fails with `errors` in order
    /// before succeeding with `value`.
    fn counted(
        calls: Arc<AtomicUsize>,
        errors: Vec<SourceError>,
        value: u32,
    ) -> impl FnMut() -> BoxFuture<'static, Result<u32, SourceError>> + Send + 'static {
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            let result = errors.get(call).cloned().map_or(Ok(value), Err);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                result
            }
            .boxed()
        }
    }

    #[test]
    fn test_operation_keys() {
        assert_eq!(
            OperationKey::new(OperationKind::Stop, MediaKind::Movie, "123", None, None).as_str(),
            "stop-movie-123"
        );
        assert_eq!(
            OperationKey::new(OperationKind::Stop, MediaKind::Show, "55", Some(1), Some(4)).to_string(),
            "stop-show-55-s1-e4"
        );
        assert_eq!(
            OperationKey::new(OperationKind::Undo, MediaKind::Show, "55", None, None),
            OperationKey::raw("undo-show-55")
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(8));
        let delays: Vec<u64> = (1..=6).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 8, 8]);
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_identical_operations_collapse() {
        let guard = guard();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = OperationKey::raw("stop-movie-123");

        let (a, b) = tokio::join!(
            guard.execute(key.clone(), counted(calls.clone(), vec![], 7)),
            guard.execute(key.clone(), counted(calls.clone(), vec![], 8)),
        );
        assert_eq!(a, Ok(Outcome::Applied(7)));
        assert_eq!(b, Ok(Outcome::Applied(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(guard.in_flight_count().await, 0);

        // Released: the next call runs again
        let c = guard.execute(key, counted(calls.clone(), vec![], 9)).await;
        assert_eq!(c, Ok(Outcome::Applied(9)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_do_not_collapse() {
        let guard = guard();
        let calls = Arc::new(AtomicUsize::new(0));
        let (a, b) = tokio::join!(
            guard.execute(OperationKey::raw("stop-movie-1"), counted(calls.clone(), vec![], 1)),
            guard.execute(OperationKey::raw("stop-movie-2"), counted(calls.clone(), vec![], 2)),
        );
        assert_eq!(a, Ok(Outcome::Applied(1)));
        assert_eq!(b, Ok(Outcome::Applied(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_is_success() {
        let guard = guard();
        let calls = Arc::new(AtomicUsize::new(0));
        let result = guard
            .execute(
                OperationKey::raw("stop-movie-5"),
                counted(calls.clone(), vec![SourceError::Conflict("already watched".into())], 0),
            )
            .await;
        assert_eq!(result, Ok(Outcome::AlreadyApplied));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retry_with_backoff() {
        let guard = guard();
        let calls = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        let result = guard
            .execute(
                OperationKey::raw("stop-show-9-e2"),
                counted(
                    calls.clone(),
                    vec![
                        SourceError::RateLimited("slow down".into()),
                        SourceError::Network("reset".into()),
                    ],
                    3,
                ),
            )
            .await;
        assert_eq!(result, Ok(Outcome::Applied(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff plus three 50ms calls
        assert!(start.elapsed() >= Duration::from_millis(3_150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let guard = guard();
        let calls = Arc::new(AtomicUsize::new(0));
        let errors = vec![SourceError::Network("down".into()); 5];
        let result = guard
            .execute(OperationKey::raw("stop-movie-7"), counted(calls.clone(), errors, 0))
            .await;
        assert_eq!(result, Err(SourceError::Network("down".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(guard.in_flight_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_failures_propagate_immediately() {
        let guard = guard();
        let calls = Arc::new(AtomicUsize::new(0));
        let result = guard
            .execute(
                OperationKey::raw("rate-movie-7"),
                counted(calls.clone(), vec![SourceError::Unauthorized("token expired".into())], 0),
            )
            .await;
        assert!(matches!(result, Err(SourceError::Unauthorized(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesce_shares_errors() {
        let guard: OperationGuard<u32, String> = OperationGuard::new(RetryPolicy::default());
        let key = OperationKey::raw("undo-show-1");
        let slow_failure = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<u32, String>("boom".to_string())
        };
        let never_polled = async { Ok::<u32, String>(1) };
        let (a, b) = tokio::join!(
            guard.coalesce(key.clone(), slow_failure),
            guard.coalesce(key.clone(), never_polled),
        );
        assert_eq!(a, Err("boom".to_string()));
        assert_eq!(b, Err("boom".to_string()));
    }
}
