//! Rate-limited concurrent reader
//!
//! Source files are read through a small worker pool. Every worker reserves
//! a slot on one shared [`RateLimiter`] before touching the facade, so the
//! minimum spacing holds across the whole pool rather than per worker.

use crate::error::RepoError;
use crate::model::DiscoveredFile;
use crate::repo::RepositoryFacade;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_MAX_WORKERS: usize = 3;
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_BACKOFF_SECS: [u64; 3] = [20, 30, 40];

#[derive(Debug, Clone)]
pub struct ReadPolicy {
    pub max_workers: usize,
    pub min_interval: Duration,
    /// Delay before each retry of a throttled read; its length caps retries
    pub backoff: Vec<Duration>,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            min_interval: DEFAULT_MIN_INTERVAL,
            backoff: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }
}

impl ReadPolicy {
    pub fn workers_for(&self, files: usize) -> usize {
        self.max_workers.max(1).min(files.max(1))
    }
}

/// Global spacing between facade requests.
///
/// The lock covers only the slot reservation; callers sleep outside it.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    fn reserve(&self) -> Instant {
        let now = Instant::now();
        let mut last = self
            .next_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let slot = match *last {
            Some(previous) => (previous + self.min_interval).max(now),
            None => now,
        };
        *last = Some(slot);
        slot
    }

    /// Wait until this caller may issue its request.
    pub async fn acquire(&self) {
        let slot = self.reserve();
        if slot > Instant::now() {
            tokio::time::sleep_until(slot).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub file: DiscoveredFile,
    pub result: Result<String, RepoError>,
    /// Facade calls spent on this file, retries included
    pub attempts: usize,
}

impl ReadOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

async fn read_one(
    facade: &dyn RepositoryFacade,
    limiter: &RateLimiter,
    policy: &ReadPolicy,
    file: DiscoveredFile,
) -> ReadOutcome {
    let mut attempts = 0usize;
    loop {
        limiter.acquire().await;
        attempts += 1;
        match facade.read_file(&file.path, Some(&file.branch)).await {
            Ok(content) => {
                return ReadOutcome {
                    file,
                    result: Ok(content),
                    attempts,
                }
            }
            Err(err) if err.is_throttling() && attempts <= policy.backoff.len() => {
                let delay = policy.backoff[attempts - 1];
                tracing::warn!(
                    path = %file.path,
                    attempt = attempts,
                    delay_secs = delay.as_secs(),
                    "read throttled, backing off: {}",
                    err
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                tracing::error!(path = %file.path, attempts, "read failed: {}", err);
                return ReadOutcome {
                    file,
                    result: Err(err),
                    attempts,
                };
            }
        }
    }
}

/// Read every file, returning one outcome per input in input order.
///
/// `on_progress` receives (completed, total) and may be called from several
/// workers at once.
pub async fn read_all<F>(
    facade: &dyn RepositoryFacade,
    files: Vec<DiscoveredFile>,
    policy: &ReadPolicy,
    on_progress: F,
) -> Vec<ReadOutcome>
where
    F: Fn(usize, usize) + Send + Sync,
{
    let total = files.len();
    if total == 0 {
        return Vec::new();
    }
    let limiter = RateLimiter::new(policy.min_interval);
    let completed = AtomicUsize::new(0);
    let workers = policy.workers_for(total);
    tracing::info!(files = total, workers, "reading source files");

    let limiter = &limiter;
    let completed = &completed;
    let on_progress = &on_progress;
    let mut outcomes: Vec<(usize, ReadOutcome)> = stream::iter(files.into_iter().enumerate())
        .map(|(index, file)| async move {
            let outcome = read_one(facade, limiter, policy, file).await;
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            on_progress(done, total);
            (index, outcome)
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepoErrorKind;
    use crate::model::FileRole;
    use crate::repo::testing::FaultyRepository;
    use crate::repo::MemoryRepository;
    use std::sync::Arc;

    fn seeded(count: usize) -> (MemoryRepository, Vec<DiscoveredFile>) {
        let files: Vec<(String, String)> = (0..count)
            .map(|i| (format!("src/steps/S{}.java", i), format!("class S{} {{}}", i)))
            .collect();
        let repo = MemoryRepository::with_branch("main", files.clone());
        let discovered = files
            .into_iter()
            .map(|(path, _)| DiscoveredFile {
                path,
                role: FileRole::StepDefinition,
                branch: "main".to_string(),
            })
            .collect();
        (repo, discovered)
    }

    #[test]
    fn test_worker_count_is_bounded() {
        let policy = ReadPolicy::default();
        assert_eq!(policy.workers_for(1), 1);
        assert_eq!(policy.workers_for(2), 2);
        assert_eq!(policy.workers_for(50), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_are_spaced_globally() {
        let (repo, files) = seeded(6);
        let policy = ReadPolicy::default();
        let start = Instant::now();
        let outcomes = read_all(&repo, files, &policy, |_, _| {}).await;
        let elapsed = start.elapsed();

        assert_eq!(outcomes.len(), 6);
        assert!(outcomes.iter().all(ReadOutcome::is_ok));
        assert!(elapsed >= Duration::from_millis(2500), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiter_spaces_consecutive_slots() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_keep_input_order() {
        let (repo, files) = seeded(5);
        let expected: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
        let outcomes = read_all(&repo, files, &ReadPolicy::default(), |_, _| {}).await;
        let paths: Vec<String> = outcomes.iter().map(|o| o.file.path.clone()).collect();
        assert_eq!(paths, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_read_is_retried_with_backoff() {
        let (repo, files) = seeded(1);
        let throttled = RepoError::new(RepoErrorKind::RateLimited, "HTTP 429");
        let repo = FaultyRepository::new(repo)
            .fail_read("src/steps/S0.java", vec![throttled.clone(), throttled]);

        let start = Instant::now();
        let outcomes = read_all(&repo, files, &ReadPolicy::default(), |_, _| {}).await;

        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[0].attempts, 3);
        assert!(start.elapsed() >= Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_body_is_retried_as_throttling() {
        let (repo, files) = seeded(1);
        let repo = FaultyRepository::new(repo).fail_read(
            "src/steps/S0.java",
            vec![RepoError::new(RepoErrorKind::MalformedResponse, "empty response body")],
        );

        let start = Instant::now();
        let outcomes = read_all(&repo, files, &ReadPolicy::default(), |_, _| {}).await;

        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[0].attempts, 2);
        assert!(start.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_capped() {
        let (repo, files) = seeded(1);
        let malformed = RepoError::new(RepoErrorKind::MalformedResponse, "empty body");
        let repo = FaultyRepository::new(repo)
            .fail_read("src/steps/S0.java", vec![malformed; 5]);

        let outcomes = read_all(&repo, files, &ReadPolicy::default(), |_, _| {}).await;

        assert_eq!(outcomes[0].attempts, 4);
        let err = outcomes[0].result.as_ref().unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::MalformedResponse);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_is_isolated() {
        let (repo, files) = seeded(3);
        let repo = FaultyRepository::new(repo).fail_read(
            "src/steps/S1.java",
            vec![RepoError::new(RepoErrorKind::Authorization, "403")],
        );
        let progress = Arc::new(AtomicUsize::new(0));
        let seen = progress.clone();

        let outcomes = read_all(&repo, files, &ReadPolicy::default(), move |done, total| {
            assert!(done <= total);
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        assert!(outcomes[0].is_ok());
        assert!(!outcomes[1].is_ok());
        assert_eq!(outcomes[1].attempts, 1);
        assert!(outcomes[2].is_ok());
        assert_eq!(progress.load(Ordering::SeqCst), 3);
        assert_eq!(repo.reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_reads_nothing() {
        let repo = MemoryRepository::with_branch("main", Vec::<(String, String)>::new());
        let outcomes = read_all(&repo, Vec::new(), &ReadPolicy::default(), |_, _| {}).await;
        assert!(outcomes.is_empty());
    }
}
