//! Batch commit manager
//!
//! Transformed files are committed in fixed-size batches, one batch at a
//! time. A batch that fails with a transient error is retried once after a
//! fixed delay; any other failure marks the whole batch failed and the run
//! moves on to the next batch.

use crate::discovery::summarize_roles;
use crate::error::{RepoError, RepoErrorKind};
use crate::model::FileRole;
use crate::repo::{FileWrite, RepositoryFacade};
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

const TRANSIENT_WORDS: &[&str] = &["timeout", "timed out", "rate limit", "rate-limit", "network", "connection"];

#[derive(Debug, Clone)]
pub struct CommitPolicy {
    pub batch_size: usize,
    pub retry_delay: Duration,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// One file queued for commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitItem {
    pub path: String,
    pub content: String,
    pub role: FileRole,
    /// Source file this output came from; `None` for skeleton files
    pub source: Option<String>,
}

/// Outcome of one batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub index: usize,
    pub items: Vec<CommitItem>,
    pub result: Result<Vec<String>, RepoError>,
    pub attempts: usize,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Whether a failed write is worth one more attempt
pub fn is_transient(err: &RepoError) -> bool {
    if matches!(
        err.kind,
        RepoErrorKind::Timeout | RepoErrorKind::RateLimited | RepoErrorKind::Network
    ) {
        return true;
    }
    let message = err.message.to_lowercase();
    TRANSIENT_WORDS.iter().any(|word| message.contains(word))
}

/// Split `items` into batches of `batch_size`; `trailing` (skeleton files)
/// ride along with the last batch.
pub fn plan_batches(items: Vec<CommitItem>, trailing: Vec<CommitItem>, batch_size: usize) -> Vec<Vec<CommitItem>> {
    let size = batch_size.max(1);
    let mut batches: Vec<Vec<CommitItem>> = items.chunks(size).map(<[CommitItem]>::to_vec).collect();
    if trailing.is_empty() {
        return batches;
    }
    match batches.last_mut() {
        Some(last) => last.extend(trailing),
        None => batches.push(trailing),
    }
    batches
}

/// `robomigrate: migrate batch 2/3 (3 files)` followed by per-role lines.
pub fn commit_message(index: usize, total: usize, items: &[CommitItem]) -> String {
    let mut message = format!(
        "robomigrate: migrate batch {}/{} ({} file{})",
        index + 1,
        total,
        items.len(),
        if items.len() == 1 { "" } else { "s" }
    );
    let summaries = summarize_roles(items.iter().map(|item| (item.path.as_str(), item.role)));
    if !summaries.is_empty() {
        message.push('\n');
    }
    for summary in summaries {
        message.push_str(&format!(
            "\n{}: {} ({})",
            summary.role.plural_label(),
            summary.count,
            summary.samples.join(", ")
        ));
    }
    message
}

async fn write_batch(
    facade: &dyn RepositoryFacade,
    items: &[CommitItem],
    message: &str,
    branch: &str,
) -> Result<Vec<String>, RepoError> {
    let writes: Vec<FileWrite> = items
        .iter()
        .map(|item| FileWrite {
            path: item.path.clone(),
            content: item.content.clone(),
        })
        .collect();

    if facade.supports_multi_file_write() {
        let id = facade.write_files(&writes, message, branch).await?;
        return Ok(vec![id]);
    }

    // One commit per file
    let mut ids = Vec::with_capacity(writes.len());
    for write in &writes {
        ids.push(facade.write_file(write, message, branch).await?);
    }
    Ok(ids)
}

/// Commit every batch in order. `on_batch` sees each outcome as it resolves.
pub async fn commit_batches<F>(
    facade: &dyn RepositoryFacade,
    branch: &str,
    batches: Vec<Vec<CommitItem>>,
    policy: &CommitPolicy,
    mut on_batch: F,
) -> Vec<BatchOutcome>
where
    F: FnMut(&BatchOutcome, usize),
{
    let total = batches.len();
    let mut outcomes = Vec::with_capacity(total);
    for (index, items) in batches.into_iter().enumerate() {
        let message = commit_message(index, total, &items);
        let mut attempts = 1;
        let mut result = write_batch(facade, &items, &message, branch).await;

        if let Err(err) = &result {
            if is_transient(err) {
                tracing::warn!(batch = index + 1, "transient commit failure, retrying once: {}", err);
                tokio::time::sleep(policy.retry_delay).await;
                attempts += 1;
                result = write_batch(facade, &items, &message, branch).await;
            }
        }
        match &result {
            Ok(ids) => tracing::info!(batch = index + 1, total, files = items.len(), commits = ids.len(), "batch committed"),
            Err(err) => tracing::error!(batch = index + 1, total, files = items.len(), "batch failed: {}", err),
        }

        let outcome = BatchOutcome {
            index,
            items,
            result,
            attempts,
        };
        on_batch(&outcome, total);
        outcomes.push(outcome);
    }
    outcomes
}
