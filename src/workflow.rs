//! Workflow controller
//!
//! [`Workflow::run`] drives one migration from access validation to the
//! optional pull request. It never fails: phase errors become a Failed
//! response with an [`ErrorCode`], panics (including in the observer) become
//! `E_INTERNAL`, and every discovered file gets exactly one
//! [`MigrationResult`] whatever happens.

use crate::ai::{AiTransformer, AiUsageMetrics};
use crate::commit::{commit_batches, plan_batches, CommitItem, CommitPolicy};
use crate::discovery::{discover, discovery_branch};
use crate::error::{ErrorCode, MigrationError, RepoError, RepoErrorKind};
use crate::model::{
    DiscoveredFile, MigrationRequest, MigrationResult, OperationKind, TransformStrategy, TransformTier, TransformedFile,
    WorkflowPhase, WorkflowState,
};
use crate::paths::PathRewriter;
use crate::reader::{read_all, ReadPolicy};
use crate::repo::{PullRequestSpec, RepositoryFacade};
use crate::skeleton::generate_skeleton;
use crate::transform::tiers::Marker;
use crate::transform::{TransformEngine, DEFAULT_LIBRARY};
use chrono::Local;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

// ============================================================================
// Progress
// ============================================================================

/// Receives `(message, phase, percent)` updates. Called concurrently while
/// files are being read.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, message: &str, phase: WorkflowPhase, percent: Option<u8>);
}

impl<F> ProgressObserver for F
where
    F: Fn(&str, WorkflowPhase, Option<u8>) + Send + Sync,
{
    fn on_progress(&self, message: &str, phase: WorkflowPhase, percent: Option<u8>) {
        self(message, phase, percent)
    }
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _message: &str, _phase: WorkflowPhase, _percent: Option<u8>) {}
}

// ============================================================================
// Response
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub discovered: usize,
    pub read_failures: usize,
    pub transformed: usize,
    pub transform_failures: usize,
    /// Files that fell back to a placeholder after a generator error
    pub degraded: usize,
    pub validation_failures: usize,
    /// Already-migrated files left as they were
    pub unchanged: usize,
    pub committed: usize,
    pub commit_failures: usize,
    pub batches: usize,
    pub skeleton_files: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResponse {
    /// Correlates this response with the run's log lines
    pub run_id: String,
    pub state: WorkflowState,
    pub results: Vec<MigrationResult>,
    pub summary: MigrationSummary,
    pub ai_usage: AiUsageMetrics,
    pub branch: Option<String>,
    pub pr_url: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub error: Option<String>,
}

impl MigrationResponse {
    pub fn is_success(&self) -> bool {
        self.state.phase == WorkflowPhase::Completed
    }
}

/// Mutable state threaded through one run; survives a panic in any phase.
#[derive(Default)]
struct RunState {
    state: WorkflowState,
    discovered: Vec<DiscoveredFile>,
    results: Vec<Option<MigrationResult>>,
    index: HashMap<String, usize>,
    summary: MigrationSummary,
}

impl RunState {
    fn set_discovered(&mut self, files: Vec<DiscoveredFile>) {
        self.index = files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.path.clone(), i))
            .collect();
        self.results = vec![None; files.len()];
        self.discovered = files;
    }

    fn resolve(&mut self, source: &str, result: MigrationResult) {
        if let Some(&i) = self.index.get(source) {
            self.results[i] = Some(result);
        }
    }

    /// One result per discovered file; unresolved files are failed with `reason`.
    fn into_results(self, reason: &str) -> (WorkflowState, MigrationSummary, Vec<MigrationResult>) {
        let results = self
            .discovered
            .iter()
            .zip(self.results)
            .map(|(file, result)| result.unwrap_or_else(|| MigrationResult::failed(file.path.clone(), None, reason)))
            .collect();
        (self.state, self.summary, results)
    }
}

fn emit(run: &mut RunState, observer: &dyn ProgressObserver, message: &str, phase: WorkflowPhase, percent: u8) {
    run.state.enter(phase, percent);
    observer.on_progress(message, phase, Some(run.state.percent));
}

fn scaled(start: u8, span: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return start;
    }
    let step = (usize::from(span) * done / total).min(usize::from(span));
    start + step as u8
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Branch name used when the request does not name one
pub fn generated_branch_name() -> String {
    format!("robomigrate/{}", Local::now().format("%Y%m%d-%H%M%S"))
}

// ============================================================================
// Workflow
// ============================================================================

pub struct Workflow<'a> {
    facade: &'a dyn RepositoryFacade,
    library: String,
    source_roots: Vec<String>,
    ai: Option<Arc<AiTransformer>>,
    read_policy: ReadPolicy,
    commit_policy: CommitPolicy,
}

impl<'a> Workflow<'a> {
    pub fn new(facade: &'a dyn RepositoryFacade) -> Self {
        Self {
            facade,
            library: DEFAULT_LIBRARY.to_string(),
            source_roots: Vec::new(),
            ai: None,
            read_policy: ReadPolicy::default(),
            commit_policy: CommitPolicy::default(),
        }
    }

    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = library.into();
        self
    }

    pub fn with_source_roots(mut self, roots: Vec<String>) -> Self {
        self.source_roots = roots;
        self
    }

    pub fn with_ai(mut self, ai: Arc<AiTransformer>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    fn engine(&self, request: &MigrationRequest) -> TransformEngine {
        let rewriter = if self.source_roots.is_empty() {
            PathRewriter::new(&request.target_root)
        } else {
            PathRewriter::with_source_roots(&request.target_root, self.source_roots.iter().cloned())
        };
        let engine = TransformEngine::new(request.mode, self.library.clone(), rewriter);
        match (&self.ai, request.ai.enabled) {
            (Some(ai), true) => engine.with_ai(Arc::clone(ai)),
            _ => engine,
        }
    }

    /// Execute one run. Never fails; inspect the response phase instead.
    pub async fn run(&self, request: &MigrationRequest, observer: &dyn ProgressObserver) -> MigrationResponse {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("migration", run_id = %run_id, operation = request.operation.label());
        let engine = self.engine(request);
        let mut run = RunState::default();

        let outcome = AssertUnwindSafe(self.execute(request, observer, &engine, &mut run))
            .catch_unwind()
            .instrument(span)
            .await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(payload) => Some(MigrationError::new(
                ErrorCode::Internal,
                format!("unexpected internal error: {}", panic_message(payload.as_ref())),
            )),
        };

        let (error_code, error) = match &failure {
            Some(err) => {
                tracing::error!(run_id = %run_id, code = %err.code, "migration failed: {}", err.message);
                let percent = run.state.percent;
                run.state.enter(WorkflowPhase::Failed, percent);
                (Some(err.code), Some(err.message.clone()))
            }
            None => (None, None),
        };

        let final_message = match &failure {
            Some(err) => format!("Migration failed: {}", err),
            None => "Migration complete".to_string(),
        };
        let phase = run.state.phase;
        let percent = run.state.percent;
        // The observer already panicked once if that is why we are here
        let _ = std::panic::catch_unwind(AssertUnwindSafe(|| {
            observer.on_progress(&final_message, phase, Some(percent));
        }));

        let reason = match &error {
            Some(message) => format!("not processed: {}", message),
            None => "not processed".to_string(),
        };
        let branch = run.state.branch.clone();
        let pr_url = run.state.pr_url.clone();
        let (state, summary, results) = run.into_results(&reason);
        MigrationResponse {
            run_id,
            state,
            results,
            summary,
            ai_usage: engine.ai_usage(),
            branch,
            pr_url,
            error_code,
            error,
        }
    }

    async fn execute(
        &self,
        request: &MigrationRequest,
        observer: &dyn ProgressObserver,
        engine: &TransformEngine,
        run: &mut RunState,
    ) -> Result<(), MigrationError> {
        let facade = self.facade;
        let transformation_only = request.operation.is_transformation_only();
        let read_branch = discovery_branch(request);

        // Validate access
        emit(run, observer, "Validating repository access", WorkflowPhase::Validating, 5);
        let branches = facade
            .list_branches()
            .await
            .map_err(|e| MigrationError::from_access(&e, &read_branch))?;
        if !branches.contains(&read_branch) {
            let err = RepoError::not_found(format!("branch '{}' does not exist", read_branch));
            return Err(MigrationError::from_access(&err, &read_branch));
        }

        // Discover
        emit(run, observer, "Discovering files", WorkflowPhase::Analyzing, 15);
        let discovered = discover(facade, request, None)
            .await
            .map_err(|e| MigrationError::from_access(&e, &read_branch))?;
        run.summary.discovered = discovered.len();
        if discovered.is_empty() {
            tracing::info!("nothing to migrate");
            emit(run, observer, "No matching files found; nothing to do", WorkflowPhase::Completed, 100);
            return Ok(());
        }
        run.set_discovered(discovered.clone());

        // Branch
        let branch = if transformation_only {
            read_branch.clone()
        } else {
            let name = request.target_branch.clone().unwrap_or_else(generated_branch_name);
            if request.dry_run {
                tracing::info!(branch = %name, "dry run: branch not created");
            } else if branches.contains(&name) {
                tracing::info!(branch = %name, "reusing existing branch");
            } else {
                facade.create_branch(&name, &request.source_branch).await.map_err(|e| {
                    MigrationError::new(ErrorCode::Branch, format!("could not create branch '{}': {}", name, e))
                })?;
                tracing::info!(branch = %name, from = %request.source_branch, "created branch");
            }
            name
        };
        run.state.branch = Some(branch.clone());

        // Read
        emit(run, observer, &format!("Reading {} files", discovered.len()), WorkflowPhase::Analyzing, 20);
        let outcomes = read_all(facade, discovered, &self.read_policy, |done, total| {
            observer.on_progress(
                &format!("Read {}/{} files", done, total),
                WorkflowPhase::Analyzing,
                Some(scaled(20, 20, done, total)),
            );
        })
        .await;
        run.state.enter(WorkflowPhase::Analyzing, 40);

        let mut loaded: Vec<(DiscoveredFile, String)> = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(content) => loaded.push((outcome.file, content)),
                Err(err) => {
                    run.summary.read_failures += 1;
                    run.resolve(
                        &outcome.file.path,
                        MigrationResult::failed(outcome.file.path.clone(), None, format!("read failed: {}", err)),
                    );
                }
            }
        }

        // Transform
        emit(run, observer, &format!("Transforming {} files", loaded.len()), WorkflowPhase::Transforming, 40);
        let sources = if transformation_only && request.tier == TransformTier::DeepRegeneration {
            self.source_index(request, engine).await
        } else {
            HashMap::new()
        };
        let total = loaded.len();
        let mut items: Vec<CommitItem> = Vec::new();
        for (i, (file, content)) in loaded.iter().enumerate() {
            let transformed = if transformation_only {
                let regenerated = match sources.get(&file.path) {
                    Some(source) => self.regenerate(engine, source).await,
                    None => None,
                };
                engine.retransform(file, content, request.tier, request.force, regenerated.as_deref())
            } else {
                let fresh = engine.migrate(file, content).await;
                if request.operation == OperationKind::MigrationAndTransformation && fresh.is_success() {
                    self.merge_existing(engine, request, fresh, &branch).await
                } else {
                    fresh
                }
            };
            self.record_transform(run, transformed, &mut items);
            observer.on_progress(
                &format!("Transformed {}", file.path),
                WorkflowPhase::Transforming,
                Some(scaled(40, 30, i + 1, total)),
            );
        }
        run.state.enter(WorkflowPhase::Transforming, 70);

        // Skeleton
        let mut skeleton: Vec<CommitItem> = Vec::new();
        if !transformation_only {
            emit(run, observer, "Generating project skeleton", WorkflowPhase::Generating, 75);
            let resources: Vec<String> = items.iter().map(|item| item.path.clone()).collect();
            let files = generate_skeleton(engine.rewriter().target_root(), engine.library(), request.mode, &resources)?;
            run.summary.skeleton_files = files.len();
            skeleton = files
                .into_iter()
                .map(|f| CommitItem {
                    path: f.path,
                    content: f.content,
                    role: crate::model::FileRole::Resource,
                    source: None,
                })
                .collect();
        }

        // Commit
        emit(run, observer, &format!("Committing {} files", items.len()), WorkflowPhase::Committing, 80);
        if request.dry_run {
            for item in &items {
                if let Some(source) = &item.source {
                    run.resolve(
                        source,
                        MigrationResult::success(source.clone(), item.path.clone()).with_note("dry run: not committed"),
                    );
                }
            }
        } else if !items.is_empty() || !skeleton.is_empty() {
            let batch_size = if request.batch_size == 0 {
                self.commit_policy.batch_size
            } else {
                request.batch_size
            };
            let batches = plan_batches(items, skeleton, batch_size);
            run.summary.batches = batches.len();
            let outcomes = commit_batches(facade, &branch, batches, &self.commit_policy, |outcome, total| {
                observer.on_progress(
                    &format!("Committed batch {}/{}", outcome.index + 1, total),
                    WorkflowPhase::Committing,
                    Some(scaled(80, 15, outcome.index + 1, total)),
                );
            })
            .await;
            for outcome in outcomes {
                for item in &outcome.items {
                    let Some(source) = &item.source else {
                        continue;
                    };
                    let result = match &outcome.result {
                        Ok(_) => {
                            run.summary.committed += 1;
                            MigrationResult::success(source.clone(), item.path.clone())
                        }
                        Err(err) => {
                            run.summary.commit_failures += 1;
                            MigrationResult::failed(source.clone(), Some(item.path.clone()), format!("commit failed: {}", err))
                        }
                    };
                    run.resolve(source, result);
                }
            }
        }
        run.state.enter(WorkflowPhase::Committing, 95);

        // Pull request
        if request.create_pr && !request.dry_run && run.summary.committed > 0 && branch != request.source_branch {
            emit(run, observer, "Opening pull request", WorkflowPhase::Committing, 97);
            let spec = PullRequestSpec {
                title: format!("Migrate {} files to Robot Framework", run.summary.committed),
                body: pull_request_body(request, &run.summary),
                head: branch.clone(),
                base: request.source_branch.clone(),
            };
            let url = facade.create_pull_request(&spec).await.map_err(|e| {
                MigrationError::new(ErrorCode::PullRequest, format!("could not open pull request: {}", e))
            })?;
            tracing::info!(url = %url, "opened pull request");
            run.state.pr_url = Some(url);
        }

        emit(run, observer, "Migration complete", WorkflowPhase::Completed, 100);
        Ok(())
    }

    fn record_transform(&self, run: &mut RunState, transformed: TransformedFile, items: &mut Vec<CommitItem>) {
        if !transformed.is_success() {
            run.summary.transform_failures += 1;
            let error = transformed.error.unwrap_or_else(|| "transform failed".to_string());
            run.resolve(
                &transformed.source_path,
                MigrationResult::failed(transformed.source_path.clone(), Some(transformed.target_path), error),
            );
            return;
        }
        run.summary.transformed += 1;
        if transformed.error.is_some() {
            run.summary.degraded += 1;
        }
        if !transformed.validation.valid {
            run.summary.validation_failures += 1;
        }
        if transformed.strategy == TransformStrategy::Unchanged {
            run.summary.unchanged += 1;
            run.resolve(
                &transformed.source_path,
                MigrationResult::success(transformed.source_path.clone(), transformed.target_path)
                    .with_note("unchanged: already at the requested tier"),
            );
            return;
        }
        items.push(CommitItem {
            path: transformed.target_path,
            content: transformed.content,
            role: transformed.role,
            source: Some(transformed.source_path),
        });
    }

    /// For migration+transformation: an already-migrated target is
    /// re-processed with the fresh output as its Tier3 source.
    async fn merge_existing(
        &self,
        engine: &TransformEngine,
        request: &MigrationRequest,
        fresh: TransformedFile,
        branch: &str,
    ) -> TransformedFile {
        let existing = match self.facade.read_file(&fresh.target_path, Some(branch)).await {
            Ok(existing) if Marker::parse(&existing).is_some() => existing,
            Ok(_) => return fresh,
            Err(err) if err.kind == RepoErrorKind::NotFound => return fresh,
            Err(err) => {
                tracing::debug!(path = %fresh.target_path, "could not read existing target: {}", err);
                return fresh;
            }
        };
        let target = DiscoveredFile {
            path: fresh.target_path.clone(),
            role: fresh.role,
            branch: branch.to_string(),
        };
        let mut merged = engine.retransform(&target, &existing, request.tier, request.force, Some(&fresh.content));
        merged.source_path = fresh.source_path;
        merged
    }

    /// Target path -> source file, for Tier3 regeneration of target files.
    async fn source_index(&self, request: &MigrationRequest, engine: &TransformEngine) -> HashMap<String, DiscoveredFile> {
        let source_request = MigrationRequest {
            operation: OperationKind::Migration,
            ..request.clone()
        };
        match discover(self.facade, &source_request, None).await {
            Ok(files) => files
                .into_iter()
                .map(|file| (engine.rewriter().rewrite(&file.path, file.role), file))
                .collect(),
            Err(err) => {
                tracing::warn!("source lookup failed, tier 3 degrades to tier 2: {}", err);
                HashMap::new()
            }
        }
    }

    async fn regenerate(&self, engine: &TransformEngine, source: &DiscoveredFile) -> Option<String> {
        let content = match self.facade.read_file(&source.path, Some(&source.branch)).await {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %source.path, "could not read source for regeneration: {}", err);
                return None;
            }
        };
        engine
            .generate(&source.path, source.role, &content)
            .map(|(text, _)| text)
            .ok()
    }
}

fn pull_request_body(request: &MigrationRequest, summary: &MigrationSummary) -> String {
    format!(
        "Automated {} to Robot Framework.\n\n\
         - Files discovered: {}\n\
         - Files committed: {}\n\
         - Placeholders after errors: {}\n\
         - Validation issues: {}\n\
         - Mode: {}, tier: {}\n",
        request.operation.label(),
        summary.discovered,
        summary.committed,
        summary.degraded,
        summary.validation_failures,
        request.mode.label(),
        request.tier.number(),
    )
}

#[cfg(test)]
mod tests;
