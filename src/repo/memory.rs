//! In-memory repository
//!
//! Branches are plain path -> content maps. Used for dry runs against
//! fixtures and for exercising the pipeline without a hosting service.

use super::{is_under, matches_pattern, FileHandle, FileWrite, ListProgress, PullRequestSpec, RepositoryFacade};
use crate::error::{RepoError, RepoErrorKind};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

type Tree = BTreeMap<String, String>;

#[derive(Debug, Default)]
struct State {
    branches: BTreeMap<String, Tree>,
    commits: Vec<CommitRecord>,
    pull_requests: Vec<PullRequestSpec>,
}

/// A commit recorded by the in-memory store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub id: String,
    pub branch: String,
    pub message: String,
    pub paths: Vec<String>,
}

#[derive(Debug)]
pub struct MemoryRepository {
    state: Mutex<State>,
    multi_file: bool,
}

impl MemoryRepository {
    /// Create a repository with a single branch holding `files`.
    pub fn with_branch<I, P, C>(branch: &str, files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let tree = files
            .into_iter()
            .map(|(p, c)| (p.into(), c.into()))
            .collect();
        let mut branches = BTreeMap::new();
        branches.insert(branch.to_string(), tree);
        Self {
            state: Mutex::new(State {
                branches,
                ..Default::default()
            }),
            multi_file: false,
        }
    }

    /// Enable single-commit multi-file writes.
    pub fn with_multi_file_writes(mut self) -> Self {
        self.multi_file = true;
        self
    }

    pub fn commits(&self) -> Vec<CommitRecord> {
        self.lock().commits.clone()
    }

    pub fn pull_requests(&self) -> Vec<PullRequestSpec> {
        self.lock().pull_requests.clone()
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        self.lock()
            .branches
            .get(branch)
            .and_then(|tree| tree.get(path).cloned())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a panicking test thread; the map is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn default_branch(state: &State) -> Option<String> {
        ["main", "master"]
            .iter()
            .find(|b| state.branches.contains_key(**b))
            .map(|b| b.to_string())
            .or_else(|| state.branches.keys().next().cloned())
    }

    fn commit(&self, files: &[FileWrite], message: &str, branch: &str) -> Result<String, RepoError> {
        let mut state = self.lock();
        let id = format!("{:07x}", state.commits.len() + 1);
        let tree = state
            .branches
            .get_mut(branch)
            .ok_or_else(|| RepoError::not_found(format!("branch '{}' does not exist", branch)))?;
        for file in files {
            tree.insert(file.path.clone(), file.content.clone());
        }
        state.commits.push(CommitRecord {
            id: id.clone(),
            branch: branch.to_string(),
            message: message.to_string(),
            paths: files.iter().map(|f| f.path.clone()).collect(),
        });
        Ok(id)
    }
}

#[async_trait]
impl RepositoryFacade for MemoryRepository {
    async fn list_branches(&self) -> Result<Vec<String>, RepoError> {
        Ok(self.lock().branches.keys().cloned().collect())
    }

    async fn create_branch(&self, name: &str, from: &str) -> Result<(), RepoError> {
        let mut state = self.lock();
        if state.branches.contains_key(name) {
            return Err(RepoError::other(format!("branch '{}' already exists", name)));
        }
        let base = state
            .branches
            .get(from)
            .cloned()
            .ok_or_else(|| RepoError::not_found(format!("branch '{}' does not exist", from)))?;
        state.branches.insert(name.to_string(), base);
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<(), RepoError> {
        self.lock()
            .branches
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RepoError::not_found(format!("branch '{}' does not exist", name)))
    }

    async fn list_all_files(
        &self,
        path: &str,
        pattern: &str,
        branch: Option<&str>,
        progress: Option<ListProgress<'_>>,
    ) -> Result<Vec<FileHandle>, RepoError> {
        let state = self.lock();
        let branch = match branch {
            Some(b) => b.to_string(),
            None => Self::default_branch(&state)
                .ok_or_else(|| RepoError::not_found("repository has no branches"))?,
        };
        let tree = state
            .branches
            .get(&branch)
            .ok_or_else(|| RepoError::not_found(format!("branch '{}' does not exist", branch)))?;

        let mut found = Vec::new();
        for (file_path, content) in tree {
            let name = file_path.rsplit('/').next().unwrap_or(file_path);
            if is_under(file_path, path) && matches_pattern(name, pattern) {
                found.push(FileHandle {
                    path: file_path.clone(),
                    size: Some(content.len() as u64),
                });
                if let Some(report) = progress {
                    report(found.len(), path);
                }
            }
        }
        Ok(found)
    }

    async fn read_file(&self, path: &str, branch: Option<&str>) -> Result<String, RepoError> {
        let state = self.lock();
        let branch = match branch {
            Some(b) => b.to_string(),
            None => Self::default_branch(&state)
                .ok_or_else(|| RepoError::not_found("repository has no branches"))?,
        };
        state
            .branches
            .get(&branch)
            .and_then(|tree| tree.get(path).cloned())
            .ok_or_else(|| RepoError::not_found(format!("'{}' not found on '{}'", path, branch)))
    }

    async fn write_file(
        &self,
        file: &FileWrite,
        message: &str,
        branch: &str,
    ) -> Result<String, RepoError> {
        self.commit(std::slice::from_ref(file), message, branch)
    }

    fn supports_multi_file_write(&self) -> bool {
        self.multi_file
    }

    async fn write_files(
        &self,
        files: &[FileWrite],
        message: &str,
        branch: &str,
    ) -> Result<String, RepoError> {
        if !self.multi_file {
            return Err(RepoError::new(
                RepoErrorKind::Unsupported,
                "multi-file writes are disabled for this repository",
            ));
        }
        self.commit(files, message, branch)
    }

    async fn create_pull_request(&self, spec: &PullRequestSpec) -> Result<String, RepoError> {
        let mut state = self.lock();
        if !state.branches.contains_key(&spec.head) {
            return Err(RepoError::not_found(format!("branch '{}' does not exist", spec.head)));
        }
        state.pull_requests.push(spec.clone());
        Ok(format!("memory://pulls/{}", state.pull_requests.len()))
    }
}
