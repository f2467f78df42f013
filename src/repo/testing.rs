//! Fault-injecting facade for tests
//!
//! Wraps a [`MemoryRepository`] and fails selected calls with scripted
//! errors, counting every read and write it sees.

use super::{FileHandle, FileWrite, ListProgress, MemoryRepository, PullRequestSpec, RepositoryFacade};
use crate::error::RepoError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct FaultyRepository {
    pub inner: MemoryRepository,
    read_faults: Mutex<HashMap<String, VecDeque<RepoError>>>,
    /// One entry per write call; `None` lets the call through
    write_faults: Mutex<VecDeque<Option<RepoError>>>,
    branch_list_fault: Mutex<Option<RepoError>>,
    branch_create_fault: Mutex<Option<RepoError>>,
    pull_request_fault: Mutex<Option<RepoError>>,
    pub reads: AtomicUsize,
    pub write_calls: AtomicUsize,
}

impl FaultyRepository {
    pub fn new(inner: MemoryRepository) -> Self {
        Self {
            inner,
            read_faults: Mutex::new(HashMap::new()),
            write_faults: Mutex::new(VecDeque::new()),
            branch_list_fault: Mutex::new(None),
            branch_create_fault: Mutex::new(None),
            pull_request_fault: Mutex::new(None),
            reads: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_read(self, path: &str, errors: Vec<RepoError>) -> Self {
        self.read_faults
            .lock()
            .unwrap()
            .insert(path.to_string(), errors.into());
        self
    }

    pub fn script_writes(self, script: Vec<Option<RepoError>>) -> Self {
        *self.write_faults.lock().unwrap() = script.into();
        self
    }

    pub fn fail_branch_listing(self, error: RepoError) -> Self {
        *self.branch_list_fault.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_branch_creation(self, error: RepoError) -> Self {
        *self.branch_create_fault.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_pull_request(self, error: RepoError) -> Self {
        *self.pull_request_fault.lock().unwrap() = Some(error);
        self
    }

    fn next_write_fault(&self) -> Option<RepoError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.write_faults.lock().unwrap().pop_front().flatten()
    }
}

#[async_trait]
impl RepositoryFacade for FaultyRepository {
    async fn list_branches(&self) -> Result<Vec<String>, RepoError> {
        let fault = self.branch_list_fault.lock().unwrap().clone();
        if let Some(err) = fault {
            return Err(err);
        }
        self.inner.list_branches().await
    }

    async fn create_branch(&self, name: &str, from: &str) -> Result<(), RepoError> {
        let fault = self.branch_create_fault.lock().unwrap().clone();
        if let Some(err) = fault {
            return Err(err);
        }
        self.inner.create_branch(name, from).await
    }

    async fn delete_branch(&self, name: &str) -> Result<(), RepoError> {
        self.inner.delete_branch(name).await
    }

    async fn list_all_files(
        &self,
        path: &str,
        pattern: &str,
        branch: Option<&str>,
        progress: Option<ListProgress<'_>>,
    ) -> Result<Vec<FileHandle>, RepoError> {
        self.inner.list_all_files(path, pattern, branch, progress).await
    }

    async fn read_file(&self, path: &str, branch: Option<&str>) -> Result<String, RepoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let fault = self
            .read_faults
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|queue| queue.pop_front());
        match fault {
            Some(err) => Err(err),
            None => self.inner.read_file(path, branch).await,
        }
    }

    async fn write_file(&self, file: &FileWrite, message: &str, branch: &str) -> Result<String, RepoError> {
        let fault = self.next_write_fault();
        if let Some(err) = fault {
            return Err(err);
        }
        self.inner.write_file(file, message, branch).await
    }

    fn supports_multi_file_write(&self) -> bool {
        self.inner.supports_multi_file_write()
    }

    async fn write_files(&self, files: &[FileWrite], message: &str, branch: &str) -> Result<String, RepoError> {
        let fault = self.next_write_fault();
        if let Some(err) = fault {
            return Err(err);
        }
        self.inner.write_files(files, message, branch).await
    }

    async fn create_pull_request(&self, spec: &PullRequestSpec) -> Result<String, RepoError> {
        let fault = self.pull_request_fault.lock().unwrap().clone();
        if let Some(err) = fault {
            return Err(err);
        }
        self.inner.create_pull_request(spec).await
    }
}
