//! Repository access facade
//!
//! The pipeline only talks to a hosting repository through
//! [`RepositoryFacade`]. Two adapters ship with the crate: a git2-backed
//! local repository and an in-memory store.

pub mod github;
pub mod local;
pub mod memory;
#[cfg(test)]
pub mod testing;

use crate::error::RepoError;
use async_trait::async_trait;

pub use local::LocalGitRepository;
pub use memory::MemoryRepository;

/// One file returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub path: String,
    pub size: Option<u64>,
}

/// One file to be written in a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSpec {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// Listing progress callback: (files found so far, current directory)
pub type ListProgress<'a> = &'a (dyn Fn(usize, &str) + Send + Sync);

#[async_trait]
pub trait RepositoryFacade: Send + Sync {
    async fn list_branches(&self) -> Result<Vec<String>, RepoError>;

    async fn create_branch(&self, name: &str, from: &str) -> Result<(), RepoError>;

    async fn delete_branch(&self, name: &str) -> Result<(), RepoError>;

    /// List files under `path` whose names match `pattern` (`*` wildcards,
    /// alternatives separated by `|`).
    async fn list_all_files(
        &self,
        path: &str,
        pattern: &str,
        branch: Option<&str>,
        progress: Option<ListProgress<'_>>,
    ) -> Result<Vec<FileHandle>, RepoError>;

    /// Read one file's text. An empty file in the repository reads as `""`.
    /// Remote adapters must report an empty API body as
    /// [`RepoErrorKind::MalformedResponse`](crate::error::RepoErrorKind) so
    /// the reader treats it as throttling and retries it.
    async fn read_file(&self, path: &str, branch: Option<&str>) -> Result<String, RepoError>;

    async fn file_exists(&self, path: &str, branch: Option<&str>) -> Result<bool, RepoError> {
        match self.read_file(path, branch).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind == crate::error::RepoErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Write one file as its own commit; returns the commit id.
    async fn write_file(
        &self,
        file: &FileWrite,
        message: &str,
        branch: &str,
    ) -> Result<String, RepoError>;

    /// Whether [`RepositoryFacade::write_files`] produces a single commit.
    fn supports_multi_file_write(&self) -> bool {
        false
    }

    /// Write several files as one commit; returns the commit id.
    async fn write_files(
        &self,
        files: &[FileWrite],
        message: &str,
        branch: &str,
    ) -> Result<String, RepoError> {
        let _ = (files, message, branch);
        Err(RepoError::new(
            crate::error::RepoErrorKind::Unsupported,
            "multi-file writes are not supported by this repository",
        ))
    }

    /// Open a pull request; returns its URL.
    async fn create_pull_request(&self, spec: &PullRequestSpec) -> Result<String, RepoError>;
}

/// Match a file name against a `*`-wildcard pattern list (`*.java|*.feature`).
pub fn matches_pattern(file_name: &str, pattern: &str) -> bool {
    pattern
        .split('|')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|p| wildcard_match(file_name, p))
}

fn wildcard_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut resume = 0usize;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            resume = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            resume += 1;
            t = resume;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Whether `path` lies at or below `dir` (both slash-separated, repo-relative)
pub fn is_under(path: &str, dir: &str) -> bool {
    let dir = dir.trim_matches('/');
    if dir.is_empty() || dir == "." {
        return true;
    }
    path == dir || path.starts_with(&format!("{}/", dir))
}
