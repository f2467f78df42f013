//! Local git repository adapter
//!
//! Reads and writes go straight to git objects: listings walk the branch
//! tree, writes build a commit through an in-memory index and advance the
//! branch ref. The working directory is never touched, so a checked-out
//! target branch will show the new commits as unstaged reversals until it
//! is reset.

use super::{github, is_under, matches_pattern, FileHandle, FileWrite, ListProgress, PullRequestSpec, RepositoryFacade};
use crate::error::{RepoError, RepoErrorKind};
use async_trait::async_trait;
use git2::{BranchType, ErrorClass, ErrorCode, IndexEntry, IndexTime, ObjectType, Repository, Signature, TreeWalkMode, TreeWalkResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

const PUSH_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct LocalGitRepository {
    root: PathBuf,
    remote: String,
}

fn map_git_error(err: git2::Error) -> RepoError {
    let kind = match err.code() {
        ErrorCode::NotFound => RepoErrorKind::NotFound,
        ErrorCode::Auth => RepoErrorKind::Auth,
        ErrorCode::Certificate => RepoErrorKind::Tls,
        _ => match err.class() {
            ErrorClass::Net | ErrorClass::Http => RepoErrorKind::Network,
            ErrorClass::Ssl => RepoErrorKind::Tls,
            _ => RepoErrorKind::Other,
        },
    };
    RepoError::new(kind, err.message().to_string())
}

impl LocalGitRepository {
    /// Open the repository containing `path`.
    pub fn open(path: &Path) -> Result<Self, RepoError> {
        let repo = Repository::discover(path).map_err(map_git_error)?;
        let root = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .to_path_buf();
        Ok(Self {
            root,
            remote: "origin".to_string(),
        })
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repo(&self) -> Result<Repository, RepoError> {
        Repository::open(&self.root).map_err(map_git_error)
    }

    fn branch_tree<'r>(repo: &'r Repository, branch: Option<&str>) -> Result<git2::Tree<'r>, RepoError> {
        let reference = match branch {
            Some(name) => repo
                .find_branch(name, BranchType::Local)
                .map_err(map_git_error)?
                .into_reference(),
            None => repo.head().map_err(map_git_error)?,
        };
        reference.peel_to_tree().map_err(map_git_error)
    }

    fn signature(repo: &Repository) -> Result<Signature<'static>, RepoError> {
        repo.signature()
            .or_else(|_| Signature::now("robomigrate", "robomigrate@localhost"))
            .map_err(map_git_error)
    }

    fn commit_files(&self, files: &[FileWrite], message: &str, branch: &str) -> Result<String, RepoError> {
        let repo = self.repo()?;
        let parent = repo
            .find_branch(branch, BranchType::Local)
            .map_err(map_git_error)?
            .get()
            .peel_to_commit()
            .map_err(map_git_error)?;

        let mut index = git2::Index::new().map_err(map_git_error)?;
        index
            .read_tree(&parent.tree().map_err(map_git_error)?)
            .map_err(map_git_error)?;

        for file in files {
            let oid = repo.blob(file.content.as_bytes()).map_err(map_git_error)?;
            let entry = IndexEntry {
                ctime: IndexTime::new(0, 0),
                mtime: IndexTime::new(0, 0),
                dev: 0,
                ino: 0,
                mode: 0o100644,
                uid: 0,
                gid: 0,
                file_size: file.content.len() as u32,
                id: oid,
                flags: 0,
                flags_extended: 0,
                path: file.path.as_bytes().to_vec(),
            };
            index.add(&entry).map_err(map_git_error)?;
        }

        let tree_oid = index.write_tree_to(&repo).map_err(map_git_error)?;
        let tree = repo.find_tree(tree_oid).map_err(map_git_error)?;
        let signature = Self::signature(&repo)?;
        let oid = repo
            .commit(
                Some(&format!("refs/heads/{}", branch)),
                &signature,
                &signature,
                message,
                &tree,
                &[&parent],
            )
            .map_err(map_git_error)?;
        Ok(oid.to_string())
    }

    async fn push_branch(&self, branch: &str) -> Result<(), RepoError> {
        let mut command = tokio::process::Command::new("git");
        command
            .arg("push")
            .arg("-u")
            .arg(&self.remote)
            .arg(branch)
            .current_dir(&self.root)
            .kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(PUSH_TIMEOUT_SECS), command.output())
            .await
            .map_err(|_| RepoError::new(RepoErrorKind::Timeout, "git push timed out"))?
            .map_err(|e| RepoError::other(format!("Failed to run git push: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        Err(RepoError::new(
            crate::error::classify_message(&stderr),
            format!("git push failed: {}", stderr.trim()),
        ))
    }
}

#[async_trait]
impl RepositoryFacade for LocalGitRepository {
    async fn list_branches(&self) -> Result<Vec<String>, RepoError> {
        let repo = self.repo()?;
        let branches = repo.branches(Some(BranchType::Local)).map_err(map_git_error)?;
        let mut names = Vec::new();
        for branch in branches {
            let (branch, _) = branch.map_err(map_git_error)?;
            if let Some(name) = branch.name().map_err(map_git_error)? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    async fn create_branch(&self, name: &str, from: &str) -> Result<(), RepoError> {
        let repo = self.repo()?;
        let base = repo
            .find_branch(from, BranchType::Local)
            .map_err(map_git_error)?
            .get()
            .peel_to_commit()
            .map_err(map_git_error)?;
        repo.branch(name, &base, false).map_err(map_git_error)?;
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<(), RepoError> {
        let repo = self.repo()?;
        let mut branch = repo
            .find_branch(name, BranchType::Local)
            .map_err(map_git_error)?;
        branch.delete().map_err(map_git_error)
    }

    async fn list_all_files(
        &self,
        path: &str,
        pattern: &str,
        branch: Option<&str>,
        progress: Option<ListProgress<'_>>,
    ) -> Result<Vec<FileHandle>, RepoError> {
        let repo = self.repo()?;
        let tree = Self::branch_tree(&repo, branch)?;
        let mut found = Vec::new();

        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() != Some(ObjectType::Blob) {
                return TreeWalkResult::Ok;
            }
            let Some(name) = entry.name() else {
                return TreeWalkResult::Ok;
            };
            let full = format!("{}{}", dir, name);
            if is_under(&full, path) && matches_pattern(name, pattern) {
                found.push(FileHandle {
                    path: full,
                    size: None,
                });
                if let Some(report) = progress {
                    report(found.len(), dir.trim_end_matches('/'));
                }
            }
            TreeWalkResult::Ok
        })
        .map_err(map_git_error)?;

        Ok(found)
    }

    async fn read_file(&self, path: &str, branch: Option<&str>) -> Result<String, RepoError> {
        let repo = self.repo()?;
        let tree = Self::branch_tree(&repo, branch)?;
        let entry = tree.get_path(Path::new(path)).map_err(map_git_error)?;
        let blob = entry
            .to_object(&repo)
            .and_then(|object| object.peel_to_blob())
            .map_err(map_git_error)?;
        Ok(String::from_utf8_lossy(blob.content()).to_string())
    }

    async fn write_file(&self, file: &FileWrite, message: &str, branch: &str) -> Result<String, RepoError> {
        self.commit_files(std::slice::from_ref(file), message, branch)
    }

    fn supports_multi_file_write(&self) -> bool {
        true
    }

    async fn write_files(&self, files: &[FileWrite], message: &str, branch: &str) -> Result<String, RepoError> {
        self.commit_files(files, message, branch)
    }

    async fn create_pull_request(&self, spec: &PullRequestSpec) -> Result<String, RepoError> {
        self.push_branch(&spec.head).await?;
        let (owner, repo) = github::remote_info(&self.root)?;
        github::create_pull_request(&owner, &repo, spec).await
    }
}
