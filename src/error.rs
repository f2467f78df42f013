//! Error taxonomy
//!
//! Facade failures carry a [`RepoErrorKind`] so the reader, the committer and
//! the workflow controller can each decide whether to retry, record or stop.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure categories surfaced by a repository facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoErrorKind {
    Auth,
    Authorization,
    NotFound,
    Network,
    Tls,
    /// HTTP 429 or an equivalent throttling signal
    RateLimited,
    /// Malformed or empty response body, usually a throttled read
    MalformedResponse,
    Timeout,
    Unsupported,
    Other,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RepoError {
    pub kind: RepoErrorKind,
    pub message: String,
}

impl RepoError {
    pub fn new(kind: RepoErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::NotFound, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::Other, message)
    }

    /// Whether a read should be retried with backoff
    pub fn is_throttling(&self) -> bool {
        matches!(
            self.kind,
            RepoErrorKind::RateLimited | RepoErrorKind::MalformedResponse
        )
    }
}

/// Stable codes attached to a run that ended in the Failed phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "E_AUTH")]
    Auth,
    #[serde(rename = "E_AUTHZ")]
    Authorization,
    #[serde(rename = "E_NOT_FOUND")]
    NotFound,
    #[serde(rename = "E_NETWORK")]
    Network,
    #[serde(rename = "E_TLS")]
    Tls,
    #[serde(rename = "E_BRANCH")]
    Branch,
    #[serde(rename = "E_SKELETON")]
    Skeleton,
    #[serde(rename = "E_PULL_REQUEST")]
    PullRequest,
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Auth => "E_AUTH",
            ErrorCode::Authorization => "E_AUTHZ",
            ErrorCode::NotFound => "E_NOT_FOUND",
            ErrorCode::Network => "E_NETWORK",
            ErrorCode::Tls => "E_TLS",
            ErrorCode::Branch => "E_BRANCH",
            ErrorCode::Skeleton => "E_SKELETON",
            ErrorCode::PullRequest => "E_PULL_REQUEST",
            ErrorCode::Internal => "E_INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure that ends the run early
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct MigrationError {
    pub code: ErrorCode,
    pub message: String,
}

impl MigrationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Rewrite an access-validation failure into an actionable diagnostic.
    pub fn from_access(err: &RepoError, branch: &str) -> Self {
        match err.kind {
            RepoErrorKind::Auth => Self::new(
                ErrorCode::Auth,
                format!(
                    "Authentication failed ({}). Check that your token is set and has not expired.",
                    err.message
                ),
            ),
            RepoErrorKind::Authorization => Self::new(
                ErrorCode::Authorization,
                format!(
                    "Access denied ({}). The token needs read and write access to the repository.",
                    err.message
                ),
            ),
            RepoErrorKind::NotFound => Self::new(
                ErrorCode::NotFound,
                format!(
                    "Repository or branch '{}' was not found ({}). Check the repository path and branch name.",
                    branch, err.message
                ),
            ),
            RepoErrorKind::Network | RepoErrorKind::Timeout => Self::new(
                ErrorCode::Network,
                format!(
                    "Could not reach the repository host ({}). Check your network connection and DNS settings.",
                    err.message
                ),
            ),
            RepoErrorKind::Tls => Self::new(
                ErrorCode::Tls,
                format!(
                    "TLS handshake failed ({}). Check proxy settings and installed certificates.",
                    err.message
                ),
            ),
            _ => Self::new(
                ErrorCode::Internal,
                format!("Repository access check failed: {}", err.message),
            ),
        }
    }
}

/// Infer a facade error category from free-form failure text.
///
/// Adapters that only see strings (command output, HTTP bodies) use this to
/// keep the controller's diagnostics specific.
pub fn classify_message(message: &str) -> RepoErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        RepoErrorKind::RateLimited
    } else if lower.contains("401") || lower.contains("unauthorized") || lower.contains("bad credentials") {
        RepoErrorKind::Auth
    } else if lower.contains("403") || lower.contains("forbidden") || lower.contains("permission") {
        RepoErrorKind::Authorization
    } else if lower.contains("certificate") || lower.contains("ssl") || lower.contains("tls") {
        RepoErrorKind::Tls
    } else if lower.contains("timed out") || lower.contains("timeout") {
        RepoErrorKind::Timeout
    } else if lower.contains("dns")
        || lower.contains("resolve host")
        || lower.contains("connection")
        || lower.contains("network")
    {
        RepoErrorKind::Network
    } else if lower.contains("404") || lower.contains("not found") {
        RepoErrorKind::NotFound
    } else {
        RepoErrorKind::Other
    }
}
