// ABOUTME: Error types for git synchronization.
// ABOUTME: Transport failures that mean "bad credentials" collapse into one variant.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("{}", authentication_message(.deploy_key.as_deref()))]
    AuthenticationFailed { deploy_key: Option<String> },

    #[error(
        "The given remote URL does not match that of the repository in\nyour remote - try 'keel [remote] reset'"
    )]
    RemoteMismatch { local: String, given: String },

    #[error("branch {0} does not exist on the remote")]
    BranchNotFound(String),

    #[error("fast-forward merge is not possible")]
    NotFastForward,

    #[error("repository has no origin remote")]
    NoOrigin,

    #[error("failed to read deploy key {path}: {source}")]
    Credential {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git {op} failed: {source}")]
    Git {
        op: &'static str,
        #[source]
        source: git2::Error,
    },

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl GitError {
    pub(crate) fn git(op: &'static str) -> impl FnOnce(git2::Error) -> GitError {
        move |source| GitError::Git { op, source }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, GitError::AuthenticationFailed { .. })
    }
}

fn authentication_message(deploy_key: Option<&str>) -> String {
    match deploy_key {
        Some(key) => format!(
            "git authentication failed - add the following deploy key to your repository:\n{key}"
        ),
        None => "git authentication failed - check that the daemon's deploy key has access to the repository".to_string(),
    }
}

/// Whether a git2 error means the remote rejected our credentials.
pub(crate) fn is_auth_failure(err: &git2::Error) -> bool {
    if err.code() == git2::ErrorCode::Auth {
        return true;
    }
    let message = err.message().to_lowercase();
    message.contains("invalid auth method")
        || message.contains("authorization failed")
        || message.contains("unable to authenticate")
        || message.contains("authentication required")
        || (err.class() == git2::ErrorClass::Ssh && message.contains("authenticat"))
}
