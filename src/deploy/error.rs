// ABOUTME: Error types for deployment operations.
// ABOUTME: DeployErrorKind groups failures for callers that react by category.

use crate::build::BuildError;
use crate::containers::LifecycleError;
use crate::data::DataError;
use crate::git::GitError;
use crate::notify::NotifyError;
use crate::types::ProjectNameError;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("deployment is not initialized")]
    NotInitialized,

    #[error("deployment is already initialized; destroy it before setting up another project")]
    AlreadyInitialized,

    #[error("a remote URL is required to set up a deployment")]
    MissingRemote,

    #[error("invalid project name: {0}")]
    InvalidProject(#[from] ProjectNameError),

    /// Nothing but the daemon is running.
    #[error("There are currently no active containers.")]
    NoContainers,

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Lifecycle(LifecycleError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    /// The operation is not valid in the current state or with the given input.
    Precondition,
    /// The remote rejected the deploy key.
    Authentication,
    /// The given remote is not the one checked out.
    RemoteMismatch,
    NoContainers,
    Build,
    /// Container runtime or git transport failure.
    Runtime,
    Storage,
    Io,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::NotInitialized
            | DeployError::AlreadyInitialized
            | DeployError::MissingRemote
            | DeployError::InvalidProject(_) => DeployErrorKind::Precondition,
            DeployError::NoContainers => DeployErrorKind::NoContainers,
            DeployError::Git(e) => match e {
                GitError::AuthenticationFailed { .. } => DeployErrorKind::Authentication,
                GitError::RemoteMismatch { .. } => DeployErrorKind::RemoteMismatch,
                GitError::BranchNotFound(_)
                | GitError::NoOrigin
                | GitError::Credential { .. } => DeployErrorKind::Precondition,
                GitError::Io(_) => DeployErrorKind::Io,
                GitError::NotFastForward | GitError::Git { .. } | GitError::Task(_) => {
                    DeployErrorKind::Runtime
                }
            },
            DeployError::Build(_) => DeployErrorKind::Build,
            DeployError::Lifecycle(_) => DeployErrorKind::Runtime,
            DeployError::Data(_) => DeployErrorKind::Storage,
            DeployError::Notify(_) => DeployErrorKind::Io,
            DeployError::Io(_) => DeployErrorKind::Io,
        }
    }

    /// Whether trying again unchanged might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), DeployErrorKind::Runtime | DeployErrorKind::Io)
    }
}

impl From<LifecycleError> for DeployError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NoContainers => DeployError::NoContainers,
            other => DeployError::Lifecycle(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_containers_is_a_distinct_sentinel() {
        let err = DeployError::from(LifecycleError::NoContainers);
        assert!(matches!(err, DeployError::NoContainers));
        assert_eq!(err.kind(), DeployErrorKind::NoContainers);
        assert_eq!(err.to_string(), "There are currently no active containers.");
    }

    #[test]
    fn git_failures_are_categorised() {
        let auth = DeployError::from(GitError::AuthenticationFailed { deploy_key: None });
        assert_eq!(auth.kind(), DeployErrorKind::Authentication);
        assert!(!auth.is_retryable());

        let mismatch = DeployError::from(GitError::RemoteMismatch {
            local: "a".into(),
            given: "b".into(),
        });
        assert_eq!(mismatch.kind(), DeployErrorKind::RemoteMismatch);
    }

    #[test]
    fn preconditions_are_not_retryable() {
        assert!(!DeployError::NotInitialized.is_retryable());
        assert!(!DeployError::MissingRemote.is_retryable());
    }

    #[test]
    fn lifecycle_failures_are_retryable() {
        let err = DeployError::from(LifecycleError::Prune(vec!["busy".into()]));
        assert_eq!(err.kind(), DeployErrorKind::Runtime);
        assert!(err.is_retryable());
    }
}
