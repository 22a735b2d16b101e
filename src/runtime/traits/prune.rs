// ABOUTME: Prune operations trait for container runtimes.
// ABOUTME: Removes stopped containers, dangling images, and unused volumes.

use async_trait::async_trait;

#[async_trait]
pub trait PruneOps: Send + Sync {
    async fn prune_containers(&self) -> Result<PruneReport, PruneError>;

    async fn prune_images(&self) -> Result<PruneReport, PruneError>;

    async fn prune_volumes(&self) -> Result<PruneReport, PruneError>;
}

/// What a prune call removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: Vec<String>,
    pub space_reclaimed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum PruneError {
    #[error("a prune operation is already running")]
    AlreadyRunning,

    #[error("runtime error: {0}")]
    Runtime(String),
}
