// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Create, start, stop, wait, commit, remove, and list containers.

use super::shared_types::ContainerConfig;
use crate::types::{ContainerId, ImageId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Send + Sync {
    /// Create a container from the given configuration without starting it.
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<CreatedContainer, ContainerError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop a running container, killing it once `timeout` elapses.
    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError>;

    /// Remove a container.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    /// List containers matching the given filters.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;

    /// Block until the container exits and return its exit status.
    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError>;

    /// Snapshot a stopped container's filesystem as a new image tagged `reference`.
    async fn commit_container(
        &self,
        id: &ContainerId,
        reference: &str,
    ) -> Result<ImageId, ContainerError>;
}

/// Result of a create call. The runtime may accept the request and still warn.
#[derive(Debug, Clone)]
pub struct CreatedContainer {
    pub id: ContainerId,
    pub warnings: Vec<String>,
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
    /// Filter by name (supports partial match).
    pub name: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: ContainerId,
    /// Primary name with the leading slash removed.
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
    pub labels: HashMap<String, String>,
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ContainerError {
    /// Errors that mean the container is already gone or already stopped.
    pub fn is_benign_for_stop(&self) -> bool {
        matches!(self, ContainerError::NotFound(_) | ContainerError::NotRunning(_))
    }
}
