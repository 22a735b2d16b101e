// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Pull, build, inspect, list, and remove container images.

use crate::types::ImageId;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Incremental output of an image build. `Err` items are build errors reported mid-stream.
pub type BuildStream = Pin<Box<dyn Stream<Item = Result<String, ImageError>> + Send>>;

/// Image operations.
#[async_trait]
pub trait ImageOps: Send + Sync {
    /// Pull an image from its registry.
    async fn pull_image(&self, reference: &str) -> Result<(), ImageError>;

    /// Start an image build from a tar context and stream its output.
    async fn build_image(&self, request: ImageBuildRequest) -> Result<BuildStream, ImageError>;

    /// Inspect a local image by reference or id.
    async fn inspect_image(&self, reference: &str) -> Result<ImageDetails, ImageError>;

    /// List all local images.
    async fn list_images(&self) -> Result<Vec<ImageSummary>, ImageError>;

    /// Remove an image.
    async fn remove_image(&self, reference: &str, force: bool) -> Result<(), ImageError>;
}

/// Parameters for an image build.
#[derive(Debug, Clone)]
pub struct ImageBuildRequest {
    /// Uncompressed tar archive of the build context.
    pub context: Vec<u8>,
    /// Dockerfile path relative to the context root.
    pub dockerfile: String,
    pub tag: String,
}

#[derive(Debug, Clone)]
pub struct ImageDetails {
    pub id: ImageId,
    pub tags: Vec<String>,
    /// Ports declared with EXPOSE, in `port/proto` form.
    pub exposed_ports: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ImageSummary {
    pub id: ImageId,
    pub tags: Vec<String>,
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("image in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
