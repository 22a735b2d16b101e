// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ContainerOps, ImageOps, LogOps, PruneOps and the ContainerRuntime umbrella.

mod container;
mod image;
mod logs;
mod prune;
mod shared_types;

pub use container::{
    ContainerError, ContainerFilters, ContainerOps, ContainerSummary, CreatedContainer,
};
pub use image::{BuildStream, ImageBuildRequest, ImageDetails, ImageError, ImageOps, ImageSummary};
pub use logs::{LogError, LogLine, LogLineStream, LogOps, LogOptions, LogStream};
pub use prune::{PruneError, PruneOps, PruneReport};
pub use shared_types::*;

/// Everything the deployment engine asks of a container runtime.
pub trait ContainerRuntime: ContainerOps + ImageOps + LogOps + PruneOps {}

impl<T> ContainerRuntime for T where T: ContainerOps + ImageOps + LogOps + PruneOps {}
