// ABOUTME: Result of a successful build: created containers that are not yet started.
// ABOUTME: Going live is a separate, explicit step so callers can act between the two.

use super::{BuildError, BuildType};
use crate::output::Output;
use crate::runtime::ContainerOps;
use crate::types::ContainerId;

/// A container created by a build and waiting to be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedContainer {
    pub id: ContainerId,
    pub name: String,
}

/// A build that succeeded but has not gone live.
#[derive(Debug)]
#[must_use = "a prepared deployment does nothing until activated"]
pub struct PreparedDeployment {
    build_type: BuildType,
    containers: Vec<PreparedContainer>,
}

impl PreparedDeployment {
    pub fn new(build_type: BuildType, containers: Vec<PreparedContainer>) -> Self {
        Self {
            build_type,
            containers,
        }
    }

    /// The strategy that actually ran, after any fallback.
    pub fn build_type(&self) -> &BuildType {
        &self.build_type
    }

    /// Containers that `activate` will start, in start order.
    pub fn containers(&self) -> &[PreparedContainer] {
        &self.containers
    }

    /// Start every prepared container.
    pub async fn activate<R>(self, runtime: &R, out: &Output) -> Result<(), BuildError>
    where
        R: ContainerOps + ?Sized,
    {
        for container in &self.containers {
            out.progress(format!(
                "Starting up project in container {}...",
                container.name
            ));
            runtime.start_container(&container.id).await?;
        }
        Ok(())
    }
}
