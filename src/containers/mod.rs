// ABOUTME: Container lifecycle management around deployments.
// ABOUTME: Classifies containers by role, stops project containers, and prunes runtime state.

mod logs;

pub use logs::LogPump;

use crate::config::DaemonConfig;
use crate::output::Output;
use crate::runtime::{
    ContainerError, ContainerFilters, ContainerOps, ImageError, ImageOps, LogError, LogOps,
    LogOptions, PruneError, PruneOps,
};
use crate::types::ContainerId;
use std::time::Duration;

/// Name of the container that runs `docker-compose up` for compose projects.
pub const COMPOSE_COORDINATOR_NAME: &str = "docker-compose";

/// What a container is, as far as deployment bookkeeping cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRole {
    /// The daemon's own container. Never stopped.
    Daemon,
    /// A build container or the compose coordinator.
    BuildStage,
    /// Part of the deployed application.
    Project,
}

/// A running container, classified.
#[derive(Debug, Clone)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub role: ContainerRole,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Nothing but the daemon is running.
    #[error("There are currently no active containers.")]
    NoContainers,

    #[error("failed to list containers: {0}")]
    List(#[source] ContainerError),

    #[error("failed to stop container {name}: {source}")]
    Stop {
        name: String,
        #[source]
        source: ContainerError,
    },

    #[error("failed to list images: {0}")]
    Images(#[source] ImageError),

    #[error("prune failed: {}", .0.join("; "))]
    Prune(Vec<String>),
}

/// Lists, stops, and cleans up containers on behalf of a deployment.
#[derive(Debug, Clone)]
pub struct ContainerLifecycle {
    daemon_name: String,
    build_stage_name: String,
    stop_timeout: Duration,
}

impl ContainerLifecycle {
    pub fn new(
        daemon_name: impl Into<String>,
        build_stage_name: impl Into<String>,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            daemon_name: daemon_name.into(),
            build_stage_name: build_stage_name.into(),
            stop_timeout,
        }
    }

    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new(
            config.daemon_container_name.clone(),
            config.build_stage_name.clone(),
            config.stop_timeout,
        )
    }

    pub fn build_stage_name(&self) -> &str {
        &self.build_stage_name
    }

    pub fn classify(&self, name: &str) -> ContainerRole {
        let name = name.trim_start_matches('/');
        if name == self.daemon_name {
            ContainerRole::Daemon
        } else if name == self.build_stage_name || name == COMPOSE_COORDINATOR_NAME {
            ContainerRole::BuildStage
        } else {
            ContainerRole::Project
        }
    }

    /// Running containers other than the daemon.
    ///
    /// Returns [`LifecycleError::NoContainers`] when the daemon is all there is,
    /// so callers can tell "nothing to tear down" from a failure.
    pub async fn active_containers<R>(&self, runtime: &R) -> Result<Vec<Container>, LifecycleError>
    where
        R: ContainerOps + ?Sized,
    {
        let summaries = runtime
            .list_containers(&ContainerFilters::default())
            .await
            .map_err(LifecycleError::List)?;

        let containers: Vec<Container> = summaries
            .into_iter()
            .map(|c| {
                let name = c.name.trim_start_matches('/').to_string();
                Container {
                    role: self.classify(&name),
                    id: c.id,
                    name,
                    image: c.image,
                }
            })
            .filter(|c| c.role != ContainerRole::Daemon)
            .collect();

        if containers.is_empty() {
            return Err(LifecycleError::NoContainers);
        }
        Ok(containers)
    }

    /// Stop every non-daemon container, then prune stopped containers.
    pub async fn stop_active_containers<R>(
        &self,
        runtime: &R,
        out: &Output,
    ) -> Result<(), LifecycleError>
    where
        R: ContainerOps + PruneOps + ?Sized,
    {
        out.progress("Shutting down active containers...");

        let containers = match self.active_containers(runtime).await {
            Ok(containers) => containers,
            Err(LifecycleError::NoContainers) => Vec::new(),
            Err(e) => return Err(e),
        };

        for container in &containers {
            out.progress(format!("Stopping {}...", container.name));
            match runtime.stop_container(&container.id, self.stop_timeout).await {
                Ok(()) => {}
                Err(e) if e.is_benign_for_stop() => {
                    tracing::debug!(container = %container.name, "already stopped: {e}");
                }
                Err(source) => {
                    return Err(LifecycleError::Stop {
                        name: container.name.clone(),
                        source,
                    });
                }
            }
        }

        match runtime.prune_containers().await {
            Ok(report) => {
                if !report.deleted.is_empty() {
                    out.progress(format!("Removed {} stopped containers", report.deleted.len()));
                }
                Ok(())
            }
            Err(PruneError::AlreadyRunning) => {
                tracing::warn!("container prune skipped: another prune is running");
                Ok(())
            }
            Err(e) => Err(LifecycleError::Prune(vec![e.to_string()])),
        }
    }

    /// Routine cleanup: dangling images, stopped containers, unused volumes.
    pub async fn prune<R>(&self, runtime: &R, out: &Output) -> Result<(), LifecycleError>
    where
        R: PruneOps + ?Sized,
    {
        let mut failures = Vec::new();
        let mut removed = 0usize;
        let mut reclaimed = 0u64;

        for (what, result) in [
            ("images", runtime.prune_images().await),
            ("containers", runtime.prune_containers().await),
            ("volumes", runtime.prune_volumes().await),
        ] {
            match result {
                Ok(report) => {
                    removed += report.deleted.len();
                    reclaimed += report.space_reclaimed;
                }
                Err(e) => failures.push(format!("{what}: {e}")),
            }
        }

        tracing::debug!(removed, reclaimed, "pruned runtime state");
        if removed > 0 {
            out.progress(format!(
                "Pruned {removed} unused objects ({reclaimed} bytes reclaimed)"
            ));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::Prune(failures))
        }
    }

    /// Force-remove every image whose tags match none of `exceptions`, then prune.
    pub async fn prune_all<R>(
        &self,
        runtime: &R,
        exceptions: &[&str],
        out: &Output,
    ) -> Result<(), LifecycleError>
    where
        R: ImageOps + PruneOps + ?Sized,
    {
        let images = runtime
            .list_images()
            .await
            .map_err(LifecycleError::Images)?;

        let mut failures = Vec::new();
        for image in images {
            let keep = image
                .tags
                .iter()
                .any(|tag| exceptions.iter().any(|keep| tag.contains(keep)));
            if keep {
                continue;
            }

            let label = image
                .tags
                .first()
                .cloned()
                .unwrap_or_else(|| image.id.short().to_string());
            match runtime.remove_image(image.id.as_str(), true).await {
                Ok(()) => out.progress(format!("Removed image {label}")),
                Err(ImageError::NotFound(_)) => {}
                Err(ImageError::InUse(reason)) => {
                    out.warning(format!("Kept image {label}: {reason}"));
                }
                Err(e) => failures.push(format!("{label}: {e}")),
            }
        }

        for (what, result) in [
            ("containers", runtime.prune_containers().await),
            ("volumes", runtime.prune_volumes().await),
        ] {
            if let Err(e) = result {
                failures.push(format!("{what}: {e}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::Prune(failures))
        }
    }

    /// Follow a container's output into `out` until the returned pump is finished.
    pub async fn stream_logs<R>(
        &self,
        runtime: &R,
        id: &ContainerId,
        out: &Output,
    ) -> Result<LogPump, LogError>
    where
        R: LogOps + ?Sized,
    {
        let stream = runtime
            .container_logs(id, &LogOptions::follow_output())
            .await?;
        Ok(LogPump::spawn(stream, out.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContainerConfig, ContainerSummary, CreatedContainer};
    use crate::types::ImageId;
    use async_trait::async_trait;

    /// Lists containers the way the engine names them, with a leading slash.
    struct EngineNames(Vec<&'static str>);

    #[async_trait]
    impl ContainerOps for EngineNames {
        async fn create_container(
            &self,
            _config: &ContainerConfig,
        ) -> Result<CreatedContainer, ContainerError> {
            unreachable!()
        }

        async fn start_container(&self, _id: &ContainerId) -> Result<(), ContainerError> {
            unreachable!()
        }

        async fn stop_container(
            &self,
            _id: &ContainerId,
            _timeout: Duration,
        ) -> Result<(), ContainerError> {
            unreachable!()
        }

        async fn remove_container(
            &self,
            _id: &ContainerId,
            _force: bool,
        ) -> Result<(), ContainerError> {
            unreachable!()
        }

        async fn list_containers(
            &self,
            _filters: &ContainerFilters,
        ) -> Result<Vec<ContainerSummary>, ContainerError> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, name)| ContainerSummary {
                    id: ContainerId::new(format!("{i:064x}")),
                    name: name.to_string(),
                    image: "img".to_string(),
                    state: "running".to_string(),
                    status: String::new(),
                    labels: Default::default(),
                })
                .collect())
        }

        async fn wait_container(&self, _id: &ContainerId) -> Result<i64, ContainerError> {
            unreachable!()
        }

        async fn commit_container(
            &self,
            _id: &ContainerId,
            _reference: &str,
        ) -> Result<ImageId, ContainerError> {
            unreachable!()
        }
    }

    fn lifecycle() -> ContainerLifecycle {
        ContainerLifecycle::new("keel-daemon", "build", Duration::from_secs(10))
    }

    #[test]
    fn reserved_names_are_classified() {
        let lc = lifecycle();
        assert_eq!(lc.classify("/keel-daemon"), ContainerRole::Daemon);
        assert_eq!(lc.classify("build"), ContainerRole::BuildStage);
        assert_eq!(lc.classify("/docker-compose"), ContainerRole::BuildStage);
        assert_eq!(lc.classify("/web_app_1"), ContainerRole::Project);
    }

    #[test]
    fn names_only_match_exactly() {
        let lc = lifecycle();
        assert_eq!(lc.classify("keel-daemon-old"), ContainerRole::Project);
        assert_eq!(lc.classify("builder"), ContainerRole::Project);
    }

    #[test]
    fn prune_error_lists_every_failure() {
        let err = LifecycleError::Prune(vec!["images: boom".into(), "volumes: bang".into()]);
        assert_eq!(err.to_string(), "prune failed: images: boom; volumes: bang");
    }

    #[tokio::test]
    async fn active_container_names_drop_the_leading_slash() {
        let runtime = EngineNames(vec!["/keel-daemon", "/app_web_1", "/docker-compose"]);

        let containers = lifecycle().active_containers(&runtime).await.unwrap();

        let names: Vec<_> = containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["app_web_1", "docker-compose"]);
        assert_eq!(containers[0].role, ContainerRole::Project);
        assert_eq!(containers[1].role, ContainerRole::BuildStage);
    }

    #[tokio::test]
    async fn daemon_alone_is_reported_as_no_containers() {
        let runtime = EngineNames(vec!["/keel-daemon"]);

        let err = lifecycle().active_containers(&runtime).await.unwrap_err();

        assert!(matches!(err, LifecycleError::NoContainers));
    }
}
