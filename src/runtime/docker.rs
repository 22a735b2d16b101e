// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Talks to the Docker Engine API over the local unix socket.

use super::error::{ConnectionSnafu, PingSnafu, RuntimeError, SocketMissingSnafu};
use super::traits::{
    BuildStream, ContainerConfig, ContainerError, ContainerFilters, ContainerOps,
    ContainerSummary, CreatedContainer, ImageBuildRequest, ImageDetails, ImageError, ImageOps,
    ImageSummary, LogError, LogLine, LogLineStream, LogOps, LogOptions, LogStream, PruneError,
    PruneOps, PruneReport,
};
use crate::types::{ContainerId, ImageId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{ContainerCreateBody, HostConfig, Mount, MountTypeEnum, PortBinding};
use bollard::query_parameters::{
    BuildImageOptions, CommitContainerOptions, CreateContainerOptions, CreateImageOptions,
    ListContainersOptions, ListImagesOptions, LogsOptions, PruneContainersOptions,
    PruneImagesOptions, PruneVolumesOptions, RemoveContainerOptions, RemoveImageOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use http_body_util::{Either, Full};
use snafu::{ResultExt, ensure};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const BUILD_STREAM_BUFFER: usize = 64;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn server_error(e: &bollard::errors::Error) -> Option<(u16, &str)> {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.as_str())),
        _ => None,
    }
}

fn map_image_pull_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match server_error(&e) {
        Some((404, _)) => ImageError::NotFound(image_name.to_string()),
        _ => ImageError::PullFailed(format!("{}: {}", image_name, e)),
    }
}

fn map_image_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match server_error(&e) {
        Some((404, _)) => ImageError::NotFound(image_name.to_string()),
        Some((409, message)) => ImageError::InUse(format!("{}: {}", image_name, message)),
        _ => ImageError::Runtime(format!("{}: {}", image_name, e)),
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::ImageNotFound(message.to_string()),
        Some((409, message)) => ContainerError::AlreadyExists(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((304, message)) => ContainerError::AlreadyRunning(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_stop_error(e: bollard::errors::Error) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((304, message)) => ContainerError::NotRunning(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_prune_error(e: bollard::errors::Error) -> PruneError {
    match server_error(&e) {
        Some((409, _)) => PruneError::AlreadyRunning,
        _ => PruneError::Runtime(e.to_string()),
    }
}

/// Split `repo[:tag]` the way the engine does; a colon inside a registry host is not a tag.
fn split_reference(reference: &str) -> (&str, &str) {
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, tag),
        _ => (reference, "latest"),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
pub struct BollardRuntime {
    client: Docker,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker) -> Self {
        Self { client }
    }

    /// Connect to the engine listening on `socket`.
    pub fn connect(socket: &str) -> Result<Self, RuntimeError> {
        ensure!(Path::new(socket).exists(), SocketMissingSnafu { socket });
        let client = Docker::connect_with_unix(socket, 120, bollard::API_DEFAULT_VERSION)
            .context(ConnectionSnafu { socket })?;
        Ok(Self::new(client))
    }

    /// Check the engine answers.
    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.client.ping().await.context(PingSnafu)?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn pull_image(&self, reference: &str) -> Result<(), ImageError> {
        let opts = CreateImageOptions {
            from_image: Some(reference.to_string()),
            ..Default::default()
        };

        // Pull returns a stream of progress updates; drain it.
        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| map_image_pull_error(e, reference))?;
        }

        Ok(())
    }

    async fn build_image(&self, request: ImageBuildRequest) -> Result<BuildStream, ImageError> {
        let options = BuildImageOptions {
            dockerfile: request.dockerfile,
            t: Some(request.tag),
            rm: true,
            ..Default::default()
        };

        let body = Either::Left(Full::new(Bytes::from(request.context)));

        // bollard's build stream borrows the client; forward it from a task that owns a clone.
        let client = self.client.clone();
        let (mut tx, rx) = mpsc::channel(BUILD_STREAM_BUFFER);
        tokio::spawn(async move {
            let mut stream = client.build_image(options, None, Some(body));
            while let Some(result) = stream.next().await {
                let item = match result {
                    Ok(info) => match info.error_detail {
                        Some(detail) => Some(Err(ImageError::BuildFailed(
                            detail.message.unwrap_or_else(|| "unknown build error".to_string()),
                        ))),
                        None => info.stream.filter(|s| !s.is_empty()).map(Ok),
                    },
                    Err(e) => Some(Err(ImageError::BuildFailed(e.to_string()))),
                };
                let Some(item) = item else { continue };
                if tx.send(item).await.is_err() {
                    tracing::debug!("build output receiver dropped");
                    break;
                }
            }
        });

        Ok(Box::pin(rx))
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageDetails, ImageError> {
        let details = self
            .client
            .inspect_image(reference)
            .await
            .map_err(|e| map_image_error(e, reference))?;

        Ok(ImageDetails {
            id: ImageId::new(details.id.unwrap_or_default()),
            tags: details.repo_tags.unwrap_or_default(),
            exposed_ports: details
                .config
                .and_then(|c| c.exposed_ports)
                .unwrap_or_default(),
        })
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, ImageError> {
        let opts = ListImagesOptions {
            all: true,
            ..Default::default()
        };

        let images = self
            .client
            .list_images(Some(opts))
            .await
            .map_err(|e| ImageError::Runtime(e.to_string()))?;

        Ok(images
            .into_iter()
            .map(|image| ImageSummary {
                id: ImageId::new(image.id),
                tags: image.repo_tags,
            })
            .collect())
    }

    async fn remove_image(&self, reference: &str, force: bool) -> Result<(), ImageError> {
        let opts = RemoveImageOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_image(reference, Some(opts), None)
            .await
            .map_err(|e| map_image_error(e, reference))?;

        Ok(())
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<CreatedContainer, ContainerError> {
        let mut host_config = HostConfig {
            auto_remove: Some(config.auto_remove),
            ..Default::default()
        };

        let mounts: Vec<Mount> = config
            .volumes
            .iter()
            .map(|m| Mount {
                source: Some(m.source.clone()),
                target: Some(m.target.clone()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect();
        if !mounts.is_empty() {
            host_config.mounts = Some(mounts);
        }

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: Vec<String> = Vec::new();
        for port in &config.ports {
            let port_key = port.key();
            exposed_ports.push(port_key.clone());

            if let Some(host_port) = port.host_port {
                port_bindings.insert(
                    port_key,
                    Some(vec![PortBinding {
                        host_ip: port.host_ip.clone(),
                        host_port: Some(host_port.to_string()),
                    }]),
                );
            }
        }
        if !port_bindings.is_empty() {
            host_config.port_bindings = Some(port_bindings);
        }

        let body = ContainerCreateBody {
            image: Some(config.image.clone()),
            env: if config.env.is_empty() {
                None
            } else {
                Some(config.env.clone())
            },
            cmd: config.command.clone(),
            working_dir: config.working_dir.clone(),
            host_config: Some(host_config),
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(config.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_container_create_error)?;

        tracing::debug!(name = %config.name, id = %response.id, "created container");

        Ok(CreatedContainer {
            id: ContainerId::new(response.id),
            warnings: response.warnings,
        })
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![name.clone()]);
        }

        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| ContainerError::Runtime(e.to_string()))?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let name = c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default();

                ContainerSummary {
                    id: ContainerId::new(c.id.unwrap_or_default()),
                    name,
                    image: c.image.unwrap_or_default(),
                    state: c
                        .state
                        .map(|s| format!("{:?}", s).to_lowercase())
                        .unwrap_or_default(),
                    status: c.status.unwrap_or_default(),
                    labels: c.labels.unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        let mut stream = self
            .client
            .wait_container(id.as_str(), None::<WaitContainerOptions>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error; it is still an exit status.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(map_container_not_found_error(e)),
            None => Err(ContainerError::Runtime(format!(
                "wait on {} ended without an exit status",
                id.short()
            ))),
        }
    }

    async fn commit_container(
        &self,
        id: &ContainerId,
        reference: &str,
    ) -> Result<ImageId, ContainerError> {
        let (repo, tag) = split_reference(reference);
        let opts = CommitContainerOptions {
            container: Some(id.to_string()),
            repo: Some(repo.to_string()),
            tag: Some(tag.to_string()),
            pause: true,
            ..Default::default()
        };

        let response = self
            .client
            .commit_container(opts, bollard::models::ContainerConfig::default())
            .await
            .map_err(map_container_not_found_error)?;

        Ok(ImageId::new(response.id))
    }
}

#[async_trait]
impl LogOps for BollardRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLineStream, LogError> {
        let log_opts = LogsOptions {
            stdout: opts.stdout,
            stderr: opts.stderr,
            follow: opts.follow,
            timestamps: opts.timestamps,
            tail: opts
                .tail
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string()),
            ..Default::default()
        };

        let stream = self.client.logs(id.as_str(), Some(log_opts));

        let mapped_stream = stream.map(|result| {
            result
                .map(|output| {
                    let (stream, data) = match output {
                        bollard::container::LogOutput::StdErr { message } => {
                            (LogStream::Stderr, message)
                        }
                        bollard::container::LogOutput::StdOut { message }
                        | bollard::container::LogOutput::StdIn { message }
                        | bollard::container::LogOutput::Console { message } => {
                            (LogStream::Stdout, message)
                        }
                    };

                    LogLine {
                        content: String::from_utf8_lossy(&data).to_string(),
                        stream,
                    }
                })
                .map_err(|e| match server_error(&e) {
                    Some((404, message)) => LogError::ContainerNotFound(message.to_string()),
                    _ => LogError::StreamError(e.to_string()),
                })
        });

        Ok(Box::pin(mapped_stream))
    }
}

#[async_trait]
impl PruneOps for BollardRuntime {
    async fn prune_containers(&self) -> Result<PruneReport, PruneError> {
        let response = self
            .client
            .prune_containers(None::<PruneContainersOptions>)
            .await
            .map_err(map_prune_error)?;

        Ok(PruneReport {
            deleted: response.containers_deleted.unwrap_or_default(),
            space_reclaimed: response.space_reclaimed.unwrap_or(0).max(0) as u64,
        })
    }

    async fn prune_images(&self) -> Result<PruneReport, PruneError> {
        let response = self
            .client
            .prune_images(None::<PruneImagesOptions>)
            .await
            .map_err(map_prune_error)?;

        Ok(PruneReport {
            deleted: response
                .images_deleted
                .unwrap_or_default()
                .into_iter()
                .filter_map(|item| item.deleted.or(item.untagged))
                .collect(),
            space_reclaimed: response.space_reclaimed.unwrap_or(0).max(0) as u64,
        })
    }

    async fn prune_volumes(&self) -> Result<PruneReport, PruneError> {
        let response = self
            .client
            .prune_volumes(None::<PruneVolumesOptions>)
            .await
            .map_err(map_prune_error)?;

        Ok(PruneReport {
            deleted: response.volumes_deleted.unwrap_or_default(),
            space_reclaimed: response.space_reclaimed.unwrap_or(0).max(0) as u64,
        })
    }
}
