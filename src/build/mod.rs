// ABOUTME: Build strategy dispatch: compose, Dockerfile, or buildpack.
// ABOUTME: Every strategy returns a PreparedDeployment whose containers are created but not started.

mod buildpack;
mod compose;
mod config;
mod context;
mod dockerfile;
mod prepared;

pub use buildpack::BuildpackBuild;
pub use compose::ComposeBuild;
pub use config::BuildConfig;
pub use context::build_context;
pub use dockerfile::DockerfileBuild;
pub use prepared::{PreparedContainer, PreparedDeployment};

use crate::config::{DaemonConfig, HostPaths};
use crate::containers::LogPump;
use crate::output::Output;
use crate::runtime::{
    ContainerConfig, ContainerError, ContainerRuntime, ImageError, LogError, LogOptions,
};
use crate::types::{ContainerId, ProjectName};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Which build strategy a project uses.
///
/// Parsing never fails: unrecognised tags become [`BuildType::Unknown`],
/// which the builder runs as compose after warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildType {
    Compose,
    Dockerfile,
    Buildpack,
    Unknown(String),
}

impl BuildType {
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "docker-compose" | "compose" => BuildType::Compose,
            "dockerfile" | "docker" => BuildType::Dockerfile,
            "buildpack" | "herokuish" => BuildType::Buildpack,
            _ => BuildType::Unknown(tag.to_string()),
        }
    }

    /// Build file used when none is configured.
    pub fn default_build_file(&self) -> &'static str {
        match self {
            BuildType::Compose | BuildType::Unknown(_) => DEFAULT_COMPOSE_FILE,
            BuildType::Dockerfile => DEFAULT_DOCKERFILE,
            BuildType::Buildpack => "",
        }
    }

    /// `configured` if non-empty, otherwise the default for this type.
    pub fn resolve_build_file(&self, configured: &str) -> String {
        if configured.is_empty() {
            self.default_build_file().to_string()
        } else {
            configured.to_string()
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildType::Compose => f.write_str("docker-compose"),
            BuildType::Dockerfile => f.write_str("dockerfile"),
            BuildType::Buildpack => f.write_str("buildpack"),
            BuildType::Unknown(tag) => f.write_str(tag),
        }
    }
}

impl From<String> for BuildType {
    fn from(tag: String) -> Self {
        BuildType::parse(&tag)
    }
}

impl From<BuildType> for String {
    fn from(build_type: BuildType) -> Self {
        build_type.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("container runtime reported warnings: {0}")]
    Warnings(String),

    #[error("build container {name} exited with non-zero status: {code}")]
    NonZeroExit { name: String, code: i64 },

    #[error("image {image} is unusable after build: {reason}")]
    ImageMissing { image: String, reason: String },

    #[error("failed to prepare build context: {0}")]
    Context(#[source] std::io::Error),

    #[error("build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Logs(#[from] LogError),
}

/// A procedure that turns a checkout into created, not-yet-started containers.
#[async_trait]
pub trait BuildStrategy: Send + Sync {
    async fn build<R>(
        &self,
        config: &BuildConfig,
        runtime: &R,
        out: &Output,
    ) -> Result<PreparedDeployment, BuildError>
    where
        R: ContainerRuntime + ?Sized;
}

/// Images, names, and paths shared by every strategy.
#[derive(Debug, Clone)]
pub struct BuilderSettings {
    pub compose_image: String,
    pub buildpack_image: String,
    pub build_stage_name: String,
    /// Engine socket as bind-mounted into compose containers.
    pub runtime_socket: String,
    pub host_paths: HostPaths,
}

impl BuilderSettings {
    pub fn from_config(config: &DaemonConfig) -> Self {
        Self {
            compose_image: config.compose_image.clone(),
            buildpack_image: config.buildpack_image.clone(),
            build_stage_name: config.build_stage_name.clone(),
            runtime_socket: config.docker_socket.clone(),
            host_paths: config.host_paths.clone(),
        }
    }

    /// Tag of the image a Dockerfile or buildpack build produces.
    pub fn image_name(&self, project: &ProjectName) -> String {
        format!("keel-build/{project}")
    }
}

/// Dispatches a build to the strategy matching its build type.
#[derive(Debug, Clone)]
pub struct Builder {
    settings: BuilderSettings,
}

impl Builder {
    pub fn new(settings: BuilderSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new(BuilderSettings::from_config(config))
    }

    pub fn settings(&self) -> &BuilderSettings {
        &self.settings
    }

    pub fn build_stage_name(&self) -> &str {
        &self.settings.build_stage_name
    }

    /// Repositories of the build tool images, which survive a full prune.
    pub fn tool_images(&self) -> Vec<&str> {
        [&self.settings.compose_image, &self.settings.buildpack_image]
            .into_iter()
            .map(|image| repository_of(image))
            .collect()
    }

    pub async fn build<R>(
        &self,
        build_type: &BuildType,
        config: &BuildConfig,
        runtime: &R,
        out: &Output,
    ) -> Result<PreparedDeployment, BuildError>
    where
        R: ContainerRuntime + ?Sized,
    {
        out.progress(format!(
            "Setting up {} deployment for project {}...",
            build_type, config.project
        ));

        match build_type {
            BuildType::Compose => ComposeBuild::new(&self.settings).build(config, runtime, out).await,
            BuildType::Dockerfile => {
                DockerfileBuild::new(&self.settings)
                    .build(config, runtime, out)
                    .await
            }
            BuildType::Buildpack => {
                BuildpackBuild::new(&self.settings)
                    .build(config, runtime, out)
                    .await
            }
            BuildType::Unknown(tag) => {
                out.warning(format!(
                    "Unknown build type '{tag}', defaulting to docker-compose"
                ));
                ComposeBuild::new(&self.settings).build(config, runtime, out).await
            }
        }
    }
}

/// `docker/compose:1.29.2` -> `docker/compose`
fn repository_of(image: &str) -> &str {
    match image.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => repo,
        _ => image,
    }
}

/// Pull `image` unless it is already present.
pub(crate) async fn ensure_image<R>(runtime: &R, image: &str, out: &Output) -> Result<(), BuildError>
where
    R: ContainerRuntime + ?Sized,
{
    match runtime.inspect_image(image).await {
        Ok(_) => Ok(()),
        Err(ImageError::NotFound(_)) => {
            out.progress(format!("Pulling {image}..."));
            runtime.pull_image(image).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Create a container, treating any runtime warning as fatal.
pub(crate) async fn create_checked<R>(
    runtime: &R,
    config: &ContainerConfig,
    out: &Output,
) -> Result<ContainerId, BuildError>
where
    R: ContainerRuntime + ?Sized,
{
    let created = runtime.create_container(config).await?;
    if created.warnings.is_empty() {
        return Ok(created.id);
    }

    out.progress(format!("Warnings encountered creating {}.", config.name));
    if let Err(e) = runtime.remove_container(&created.id, true).await {
        tracing::warn!(container = %config.name, "failed to remove rejected container: {e}");
    }
    Err(BuildError::Warnings(created.warnings.join("\n")))
}

/// Remove a finished build-stage container. Failures are only logged.
pub(crate) async fn discard_build_stage<R>(runtime: &R, id: &ContainerId, name: &str)
where
    R: ContainerRuntime + ?Sized,
{
    if let Err(e) = runtime.remove_container(id, true).await {
        tracing::warn!(container = %name, "failed to remove build stage container: {e}");
    }
}

/// Start a build-stage container, stream its output, and wait for it to exit cleanly.
pub(crate) async fn run_build_stage<R>(
    runtime: &R,
    id: &ContainerId,
    name: &str,
    out: &Output,
) -> Result<(), BuildError>
where
    R: ContainerRuntime + ?Sized,
{
    out.progress("Building project...");
    runtime.start_container(id).await?;

    let logs = runtime
        .container_logs(id, &LogOptions::follow_output())
        .await?;
    let pump = LogPump::spawn(logs, out.clone());
    let status = runtime.wait_container(id).await;
    pump.finish().await;

    let code = status?;
    if code != 0 {
        return Err(BuildError::NonZeroExit {
            name: name.to_string(),
            code,
        });
    }
    out.progress(format!("Build exited with status {code}"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive_and_accepts_aliases() {
        assert_eq!(BuildType::parse("Docker-Compose"), BuildType::Compose);
        assert_eq!(BuildType::parse("DOCKERFILE"), BuildType::Dockerfile);
        assert_eq!(BuildType::parse("herokuish"), BuildType::Buildpack);
    }

    #[test]
    fn unknown_tags_are_kept_verbatim() {
        assert_eq!(
            BuildType::parse("nixpacks"),
            BuildType::Unknown("nixpacks".to_string())
        );
    }

    #[test]
    fn build_file_defaults_follow_build_type() {
        assert_eq!(BuildType::Compose.resolve_build_file(""), "docker-compose.yml");
        assert_eq!(BuildType::Dockerfile.resolve_build_file(""), "Dockerfile");
        assert_eq!(
            BuildType::Unknown("x".into()).resolve_build_file(""),
            "docker-compose.yml"
        );
        assert_eq!(
            BuildType::Dockerfile.resolve_build_file("deploy/Dockerfile.prod"),
            "deploy/Dockerfile.prod"
        );
    }

    #[test]
    fn serde_uses_the_tag_string() {
        let parsed: BuildType = serde_json::from_str("\"dockerfile\"").unwrap();
        assert_eq!(parsed, BuildType::Dockerfile);
        assert_eq!(
            serde_json::to_string(&BuildType::Compose).unwrap(),
            "\"docker-compose\""
        );
    }

    #[test]
    fn tool_images_drop_tags() {
        let builder = Builder::new(BuilderSettings {
            compose_image: "docker/compose:1.29.2".into(),
            buildpack_image: "gliderlabs/herokuish:v0.5.0".into(),
            build_stage_name: "build".into(),
            runtime_socket: "/var/run/docker.sock".into(),
            host_paths: HostPaths::identity(),
        });
        assert_eq!(
            builder.tool_images(),
            vec!["docker/compose", "gliderlabs/herokuish"]
        );
    }

    #[test]
    fn repository_keeps_registry_port() {
        assert_eq!(repository_of("localhost:5000/compose"), "localhost:5000/compose");
    }
}
