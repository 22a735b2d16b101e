// ABOUTME: Daemon configuration: directories, build tool images, and runtime socket.
// ABOUTME: Loaded from YAML or assembled from defaults plus KEEL_* environment overrides.

mod host_paths;

pub use host_paths::HostPaths;

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PROJECT_DIR: &str = "KEEL_PROJECT_DIR";
pub const ENV_DATA_DIR: &str = "KEEL_DATA_DIR";
pub const ENV_DOCKER_SOCKET: &str = "KEEL_DOCKER_SOCKET";
pub const ENV_COMPOSE_IMAGE: &str = "KEEL_DOCKERCOMPOSE";
pub const ENV_BUILDPACK_IMAGE: &str = "KEEL_HEROKUISH";
pub const ENV_HOST_ROOT: &str = "KEEL_HOST_ROOT";

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Where the project checkout lives.
    #[serde(default = "default_project_directory")]
    pub project_directory: PathBuf,

    /// Holds the embedded database and its sealing key.
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,

    #[serde(default = "default_docker_socket")]
    pub docker_socket: String,

    #[serde(default = "default_compose_image")]
    pub compose_image: String,

    #[serde(default = "default_buildpack_image")]
    pub buildpack_image: String,

    /// Name of the container the daemon itself runs in.
    #[serde(default = "default_daemon_container_name")]
    pub daemon_container_name: String,

    /// Name given to throwaway build containers.
    #[serde(default = "default_build_stage_name")]
    pub build_stage_name: String,

    #[serde(default = "default_stop_timeout", with = "humantime_serde")]
    pub stop_timeout: Duration,

    #[serde(default)]
    pub host_paths: HostPaths,
}

fn default_project_directory() -> PathBuf {
    PathBuf::from("/app/host/keel/project")
}

fn default_data_directory() -> PathBuf {
    PathBuf::from("/app/host/keel/data")
}

fn default_docker_socket() -> String {
    "/var/run/docker.sock".to_string()
}

fn default_compose_image() -> String {
    "docker/compose:1.29.2".to_string()
}

fn default_buildpack_image() -> String {
    "gliderlabs/herokuish:v0.5.0".to_string()
}

fn default_daemon_container_name() -> String {
    "keel-daemon".to_string()
}

fn default_build_stage_name() -> String {
    "build".to_string()
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            project_directory: default_project_directory(),
            data_directory: default_data_directory(),
            docker_socket: default_docker_socket(),
            compose_image: default_compose_image(),
            buildpack_image: default_buildpack_image(),
            daemon_container_name: default_daemon_container_name(),
            build_stage_name: default_build_stage_name(),
            stop_timeout: default_stop_timeout(),
            host_paths: HostPaths::default(),
        }
    }
}

impl DaemonConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Defaults with any `KEEL_*` overrides from the environment applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overwrite fields whose environment variable is set and non-empty.
    pub fn apply_env(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(dir) = var(ENV_PROJECT_DIR) {
            self.project_directory = PathBuf::from(dir);
        }
        if let Some(dir) = var(ENV_DATA_DIR) {
            self.data_directory = PathBuf::from(dir);
        }
        if let Some(socket) = var(ENV_DOCKER_SOCKET) {
            self.docker_socket = socket;
        }
        if let Some(image) = var(ENV_COMPOSE_IMAGE) {
            self.compose_image = image;
        }
        if let Some(image) = var(ENV_BUILDPACK_IMAGE) {
            self.buildpack_image = image;
        }
        if let Some(root) = var(ENV_HOST_ROOT) {
            self.host_paths.host_prefix = PathBuf::from(root);
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.project_directory.is_absolute() {
            return Err(Error::InvalidConfig(format!(
                "project_directory must be absolute: {}",
                self.project_directory.display()
            )));
        }
        if !self.data_directory.is_absolute() {
            return Err(Error::InvalidConfig(format!(
                "data_directory must be absolute: {}",
                self.data_directory.display()
            )));
        }
        if self.build_stage_name.is_empty() || self.daemon_container_name.is_empty() {
            return Err(Error::InvalidConfig(
                "container names cannot be empty".to_string(),
            ));
        }
        if self.build_stage_name == self.daemon_container_name {
            return Err(Error::InvalidConfig(
                "build_stage_name and daemon_container_name must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Embedded database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_directory.join("project.db")
    }

    /// Sealing key file for encrypted environment variables.
    pub fn key_path(&self) -> PathBuf {
        self.data_directory.join("key")
    }
}
