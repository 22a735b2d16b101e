// ABOUTME: Per-invocation state shared by every command: config, deployment, output.
// ABOUTME: Reattaches to the checkout and settings left behind by a previous invocation.

use keel::config::DaemonConfig;
use keel::deploy::{Deployment, DeploymentConfig};
use keel::error::Result;
use keel::output::Output;
use keel::runtime::BollardRuntime;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "deployment.yaml";

pub struct Context {
    pub config: DaemonConfig,
    pub deployment: Deployment,
    pub output: Output,
}

impl Context {
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => DaemonConfig::load(path)?,
            None => DaemonConfig::from_env()?,
        };
        let deployment = Deployment::new(&config);

        if let Some(settings) = read_settings(&settings_path(&config))? {
            deployment.resume(settings).await?;
        }

        Ok(Self {
            config,
            deployment,
            output: Output::stdout(),
        })
    }

    pub fn connect(&self) -> Result<BollardRuntime> {
        Ok(BollardRuntime::connect(&self.config.docker_socket)?)
    }

    /// Persist the deployment's settings for later invocations.
    pub fn save_settings(&self) -> Result<()> {
        let path = settings_path(&self.config);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_yaml::to_string(&self.deployment.config())?)?;
        Ok(())
    }

    pub fn forget_settings(&self) -> Result<()> {
        match std::fs::remove_file(settings_path(&self.config)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn settings_path(config: &DaemonConfig) -> PathBuf {
    config.data_directory.join(SETTINGS_FILE)
}

fn read_settings(path: &Path) -> Result<Option<DeploymentConfig>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_yaml::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
