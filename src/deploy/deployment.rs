// ABOUTME: The Deployment entity: owns the checkout and data store and serializes every mutation.
// ABOUTME: Status reads go around the exclusive lock so they never wait on a running build.

use super::{DeployError, DeployOptions, DeploymentConfig, DeploymentState, DeploymentStatus};
use crate::build::{BuildConfig, BuildType, Builder};
use crate::config::DaemonConfig;
use crate::containers::{ContainerLifecycle, ContainerRole, LifecycleError};
use crate::data::{DeploymentDataManager, DeploymentRecord};
use crate::git::{
    self, GitCredential, GitError, GitRepository, HeadInfo, RepoOptions, UpdateOutcome,
};
use crate::notify::{Color, Notifiers, SlackNotifier};
use crate::output::Output;
use crate::runtime::{ContainerOps, ContainerRuntime, ImageOps, PruneOps};
use crate::types::ProjectName;
use chrono::Utc;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    state: DeploymentState,
    settings: DeploymentConfig,
    repo: Option<GitRepository>,
    credential: Option<GitCredential>,
    data: Option<Arc<DeploymentDataManager>>,
    notifiers: Notifiers,
}

/// A single project deployed from a git remote.
///
/// At most one of `initialize`, `resume`, `deploy`, `down`, `destroy` and
/// `prune` runs at a time; the others wait their turn.
pub struct Deployment {
    directory: PathBuf,
    database_path: PathBuf,
    key_path: PathBuf,
    lifecycle: ContainerLifecycle,
    builder: Builder,
    exclusive: tokio::sync::Mutex<()>,
    inner: RwLock<Inner>,
}

impl Deployment {
    pub fn new(config: &DaemonConfig) -> Self {
        Self::with_components(
            config,
            ContainerLifecycle::from_config(config),
            Builder::from_config(config),
        )
    }

    pub fn with_components(
        config: &DaemonConfig,
        lifecycle: ContainerLifecycle,
        builder: Builder,
    ) -> Self {
        Self {
            directory: config.project_directory.clone(),
            database_path: config.database_path(),
            key_path: config.key_path(),
            lifecycle,
            builder,
            exclusive: tokio::sync::Mutex::new(()),
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn state(&self) -> DeploymentState {
        self.inner.read().state
    }

    pub fn config(&self) -> DeploymentConfig {
        self.inner.read().settings.clone()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn branch(&self) -> String {
        self.inner.read().settings.branch_or_default().to_string()
    }

    /// Apply every non-empty field of `config`.
    ///
    /// Nothing is applied if the given project name is invalid. A new Slack
    /// URL adds a notifier; one already registered is not added twice.
    pub fn set_config(&self, config: &DeploymentConfig) -> Result<(), DeployError> {
        if !config.project_name.is_empty() {
            ProjectName::new(&config.project_name)?;
        }
        let url = config.slack_notification_url.trim();
        let slack = if url.is_empty() || self.inner.read().notifiers.contains(url) {
            None
        } else {
            Some(SlackNotifier::new(url)?)
        };

        let mut inner = self.inner.write();
        inner.settings.merge(config);
        if let Some(slack) = slack {
            inner.notifiers.add(Arc::new(slack));
            tracing::debug!(count = inner.notifiers.len(), "registered Slack notifier");
        }
        Ok(())
    }

    /// Clone the remote and open the data store.
    ///
    /// Only valid on an empty deployment. Anything left in the project
    /// directory is deleted first.
    pub async fn initialize(&self, config: DeploymentConfig, out: &Output) -> Result<(), DeployError> {
        let _guard = self.exclusive.lock().await;

        if self.state().is_initialized() {
            return Err(DeployError::AlreadyInitialized);
        }
        if config.remote_url.trim().is_empty() {
            return Err(DeployError::MissingRemote);
        }
        let mut settings = self.config();
        settings.merge(&config);
        ProjectName::new(&settings.project_name)?;
        self.set_config(&config)?;

        let credential = GitCredential::open(&settings.pem_file_path)?;

        git::remove_contents(&self.directory)?;
        std::fs::create_dir_all(&self.directory)?;

        let opts = self.repo_options(&settings, credential.clone());
        let repo = git::initialize_repository(&settings.remote_url, &opts, out).await?;
        let data = DeploymentDataManager::open(&self.database_path, &self.key_path)?;

        let mut inner = self.inner.write();
        inner.repo = Some(repo);
        inner.credential = Some(credential);
        inner.data = Some(Arc::new(data));
        inner.state = DeploymentState::Initialized;
        tracing::info!(project = %inner.settings.project_name, "deployment initialized");
        Ok(())
    }

    /// Attach to a checkout left by an earlier process without cloning.
    ///
    /// Returns `false` when there is no checkout to attach to.
    pub async fn resume(&self, config: DeploymentConfig) -> Result<bool, DeployError> {
        let _guard = self.exclusive.lock().await;

        if self.state().is_initialized() {
            return Err(DeployError::AlreadyInitialized);
        }
        let repo = match GitRepository::open(&self.directory) {
            Ok(repo) => repo,
            Err(e) => {
                tracing::debug!(directory = %self.directory.display(), "no checkout to resume: {e}");
                return Ok(false);
            }
        };
        self.set_config(&config)?;

        let credential = match GitCredential::open(&config.pem_file_path) {
            Ok(credential) => Some(credential),
            Err(e) => {
                tracing::debug!("deploy key unavailable until next update: {e}");
                None
            }
        };
        let data = DeploymentDataManager::open(&self.database_path, &self.key_path)?;

        let mut inner = self.inner.write();
        inner.repo = Some(repo);
        inner.credential = credential;
        inner.data = Some(Arc::new(data));
        inner.state = DeploymentState::Initialized;
        tracing::info!(project = %inner.settings.project_name, "deployment resumed");
        Ok(true)
    }

    /// Update the checkout, rebuild, and replace the running containers.
    ///
    /// Activation happens only after every earlier step succeeded; a failure
    /// anywhere leaves the new containers unstarted. Once the old containers
    /// are stopped the state is `Down` until activation succeeds. A build in
    /// progress cannot be cancelled; dropping the future abandons it mid-step.
    pub async fn deploy<R>(
        &self,
        runtime: &R,
        out: &Output,
        opts: DeployOptions,
    ) -> Result<(), DeployError>
    where
        R: ContainerRuntime + ?Sized,
    {
        let _guard = self.exclusive.lock().await;

        let (settings, repo, credential, data, notifiers) = {
            let inner = self.inner.read();
            let repo = inner.repo.clone().ok_or(DeployError::NotInitialized)?;
            (
                inner.settings.clone(),
                repo,
                inner.credential.clone(),
                inner.data.clone(),
                inner.notifiers.clone(),
            )
        };
        let project = ProjectName::new(&settings.project_name)?;

        if !opts.skip_update {
            let credential = match credential {
                Some(credential) => credential,
                None => {
                    let credential = GitCredential::open(&settings.pem_file_path)?;
                    self.inner.write().credential = Some(credential.clone());
                    credential
                }
            };
            let opts = self.repo_options(&settings, credential);
            let outcome = git::update_repository(&repo, &opts, out).await?;
            if outcome == UpdateOutcome::ForcePulled {
                tracing::warn!(project = %settings.project_name, "checkout was re-cloned");
            }
        }

        if let Err(e) = self.lifecycle.prune(runtime, out).await {
            out.warning(format!("Prune before deploy incomplete: {e}"));
        }

        {
            let mut inner = self.inner.write();
            if inner.state == DeploymentState::Deployed {
                inner.state = DeploymentState::Down;
            }
        }
        self.lifecycle.stop_active_containers(runtime, out).await?;

        let build_type = BuildType::parse(&settings.build_type);
        let config =
            self.build_config(project, &settings, &build_type, &repo, data.as_deref(), out);
        let prepared = match self.builder.build(&build_type, &config, runtime, out).await {
            Ok(prepared) => {
                notify(&notifiers, "Build completed", Color::Green, out).await;
                prepared
            }
            Err(e) => {
                notify(&notifiers, &format!("Build error: {e}"), Color::Red, out).await;
                return Err(e.into());
            }
        };

        let deployed_type = prepared.build_type().to_string();
        let containers: Vec<String> = prepared
            .containers()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        prepared.activate(runtime, out).await?;

        self.inner.write().state = DeploymentState::Deployed;
        tracing::info!(project = %config.project, build_type = %deployed_type, "project deployed");

        if let Some(data) = data {
            self.record_deployment(&data, &repo, &config.project, deployed_type, containers)
                .await;
        }
        Ok(())
    }

    /// Stop every project container.
    ///
    /// Returns [`DeployError::NoContainers`] when nothing was running.
    pub async fn down<R>(&self, runtime: &R, out: &Output) -> Result<(), DeployError>
    where
        R: ContainerOps + PruneOps + ?Sized,
    {
        let _guard = self.exclusive.lock().await;
        self.down_locked(runtime, out).await
    }

    async fn down_locked<R>(&self, runtime: &R, out: &Output) -> Result<(), DeployError>
    where
        R: ContainerOps + PruneOps + ?Sized,
    {
        match self.lifecycle.active_containers(runtime).await {
            Ok(_) => {}
            Err(LifecycleError::NoContainers) => {
                // Stopped containers may still need pruning.
                if let Err(e) = self.lifecycle.stop_active_containers(runtime, out).await {
                    tracing::warn!("cleanup after empty shutdown failed: {e}");
                }
                return Err(DeployError::NoContainers);
            }
            Err(e) => return Err(e.into()),
        }

        self.lifecycle.stop_active_containers(runtime, out).await?;
        if let Err(e) = self.lifecycle.prune(runtime, out).await {
            out.warning(format!("Prune after shutdown incomplete: {e}"));
        }

        let mut inner = self.inner.write();
        if inner.state.is_initialized() {
            inner.state = DeploymentState::Down;
        }
        Ok(())
    }

    /// Take the project down, then delete the checkout and all stored data.
    ///
    /// The deployment is empty afterwards and can be initialized again, even
    /// when the stored data could not be cleared.
    pub async fn destroy<R>(&self, runtime: &R, out: &Output) -> Result<(), DeployError>
    where
        R: ContainerOps + PruneOps + ?Sized,
    {
        let _guard = self.exclusive.lock().await;

        match self.down_locked(runtime, out).await {
            Ok(()) | Err(DeployError::NoContainers) => {}
            Err(e) => return Err(e),
        }

        let data = self.inner.write().data.take();
        if let Some(data) = data {
            if let Err(e) = data.destroy() {
                tracing::warn!("failed to clear deployment data: {e}");
                out.warning(format!("Unable to clear database records: {e}"));
            }
        }

        out.progress(format!(
            "Removing project directory {}...",
            self.directory.display()
        ));
        git::remove_contents(&self.directory)?;

        *self.inner.write() = Inner::default();
        tracing::info!("deployment destroyed");
        Ok(())
    }

    /// Branch, commit, and container summary. Never waits on a running operation.
    ///
    /// An uninitialized deployment reports an empty status.
    pub async fn status<R>(&self, runtime: &R) -> Result<DeploymentStatus, DeployError>
    where
        R: ContainerOps + ?Sized,
    {
        let (repo, build_type) = {
            let inner = self.inner.read();
            (inner.repo.clone(), inner.settings.build_type.clone())
        };
        let Some(repo) = repo else {
            return Ok(DeploymentStatus::default());
        };

        let head = read_head(repo).await?;
        let containers = match self.lifecycle.active_containers(runtime).await {
            Ok(containers) => containers,
            Err(LifecycleError::NoContainers) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(DeploymentStatus {
            branch: head.branch,
            commit_hash: head.commit_hash,
            commit_message: head.message,
            build_type,
            build_container_active: containers
                .iter()
                .any(|c| c.role == ContainerRole::BuildStage),
            containers: containers
                .into_iter()
                .filter(|c| c.role == ContainerRole::Project)
                .map(|c| c.name)
                .collect(),
        })
    }

    /// Check `remote_url` against the checkout's origin. Empty always matches.
    pub fn compare_remotes(&self, remote_url: &str) -> Result<(), DeployError> {
        let repo = self.inner.read().repo.clone();
        match repo {
            Some(repo) => Ok(repo.compare_remotes(remote_url)?),
            None => Ok(()),
        }
    }

    /// Remove every image except the build tools, then prune containers and volumes.
    pub async fn prune<R>(&self, runtime: &R, out: &Output) -> Result<(), DeployError>
    where
        R: ImageOps + PruneOps + ?Sized,
    {
        let _guard = self.exclusive.lock().await;
        let keep = self.builder.tool_images();
        self.lifecycle.prune_all(runtime, &keep, out).await?;
        Ok(())
    }

    /// Successful deployments of the current project, oldest first.
    pub fn history(&self) -> Result<Vec<DeploymentRecord>, DeployError> {
        let (data, project) = self.data_and_project()?;
        Ok(data.build_history(&project)?)
    }

    pub fn add_env_variable(&self, name: &str, value: &str, encrypt: bool) -> Result<(), DeployError> {
        let (data, _) = self.data_and_project()?;
        Ok(data.add_env_variable(name, value, encrypt)?)
    }

    pub fn remove_env_variables(&self, names: &[&str]) -> Result<(), DeployError> {
        let (data, _) = self.data_and_project()?;
        Ok(data.remove_env_variables(names)?)
    }

    pub fn env_variables(&self, decrypt: bool) -> Result<Vec<String>, DeployError> {
        let (data, _) = self.data_and_project()?;
        Ok(data.get_env_variables(decrypt)?)
    }

    fn data_and_project(&self) -> Result<(Arc<DeploymentDataManager>, String), DeployError> {
        let inner = self.inner.read();
        let data = inner.data.clone().ok_or(DeployError::NotInitialized)?;
        Ok((data, inner.settings.project_name.clone()))
    }

    fn repo_options(&self, settings: &DeploymentConfig, credential: GitCredential) -> RepoOptions {
        RepoOptions {
            directory: self.directory.clone(),
            branch: settings.branch_or_default().to_string(),
            credential,
        }
    }

    fn build_config(
        &self,
        project: ProjectName,
        settings: &DeploymentConfig,
        build_type: &BuildType,
        repo: &GitRepository,
        data: Option<&DeploymentDataManager>,
        out: &Output,
    ) -> BuildConfig {
        let env = match data.map(|d| d.get_env_variables(true)) {
            Some(Ok(env)) => env,
            Some(Err(e)) => {
                out.warning(format!("Failed to read environment variables: {e}"));
                Vec::new()
            }
            None => Vec::new(),
        };

        BuildConfig {
            project,
            build_file: build_type.resolve_build_file(&settings.build_file_path),
            build_directory: repo.directory().to_path_buf(),
            env,
        }
    }

    async fn record_deployment(
        &self,
        data: &DeploymentDataManager,
        repo: &GitRepository,
        project: &ProjectName,
        build_type: String,
        containers: Vec<String>,
    ) {
        let commit_hash = match read_head(repo.clone()).await {
            Ok(head) => head.commit_hash,
            Err(e) => {
                tracing::warn!("could not read HEAD for deployment history: {e}");
                String::new()
            }
        };
        let record = DeploymentRecord {
            commit_hash,
            build_type,
            containers,
            deployed_at: Utc::now(),
        };
        if let Err(e) = data.add_build_record(project.as_str(), &record) {
            tracing::warn!(project = %project, "failed to record deployment: {e}");
        }
    }
}

/// Delivery failures are reported to `out` and never fail the caller.
async fn notify(notifiers: &Notifiers, message: &str, color: Color, out: &Output) {
    for e in notifiers.notify(message, color).await {
        tracing::warn!("build notification failed: {e}");
        out.warning(e.to_string());
    }
}

async fn read_head(repo: GitRepository) -> Result<HeadInfo, GitError> {
    tokio::task::spawn_blocking(move || repo.head()).await?
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Deployment")
            .field("directory", &self.directory)
            .field("state", &inner.state)
            .field("project", &inner.settings.project_name)
            .finish_non_exhaustive()
    }
}
