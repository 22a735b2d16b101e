// ABOUTME: In-memory container runtime implementing every runtime trait.
// ABOUTME: Records each call so tests can assert on ordering and container state.

use async_trait::async_trait;
use futures::stream;
use keel::runtime::{
    BuildStream, ContainerConfig, ContainerError, ContainerFilters, ContainerOps,
    ContainerSummary, CreatedContainer, ImageBuildRequest, ImageDetails, ImageError, ImageOps,
    ImageSummary, LogError, LogLine, LogLineStream, LogOps, LogOptions, LogStream, PruneError,
    PruneOps, PruneReport,
};
use keel::types::{ContainerId, ImageId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DAEMON_NAME: &str = "keel-daemon";

#[derive(Debug, Clone)]
struct FakeContainer {
    name: String,
    image: String,
    running: bool,
    auto_remove: bool,
    command: Vec<String>,
}

#[derive(Debug)]
struct State {
    next_id: u64,
    containers: BTreeMap<String, FakeContainer>,
    images: BTreeMap<String, Vec<String>>,
    created: Vec<ContainerConfig>,
    events: Vec<String>,
    exit_code: i64,
    create_warnings: Vec<String>,
    build_produces_image: bool,
    wait_delay: Duration,
    exit_on_start: bool,
}

/// Container runtime that lives entirely in memory.
///
/// Starts with the daemon's own container running. Starting the compose
/// coordinator brings up a `<project>_web_1` container, as `compose up` would.
pub struct FakeRuntime {
    state: Mutex<State>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        let runtime = Self {
            state: Mutex::new(State {
                next_id: 0,
                containers: BTreeMap::new(),
                images: BTreeMap::new(),
                created: Vec::new(),
                events: Vec::new(),
                exit_code: 0,
                create_warnings: Vec::new(),
                build_produces_image: true,
                wait_delay: Duration::from_millis(20),
                exit_on_start: false,
            }),
        };
        runtime.insert_container(DAEMON_NAME, "keel:latest", true, false, Vec::new());
        runtime
    }

    /// Exit code every waited-on container reports.
    pub fn with_exit_code(self, code: i64) -> Self {
        self.set_exit_code(code);
        self
    }

    pub fn set_exit_code(&self, code: i64) {
        self.state.lock().exit_code = code;
    }

    pub fn with_wait_delay(self, delay: Duration) -> Self {
        self.state.lock().wait_delay = delay;
        self
    }

    pub fn with_create_warnings(self, warnings: &[&str]) -> Self {
        self.state.lock().create_warnings = warnings.iter().map(|w| w.to_string()).collect();
        self
    }

    /// Containers other than the compose coordinator exit the moment they start,
    /// before anyone waits on them. Auto-remove containers disappear with them.
    pub fn with_fast_exit(self) -> Self {
        self.state.lock().exit_on_start = true;
        self
    }

    /// Make image builds "succeed" without tagging anything.
    pub fn without_build_output(self) -> Self {
        self.state.lock().build_produces_image = false;
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }

    pub fn running_names(&self) -> Vec<String> {
        self.state
            .lock()
            .containers
            .values()
            .filter(|c| c.running)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Running containers other than the daemon.
    pub fn running_project_names(&self) -> Vec<String> {
        self.running_names()
            .into_iter()
            .filter(|name| name != DAEMON_NAME)
            .collect()
    }

    /// Most recent configuration a container with `name` was created with.
    pub fn created_config(&self, name: &str) -> Option<ContainerConfig> {
        self.state
            .lock()
            .created
            .iter()
            .rev()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn has_image(&self, reference: &str) -> bool {
        self.state.lock().images.contains_key(reference)
    }

    fn insert_container(
        &self,
        name: &str,
        image: &str,
        running: bool,
        auto_remove: bool,
        command: Vec<String>,
    ) -> String {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("{:064x}", state.next_id);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                name: name.to_string(),
                image: image.to_string(),
                running,
                auto_remove,
                command,
            },
        );
        id
    }

    fn record(&self, event: String) {
        self.state.lock().events.push(event);
    }

    fn lookup(&self, id: &ContainerId) -> Result<FakeContainer, ContainerError> {
        self.state
            .lock()
            .containers
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }

    /// Mark a container stopped, removing it if it was auto-remove.
    fn exit(&self, id: &ContainerId) {
        let mut state = self.state.lock();
        let remove = match state.containers.get_mut(id.as_str()) {
            Some(container) => {
                container.running = false;
                container.auto_remove
            }
            None => false,
        };
        if remove {
            state.containers.remove(id.as_str());
        }
    }

    fn compose_up(&self, command: &[String]) {
        let project = command
            .iter()
            .position(|arg| arg == "-p")
            .and_then(|i| command.get(i + 1))
            .cloned()
            .unwrap_or_else(|| "project".to_string());
        let name = format!("{project}_web_1");

        let existing = self
            .state
            .lock()
            .containers
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(id, _)| id.clone());
        match existing {
            Some(id) => {
                if let Some(c) = self.state.lock().containers.get_mut(&id) {
                    c.running = true;
                }
            }
            None => {
                self.insert_container(&name, "web:latest", true, false, Vec::new());
            }
        }
        self.record(format!("compose-up:{name}"));
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<CreatedContainer, ContainerError> {
        {
            let state = self.state.lock();
            if state.containers.values().any(|c| c.name == config.name) {
                return Err(ContainerError::AlreadyExists(config.name.clone()));
            }
        }
        let id = self.insert_container(
            &config.name,
            &config.image,
            false,
            config.auto_remove,
            config.command.clone().unwrap_or_default(),
        );
        let warnings = {
            let mut state = self.state.lock();
            state.created.push(config.clone());
            state.events.push(format!("create:{}", config.name));
            state.create_warnings.clone()
        };
        Ok(CreatedContainer {
            id: ContainerId::new(id),
            warnings,
        })
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let container = self.lookup(id)?;
        if container.running {
            return Err(ContainerError::AlreadyRunning(container.name));
        }
        if let Some(c) = self.state.lock().containers.get_mut(id.as_str()) {
            c.running = true;
        }
        self.record(format!("start:{}", container.name));

        if container.name == "docker-compose" {
            self.compose_up(&container.command);
        } else if self.state.lock().exit_on_start {
            let code = self.state.lock().exit_code;
            self.record(format!("exit:{}:{code}", container.name));
            self.exit(id);
        }
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let container = self.lookup(id)?;
        if !container.running {
            return Err(ContainerError::NotRunning(container.name));
        }
        self.record(format!("stop:{}", container.name));
        self.exit(id);
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        let removed = self.state.lock().containers.remove(id.as_str());
        match removed {
            Some(container) => {
                self.record(format!("remove:{}", container.name));
                Ok(())
            }
            None => Err(ContainerError::NotFound(id.to_string())),
        }
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let state = self.state.lock();
        Ok(state
            .containers
            .iter()
            .filter(|(_, c)| filters.all || c.running)
            .map(|(id, c)| ContainerSummary {
                id: ContainerId::new(id.clone()),
                name: c.name.clone(),
                image: c.image.clone(),
                state: if c.running { "running" } else { "exited" }.to_string(),
                status: String::new(),
                labels: Default::default(),
            })
            .collect())
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        let container = self.lookup(id)?;
        let (delay, code) = {
            let state = self.state.lock();
            (state.wait_delay, state.exit_code)
        };
        tokio::time::sleep(delay).await;
        self.record(format!("exit:{}:{code}", container.name));
        self.exit(id);
        Ok(code)
    }

    async fn commit_container(
        &self,
        id: &ContainerId,
        reference: &str,
    ) -> Result<ImageId, ContainerError> {
        let container = self.lookup(id)?;
        self.record(format!("commit:{}:{reference}", container.name));
        self.state
            .lock()
            .images
            .insert(format!("{reference}:latest"), Vec::new());
        Ok(ImageId::new(format!("sha256:{reference}")))
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn pull_image(&self, reference: &str) -> Result<(), ImageError> {
        self.record(format!("pull:{reference}"));
        self.state
            .lock()
            .images
            .insert(reference.to_string(), Vec::new());
        Ok(())
    }

    async fn build_image(&self, request: ImageBuildRequest) -> Result<BuildStream, ImageError> {
        self.record(format!("build:{}", request.tag));
        let produces = self.state.lock().build_produces_image;
        if produces {
            self.state
                .lock()
                .images
                .insert(request.tag.clone(), vec!["8080/tcp".to_string()]);
        }
        let lines = vec![
            Ok(format!("Step 1/2 : FROM scratch ({} byte context)\n", request.context.len())),
            Ok("Step 2/2 : EXPOSE 8080\n".to_string()),
        ];
        Ok(Box::pin(stream::iter(lines)))
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageDetails, ImageError> {
        let state = self.state.lock();
        let ports = state
            .images
            .get(reference)
            .ok_or_else(|| ImageError::NotFound(reference.to_string()))?;
        Ok(ImageDetails {
            id: ImageId::new(format!("sha256:{reference}")),
            tags: vec![reference.to_string()],
            exposed_ports: ports.clone(),
        })
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, ImageError> {
        Ok(self
            .state
            .lock()
            .images
            .keys()
            .map(|tag| ImageSummary {
                id: ImageId::new(format!("sha256:{tag}")),
                tags: vec![tag.clone()],
            })
            .collect())
    }

    async fn remove_image(&self, reference: &str, _force: bool) -> Result<(), ImageError> {
        let tag = reference.trim_start_matches("sha256:").to_string();
        self.record(format!("rmi:{tag}"));
        match self.state.lock().images.remove(&tag) {
            Some(_) => Ok(()),
            None => Err(ImageError::NotFound(reference.to_string())),
        }
    }
}

#[async_trait]
impl LogOps for FakeRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        _opts: &LogOptions,
    ) -> Result<LogLineStream, LogError> {
        let container = self
            .lookup(id)
            .map_err(|_| LogError::ContainerNotFound(id.to_string()))?;
        let line = LogLine {
            content: format!("{} output\n", container.name),
            stream: LogStream::Stdout,
        };
        Ok(Box::pin(stream::iter(vec![Ok(line)])))
    }
}

#[async_trait]
impl PruneOps for FakeRuntime {
    async fn prune_containers(&self) -> Result<PruneReport, PruneError> {
        let mut state = self.state.lock();
        let stopped: Vec<String> = state
            .containers
            .iter()
            .filter(|(_, c)| !c.running)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stopped {
            state.containers.remove(id);
        }
        state.events.push("prune:containers".to_string());
        Ok(PruneReport {
            deleted: stopped,
            space_reclaimed: 0,
        })
    }

    async fn prune_images(&self) -> Result<PruneReport, PruneError> {
        self.record("prune:images".to_string());
        Ok(PruneReport::default())
    }

    async fn prune_volumes(&self) -> Result<PruneReport, PruneError> {
        self.record("prune:volumes".to_string());
        Ok(PruneReport::default())
    }
}
