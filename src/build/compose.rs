// ABOUTME: docker-compose build strategy.
// ABOUTME: Builds in a throwaway compose container, then prepares a coordinator running `up`.

use super::{
    BuildConfig, BuildError, BuildStrategy, BuildType, BuilderSettings, PreparedContainer,
    PreparedDeployment, create_checked, discard_build_stage, ensure_image, run_build_stage,
};
use crate::containers::COMPOSE_COORDINATOR_NAME;
use crate::output::Output;
use crate::runtime::{ContainerConfig, ContainerRuntime, VolumeMount};
use async_trait::async_trait;

/// Where the project is mounted inside compose containers.
const BUILD_MOUNT: &str = "/build";

pub struct ComposeBuild<'a> {
    settings: &'a BuilderSettings,
}

impl<'a> ComposeBuild<'a> {
    pub fn new(settings: &'a BuilderSettings) -> Self {
        Self { settings }
    }

    fn compose_command(config: &BuildConfig, action: &str) -> Vec<String> {
        vec![
            "-p".to_string(),
            config.project.to_string(),
            "-f".to_string(),
            config.build_file.clone(),
            action.to_string(),
        ]
    }

    fn socket_mount(&self) -> VolumeMount {
        VolumeMount::bind(&self.settings.runtime_socket, &self.settings.runtime_socket)
    }
}

#[async_trait]
impl BuildStrategy for ComposeBuild<'_> {
    async fn build<R>(
        &self,
        config: &BuildConfig,
        runtime: &R,
        out: &Output,
    ) -> Result<PreparedDeployment, BuildError>
    where
        R: ContainerRuntime + ?Sized,
    {
        out.progress("Setting up docker-compose...");
        ensure_image(runtime, &self.settings.compose_image, out).await?;

        let host_dir = self.settings.host_paths.to_host(&config.build_directory);

        // Removed explicitly once waited on; an auto-removed stage can vanish before the wait.
        let stage = ContainerConfig {
            name: self.settings.build_stage_name.clone(),
            image: self.settings.compose_image.clone(),
            env: config.env.clone(),
            command: Some(Self::compose_command(config, "build")),
            working_dir: Some(BUILD_MOUNT.to_string()),
            volumes: vec![
                VolumeMount::bind(host_dir.to_string_lossy(), BUILD_MOUNT),
                self.socket_mount(),
            ],
            ..Default::default()
        };
        let stage_id = create_checked(runtime, &stage, out).await?;
        let built = run_build_stage(runtime, &stage_id, &stage.name, out).await;
        discard_build_stage(runtime, &stage_id, &stage.name).await;
        built?;

        out.progress("Preparing to start project...");
        let compose_file = host_dir.join(&config.build_file);
        let coordinator = ContainerConfig {
            name: COMPOSE_COORDINATOR_NAME.to_string(),
            image: self.settings.compose_image.clone(),
            env: config.env.clone(),
            command: Some(Self::compose_command(config, "up")),
            working_dir: Some(BUILD_MOUNT.to_string()),
            volumes: vec![
                VolumeMount::bind(
                    compose_file.to_string_lossy(),
                    format!("{BUILD_MOUNT}/{}", config.build_file),
                ),
                self.socket_mount(),
            ],
            auto_remove: true,
            ..Default::default()
        };
        let id = create_checked(runtime, &coordinator, out).await?;

        Ok(PreparedDeployment::new(
            BuildType::Compose,
            vec![PreparedContainer {
                id,
                name: coordinator.name,
            }],
        ))
    }
}
