// ABOUTME: Buildpack build strategy.
// ABOUTME: Runs the herokuish builder over the checkout and commits the result as the project image.

use super::{
    BuildConfig, BuildError, BuildStrategy, BuildType, BuilderSettings, PreparedContainer,
    PreparedDeployment, create_checked, discard_build_stage, ensure_image, run_build_stage,
};
use crate::output::Output;
use crate::runtime::{ContainerConfig, ContainerRuntime, VolumeMount};
use async_trait::async_trait;

/// Directory herokuish builds from.
const APP_MOUNT: &str = "/tmp/app";

pub struct BuildpackBuild<'a> {
    settings: &'a BuilderSettings,
}

impl<'a> BuildpackBuild<'a> {
    pub fn new(settings: &'a BuilderSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl BuildStrategy for BuildpackBuild<'_> {
    async fn build<R>(
        &self,
        config: &BuildConfig,
        runtime: &R,
        out: &Output,
    ) -> Result<PreparedDeployment, BuildError>
    where
        R: ContainerRuntime + ?Sized,
    {
        out.progress("Setting up herokuish...");
        ensure_image(runtime, &self.settings.buildpack_image, out).await?;

        let host_dir = self.settings.host_paths.to_host(&config.build_directory);

        // Not auto-removed: the stopped container is committed below.
        let stage = ContainerConfig {
            name: self.settings.build_stage_name.clone(),
            image: self.settings.buildpack_image.clone(),
            env: config.env.clone(),
            command: Some(vec!["/build".to_string()]),
            volumes: vec![VolumeMount::bind(host_dir.to_string_lossy(), APP_MOUNT)],
            ..Default::default()
        };
        let stage_id = create_checked(runtime, &stage, out).await?;

        if let Err(e) = run_build_stage(runtime, &stage_id, &stage.name, out).await {
            discard_build_stage(runtime, &stage_id, &stage.name).await;
            return Err(e);
        }

        out.progress("Saving build...");
        let image = self.settings.image_name(&config.project);
        let committed = runtime.commit_container(&stage_id, &image).await;
        discard_build_stage(runtime, &stage_id, &stage.name).await;
        let image_id = committed?;
        tracing::debug!(image = %image, id = %image_id.short(), "build committed");

        let container = ContainerConfig {
            name: config.project.to_string(),
            image: format!("{image}:latest"),
            env: config.env.clone(),
            command: Some(vec!["/start".to_string(), "web".to_string()]),
            auto_remove: true,
            ..Default::default()
        };
        let id = create_checked(runtime, &container, out).await?;

        Ok(PreparedDeployment::new(
            BuildType::Buildpack,
            vec![PreparedContainer {
                id,
                name: container.name,
            }],
        ))
    }
}
