// ABOUTME: Dockerfile build strategy.
// ABOUTME: Builds an image from the checkout and prepares one container publishing its exposed ports.

use super::{
    BuildConfig, BuildError, BuildStrategy, BuildType, BuilderSettings, PreparedContainer,
    PreparedDeployment, build_context, create_checked,
};
use crate::output::Output;
use crate::runtime::{ContainerConfig, ContainerRuntime, ImageBuildRequest, PortMapping};
use async_trait::async_trait;
use futures::StreamExt;

pub struct DockerfileBuild<'a> {
    settings: &'a BuilderSettings,
}

impl<'a> DockerfileBuild<'a> {
    pub fn new(settings: &'a BuilderSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl BuildStrategy for DockerfileBuild<'_> {
    async fn build<R>(
        &self,
        config: &BuildConfig,
        runtime: &R,
        out: &Output,
    ) -> Result<PreparedDeployment, BuildError>
    where
        R: ContainerRuntime + ?Sized,
    {
        out.progress("Building Dockerfile project...");

        let directory = config.build_directory.clone();
        let context = tokio::task::spawn_blocking(move || build_context(&directory))
            .await?
            .map_err(BuildError::Context)?;

        let tag = self.settings.image_name(&config.project);
        let mut stream = runtime
            .build_image(ImageBuildRequest {
                context,
                dockerfile: config.build_file.clone(),
                tag: tag.clone(),
            })
            .await?;

        // Stream errors are reported but not trusted; the image inspect below decides.
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(text) => out.raw(text.as_bytes()),
                Err(e) => out.warning(e.to_string()),
            }
        }

        let image = runtime
            .inspect_image(&tag)
            .await
            .map_err(|e| BuildError::ImageMissing {
                image: tag.clone(),
                reason: e.to_string(),
            })?;
        out.progress(format!("Built image {} ({})", tag, image.id.short()));

        let container = ContainerConfig {
            name: config.project.to_string(),
            image: tag,
            env: config.env.clone(),
            ports: image
                .exposed_ports
                .iter()
                .filter_map(|exposed| PortMapping::from_exposed(exposed))
                .collect(),
            auto_remove: true,
            ..Default::default()
        };
        let id = create_checked(runtime, &container, out).await?;

        Ok(PreparedDeployment::new(
            BuildType::Dockerfile,
            vec![PreparedContainer {
                id,
                name: container.name,
            }],
        ))
    }
}
