// ABOUTME: Commands that change what is deployed: up, deploy, down, destroy, prune.
// ABOUTME: Deploy and destroy refuse to run before `up` has set the project up.

use super::Context;
use keel::deploy::{DeployError, DeployOptions, DeploymentConfig};
use keel::error::{Error, Result};

/// Set up the project if needed, then deploy it.
pub async fn up(ctx: &Context, settings: DeploymentConfig) -> Result<()> {
    let runtime = ctx.connect()?;

    if ctx.deployment.state().is_initialized() {
        ctx.deployment.compare_remotes(&settings.remote_url)?;
        ctx.deployment.set_config(&settings)?;
    } else {
        ctx.deployment.initialize(settings, &ctx.output).await?;
    }
    ctx.save_settings()?;

    ctx.deployment
        .deploy(&runtime, &ctx.output, DeployOptions::default())
        .await?;
    ctx.output.progress("Project deployed.");
    Ok(())
}

pub async fn deploy(ctx: &Context, opts: DeployOptions) -> Result<()> {
    require_setup(ctx)?;
    let runtime = ctx.connect()?;
    ctx.deployment.deploy(&runtime, &ctx.output, opts).await?;
    ctx.output.progress("Project deployed.");
    Ok(())
}

pub async fn down(ctx: &Context) -> Result<()> {
    let runtime = ctx.connect()?;
    match ctx.deployment.down(&runtime, &ctx.output).await {
        Ok(()) => {
            ctx.output.progress("Project containers stopped.");
            Ok(())
        }
        Err(DeployError::NoContainers) => {
            ctx.output.progress(DeployError::NoContainers.to_string());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn destroy(ctx: &Context) -> Result<()> {
    require_setup(ctx)?;
    let runtime = ctx.connect()?;
    ctx.deployment.destroy(&runtime, &ctx.output).await?;
    ctx.forget_settings()?;
    ctx.output.progress("Project removed.");
    Ok(())
}

pub async fn prune(ctx: &Context) -> Result<()> {
    let runtime = ctx.connect()?;
    ctx.deployment.prune(&runtime, &ctx.output).await?;
    Ok(())
}

fn require_setup(ctx: &Context) -> Result<()> {
    if ctx.deployment.state().is_initialized() {
        Ok(())
    } else {
        Err(Error::NotSetUp)
    }
}
