// ABOUTME: Entry point for the keeld CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, EnvCommand};
use keel::deploy::{DeployOptions, DeploymentConfig};
use keel::error::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = commands::Context::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Up {
            remote,
            project,
            branch,
            build_type,
            build_file,
            pem,
            slack_url,
        } => {
            let settings = DeploymentConfig {
                project_name: project,
                build_type: build_type.unwrap_or_default(),
                build_file_path: build_file.unwrap_or_default(),
                remote_url: remote,
                branch: branch.unwrap_or_default(),
                pem_file_path: pem.to_string_lossy().into_owned(),
                slack_notification_url: slack_url.unwrap_or_default(),
            };
            commands::up(&ctx, settings).await
        }
        Commands::Deploy { skip_update } => {
            commands::deploy(&ctx, DeployOptions { skip_update }).await
        }
        Commands::Down => commands::down(&ctx).await,
        Commands::Destroy => commands::destroy(&ctx).await,
        Commands::Status { json } => commands::status(&ctx, json).await,
        Commands::History => commands::history(&ctx),
        Commands::Prune => commands::prune(&ctx).await,
        Commands::Env { command } => match command {
            EnvCommand::Set {
                name,
                value,
                encrypt,
            } => commands::env_set(&ctx, &name, &value, encrypt),
            EnvCommand::Rm { names } => commands::env_rm(&ctx, &names),
            EnvCommand::Ls { decrypt } => commands::env_ls(&ctx, decrypt),
        },
    }
}
