// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keeld")]
#[command(about = "Deploy a git repository to Docker containers on this host")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Daemon configuration file (defaults and KEEL_* variables when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up a project from a git remote and deploy it
    Up {
        /// Remote URL of the repository
        #[arg(short, long)]
        remote: String,

        /// Project name, used for container and image names
        #[arg(short, long)]
        project: String,

        /// Branch to deploy
        #[arg(short, long)]
        branch: Option<String>,

        /// compose, dockerfile, or buildpack
        #[arg(short = 't', long)]
        build_type: Option<String>,

        /// Build file relative to the repository root
        #[arg(short = 'f', long)]
        build_file: Option<String>,

        /// Private key with read access to the repository
        #[arg(long)]
        pem: PathBuf,

        /// Slack incoming-webhook URL notified after each build
        #[arg(long)]
        slack_url: Option<String>,
    },

    /// Pull the latest commit and redeploy
    Deploy {
        /// Build the current checkout without fetching
        #[arg(long)]
        skip_update: bool,
    },

    /// Stop the project's containers
    Down,

    /// Stop the project and delete its checkout and stored data
    Destroy,

    /// Show the deployed commit and running containers
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List previous successful deployments
    History,

    /// Remove unused images, containers, and volumes
    Prune,

    /// Manage environment variables injected into project containers
    Env {
        #[command(subcommand)]
        command: EnvCommand,
    },
}

#[derive(Subcommand)]
pub enum EnvCommand {
    /// Set a variable
    Set {
        name: String,
        value: String,

        /// Store the value sealed
        #[arg(short, long)]
        encrypt: bool,
    },

    /// Remove variables
    Rm {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List variables
    Ls {
        /// Show sealed values in plain text
        #[arg(short, long)]
        decrypt: bool,
    },
}
