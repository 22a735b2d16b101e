// ABOUTME: Deployment orchestration: the lock-guarded state machine tying git, builds, and containers together.
// ABOUTME: Exports the Deployment entity, its configuration and status types, and DeployError.

mod config;
mod deployment;
mod error;
mod status;

pub use config::{DeployOptions, DeploymentConfig, DeploymentState};
pub use deployment::Deployment;
pub use error::{DeployError, DeployErrorKind};
pub use status::DeploymentStatus;
