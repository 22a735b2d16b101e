// ABOUTME: Per-build inputs handed to a build strategy.
// ABOUTME: Constructed fresh for every deploy and never mutated afterwards.

use crate::types::ProjectName;
use std::path::PathBuf;

/// Everything a strategy needs to turn a checkout into containers.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub project: ProjectName,
    /// Build file relative to `build_directory`, already defaulted for the build type.
    pub build_file: String,
    /// Checkout root as the daemon sees it.
    pub build_directory: PathBuf,
    /// `NAME=VALUE` pairs injected into every container the build creates.
    pub env: Vec<String>,
}
