// ABOUTME: Translation between paths inside the daemon container and on the host.
// ABOUTME: Bind-mount sources are resolved by the engine on the host, not in the daemon.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The daemon sees the host filesystem under `internal_prefix`; the engine
/// needs the same location spelled as `host_prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostPaths {
    #[serde(default = "default_internal_prefix")]
    pub internal_prefix: PathBuf,

    #[serde(default = "default_host_prefix")]
    pub host_prefix: PathBuf,
}

fn default_internal_prefix() -> PathBuf {
    PathBuf::from("/app/host")
}

fn default_host_prefix() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            internal_prefix: default_internal_prefix(),
            host_prefix: default_host_prefix(),
        }
    }
}

impl HostPaths {
    pub fn new(internal_prefix: impl Into<PathBuf>, host_prefix: impl Into<PathBuf>) -> Self {
        Self {
            internal_prefix: internal_prefix.into(),
            host_prefix: host_prefix.into(),
        }
    }

    /// Identity mapping, for a daemon running directly on the host.
    pub fn identity() -> Self {
        Self::new("/", "/")
    }

    /// Host spelling of `path`. Paths outside the internal prefix pass through unchanged.
    pub fn to_host(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.internal_prefix) {
            Ok(rest) => self.host_prefix.join(rest),
            Err(_) => path.to_path_buf(),
        }
    }
}
