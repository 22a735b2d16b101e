// ABOUTME: Point-in-time snapshot of a deployment for status queries.
// ABOUTME: An empty status means nothing has been set up yet.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentStatus {
    pub branch: String,
    pub commit_hash: String,
    pub commit_message: String,
    pub build_type: String,
    /// Names of running project containers.
    pub containers: Vec<String>,
    /// A build container or compose coordinator is running.
    pub build_container_active: bool,
}

impl DeploymentStatus {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
