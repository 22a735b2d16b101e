// ABOUTME: User-facing deployment settings and per-deploy options.
// ABOUTME: Also defines the lifecycle states a Deployment moves through.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BRANCH: &str = "master";

/// Settings supplied when a deployment is set up or reconfigured.
///
/// Empty strings mean "not provided"; see [`DeploymentConfig::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub project_name: String,
    pub build_type: String,
    pub build_file_path: String,
    pub remote_url: String,
    pub branch: String,
    pub pem_file_path: String,
    /// Slack incoming-webhook URL for build notifications.
    pub slack_notification_url: String,
}

impl DeploymentConfig {
    /// Overwrite each field for which `update` has a non-empty value.
    pub fn merge(&mut self, update: &DeploymentConfig) {
        let fields = [
            (&mut self.project_name, &update.project_name),
            (&mut self.build_type, &update.build_type),
            (&mut self.build_file_path, &update.build_file_path),
            (&mut self.remote_url, &update.remote_url),
            (&mut self.branch, &update.branch),
            (&mut self.pem_file_path, &update.pem_file_path),
            (&mut self.slack_notification_url, &update.slack_notification_url),
        ];
        for (current, new) in fields {
            if !new.is_empty() {
                current.clone_from(new);
            }
        }
    }

    pub fn branch_or_default(&self) -> &str {
        if self.branch.is_empty() {
            DEFAULT_BRANCH
        } else {
            &self.branch
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Build whatever is checked out without fetching first.
    pub skip_update: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    /// No checkout.
    #[default]
    Empty,
    /// Checkout present, nothing deployed by this process yet.
    Initialized,
    Deployed,
    /// Containers were taken down; the checkout remains.
    Down,
}

impl DeploymentState {
    pub fn is_initialized(&self) -> bool {
        !matches!(self, DeploymentState::Empty)
    }
}

impl std::fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeploymentState::Empty => "empty",
            DeploymentState::Initialized => "initialized",
            DeploymentState::Deployed => "deployed",
            DeploymentState::Down => "down",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_overwrites_provided_fields() {
        let mut config = DeploymentConfig {
            project_name: "app".into(),
            build_type: "compose".into(),
            branch: "main".into(),
            ..Default::default()
        };

        config.merge(&DeploymentConfig {
            build_type: "dockerfile".into(),
            ..Default::default()
        });

        assert_eq!(config.project_name, "app");
        assert_eq!(config.build_type, "dockerfile");
        assert_eq!(config.branch, "main");
    }

    #[test]
    fn branch_defaults_when_unset() {
        assert_eq!(DeploymentConfig::default().branch_or_default(), DEFAULT_BRANCH);
    }

    #[test]
    fn only_empty_is_uninitialized() {
        assert!(!DeploymentState::Empty.is_initialized());
        assert!(DeploymentState::Down.is_initialized());
    }

    #[test]
    fn config_round_trips_through_yaml_with_missing_fields() {
        let config: DeploymentConfig = serde_yaml::from_str("project_name: app\n").unwrap();
        assert_eq!(config.project_name, "app");
        assert!(config.remote_url.is_empty());
    }
}
