// ABOUTME: Build notifications posted to chat webhooks after each build attempt.
// ABOUTME: Delivery failures are returned to the caller and never fail a deploy.

mod slack;

pub use slack::SlackNotifier;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Message color, in Slack attachment terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Color {
    #[serde(rename = "good")]
    Green,
    #[serde(rename = "warning")]
    Yellow,
    #[serde(rename = "danger")]
    Red,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to set up {service} notifications: {source}")]
    Client {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} notification failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} rejected notification ({status}): {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },
}

/// A place build notifications are delivered to.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivery address. Two notifiers with the same target are duplicates.
    fn target(&self) -> &str;

    async fn notify(&self, message: &str, color: Color) -> Result<(), NotifyError>;
}

/// Every registered notifier, each added once.
#[derive(Clone, Default)]
pub struct Notifiers {
    targets: Vec<Arc<dyn Notifier>>,
}

impl Notifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, target: &str) -> bool {
        self.targets.iter().any(|n| n.target() == target)
    }

    /// Register `notifier` unless one with the same target exists. Returns whether it was added.
    pub fn add(&mut self, notifier: Arc<dyn Notifier>) -> bool {
        if self.contains(notifier.target()) {
            return false;
        }
        self.targets.push(notifier);
        true
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Deliver to every target. A failing target does not stop the rest.
    pub async fn notify(&self, message: &str, color: Color) -> Vec<NotifyError> {
        let mut failures = Vec::new();
        for notifier in &self.targets {
            if let Err(e) = notifier.notify(message, color).await {
                failures.push(e);
            }
        }
        failures
    }
}

impl std::fmt::Debug for Notifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifiers")
            .field("count", &self.targets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        target: String,
        fail: bool,
        seen: Mutex<Vec<(String, Color)>>,
    }

    impl Recorder {
        fn new(target: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                target: target.to_string(),
                fail,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        fn target(&self) -> &str {
            &self.target
        }

        async fn notify(&self, message: &str, color: Color) -> Result<(), NotifyError> {
            self.seen.lock().push((message.to_string(), color));
            if self.fail {
                return Err(NotifyError::Rejected {
                    service: "test",
                    status: 500,
                    body: "down".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn duplicate_targets_are_added_once() {
        let mut notifiers = Notifiers::new();

        assert!(notifiers.add(Recorder::new("https://hooks.example/a", false)));
        assert!(!notifiers.add(Recorder::new("https://hooks.example/a", false)));
        assert!(notifiers.add(Recorder::new("https://hooks.example/b", false)));

        assert_eq!(notifiers.len(), 2);
    }

    #[tokio::test]
    async fn a_failing_target_does_not_stop_the_others() {
        let broken = Recorder::new("broken", true);
        let working = Recorder::new("working", false);
        let mut notifiers = Notifiers::new();
        notifiers.add(broken.clone());
        notifiers.add(working.clone());

        let failures = notifiers.notify("Build completed", Color::Green).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(
            working.seen.lock().as_slice(),
            &[("Build completed".to_string(), Color::Green)]
        );
    }

    #[test]
    fn colors_use_attachment_names() {
        assert_eq!(serde_json::to_string(&Color::Green).unwrap(), "\"good\"");
        assert_eq!(serde_json::to_string(&Color::Red).unwrap(), "\"danger\"");
    }
}
