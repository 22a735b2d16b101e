// ABOUTME: Slack incoming-webhook notifier.
// ABOUTME: Posts one bold, colored attachment per message.

use super::{Color, Notifier, NotifyError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const SERVICE: &str = "Slack";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct MessageArray {
    attachments: Vec<Attachment>,
}

#[derive(Serialize)]
struct Attachment {
    text: String,
    color: Color,
}

pub struct SlackNotifier {
    hook_url: String,
    client: Client,
}

impl SlackNotifier {
    pub fn new(hook_url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| NotifyError::Client {
                service: SERVICE,
                source,
            })?;

        Ok(Self {
            hook_url: hook_url.into(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn target(&self) -> &str {
        &self.hook_url
    }

    async fn notify(&self, message: &str, color: Color) -> Result<(), NotifyError> {
        let body = MessageArray {
            attachments: vec![Attachment {
                text: format!("*{message}*"),
                color,
            }],
        };

        tracing::debug!(color = ?color, "posting Slack notification");
        let response = self
            .client
            .post(&self.hook_url)
            .json(&body)
            .send()
            .await
            .map_err(|source| NotifyError::Request {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The hook URL is a credential.
        f.debug_struct("SlackNotifier").finish_non_exhaustive()
    }
}
