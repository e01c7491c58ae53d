//! Posts rendered messages to Slack, one best-effort attempt each.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::firehose_contract::RenderedMessage;
use crate::message_renderer::startup_message;
use crate::slack_client::SlackClient;

pub struct NotificationDispatcher {
    slack: Arc<dyn SlackClient>,
}

impl NotificationDispatcher {
    pub fn new(slack: Arc<dyn SlackClient>) -> Self {
        Self { slack }
    }

    /// One `chat.postMessage` call. Failures are logged and surfaced; the
    /// caller decides whether sibling messages keep flowing (they do).
    pub async fn dispatch(&self, message: &RenderedMessage) -> Result<()> {
        let result = self
            .slack
            .post_message(&message.channel, &message.attachments)
            .await
            .with_context(|| format!("failed to deliver notification to {}", message.channel));
        if let Err(error) = &result {
            tracing::warn!(channel = %message.channel, error = %error, "notification delivery failed");
        }
        result
    }

    /// The one-time liveness announcement to the default channel.
    pub async fn announce_startup(&self, default_channel: &str) -> Result<()> {
        self.dispatch(&startup_message(default_channel)).await
    }
}
