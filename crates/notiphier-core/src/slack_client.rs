//! Slack Web API client used for roster fetches and message posting.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::firehose_contract::Attachment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackMember {
    pub id: String,
    pub name: String,
    pub real_name: String,
}

/// The two Slack calls the pipeline makes: `users.list` once for the roster
/// and `chat.postMessage` per notification.
#[async_trait]
pub trait SlackClient: Send + Sync {
    async fn users_list(&self) -> Result<Vec<SlackMember>>;
    async fn post_message(&self, channel: &str, attachments: &[Attachment]) -> Result<()>;
}

#[derive(Debug, Clone, Deserialize)]
struct SlackUsersListResponse {
    ok: bool,
    #[serde(default)]
    members: Vec<SlackMemberEntry>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackMemberEntry {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackChatMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
/// Web API implementation of [`SlackClient`].
pub struct SlackWebClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl SlackWebClient {
    pub fn new(api_base: &str, bot_token: &str, request_timeout_ms: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack http client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
        })
    }
}

#[async_trait]
impl SlackClient for SlackWebClient {
    async fn users_list(&self) -> Result<Vec<SlackMember>> {
        let response: SlackUsersListResponse = self
            .http
            .get(format!("{}/users.list", self.api_base))
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .context("slack users.list request failed")?
            .json()
            .await
            .context("failed to decode slack users.list response")?;
        if !response.ok {
            bail!(
                "slack users.list failed: {}",
                response.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        Ok(response
            .members
            .into_iter()
            .filter(|member| !member.deleted)
            .map(|member| SlackMember {
                id: member.id,
                real_name: member.real_name.unwrap_or_default(),
                name: member.name,
            })
            .collect())
    }

    async fn post_message(&self, channel: &str, attachments: &[Attachment]) -> Result<()> {
        let payload = json!({
            "channel": channel,
            "attachments": attachments
                .iter()
                .map(|attachment| json!({
                    "text": attachment.text,
                    "color": attachment.color,
                }))
                .collect::<Vec<_>>(),
        });
        let response: SlackChatMessageResponse = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&payload)
            .send()
            .await
            .context("slack chat.postMessage request failed")?
            .json()
            .await
            .context("failed to decode slack chat.postMessage response")?;
        if !response.ok {
            bail!(
                "slack chat.postMessage failed: {}",
                response.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        Ok(())
    }
}
