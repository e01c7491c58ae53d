//! Conduit-style query client for the source platform.
//!
//! Every search is a bulk call keyed by a PHID set; the pipeline never issues
//! one call per transaction. Transport errors and timeouts are fatal for the
//! individual call and are not retried here.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::firehose_contract::{ObjectType, Transaction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhabUser {
    pub phid: String,
    pub username: String,
    pub real_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub phid: String,
    pub id: u64,
    pub title: String,
    pub owner_phid: Option<String>,
    pub project_phids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionInfo {
    pub phid: String,
    pub id: u64,
    pub title: String,
    pub author_phid: Option<String>,
    pub repository_phid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub phid: String,
    pub identifier: String,
    pub summary: String,
    pub author_phid: Option<String>,
    pub repository_phid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub phid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub phid: String,
    pub name: String,
}

/// Bulk search surface the pipeline needs from the platform. Kept narrow so
/// tests can substitute canned responses.
#[async_trait]
pub trait PhabClient: Send + Sync {
    async fn transaction_search(
        &self,
        object_phid: &str,
        transaction_phids: &[String],
    ) -> Result<Vec<Transaction>>;
    async fn user_search(&self, phids: &[String]) -> Result<Vec<PhabUser>>;
    async fn task_search(&self, phids: &[String]) -> Result<Vec<TaskInfo>>;
    async fn revision_search(&self, phids: &[String]) -> Result<Vec<RevisionInfo>>;
    async fn commit_search(&self, phids: &[String]) -> Result<Vec<CommitInfo>>;
    async fn project_search(&self, phids: &[String]) -> Result<Vec<ProjectInfo>>;
    async fn repository_search(&self, phids: &[String]) -> Result<Vec<RepositoryInfo>>;
}

#[derive(Clone)]
/// Conduit HTTP implementation of [`PhabClient`].
pub struct ConduitClient {
    http: reqwest::Client,
    api_base: String,
    api_token: String,
}

impl ConduitClient {
    pub fn new(api_base: &str, api_token: &str, request_timeout_ms: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create conduit http client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_token: api_token.trim().to_string(),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let mut form = HashMap::new();
        form.insert("api.token", self.api_token.clone());
        form.insert(
            "params",
            serde_json::to_string(&params)
                .with_context(|| format!("failed to encode conduit {method} params"))?,
        );
        form.insert("output", "json".to_string());

        let response = self
            .http
            .post(format!("{}/api/{}", self.api_base, method))
            .form(&form)
            .send()
            .await
            .with_context(|| format!("conduit {method} request failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("conduit {method} failed with status {}", status.as_u16());
        }
        let envelope: Value = response
            .json()
            .await
            .with_context(|| format!("failed to decode conduit {method} response"))?;

        if let Some(error_code) = envelope.get("error_code").and_then(Value::as_str) {
            let error_info = envelope
                .get("error_info")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            bail!("conduit {method} returned {error_code}: {error_info}");
        }
        Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn search_data(&self, method: &str, params: Value) -> Result<Vec<Value>> {
        let result = self.call(method, params).await?;
        Ok(result
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

fn phid_constraints(phids: &[String]) -> Value {
    json!({ "constraints": { "phids": phids } })
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

/// Flattens a transaction field delta to display text. Conduit encodes deltas
/// as bare strings, numbers, or `{value, name}` objects depending on the
/// transaction type.
fn flatten_delta(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("value"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn first_comment_raw(entry: &Value) -> Option<String> {
    entry
        .get("comments")
        .and_then(Value::as_array)
        .and_then(|comments| comments.first())
        .and_then(|comment| str_at(comment, "/content/raw"))
        .map(str::to_string)
}

#[async_trait]
impl PhabClient for ConduitClient {
    async fn transaction_search(
        &self,
        object_phid: &str,
        transaction_phids: &[String],
    ) -> Result<Vec<Transaction>> {
        let data = self
            .search_data(
                "transaction.search",
                json!({
                    "objectIdentifier": object_phid,
                    "constraints": { "phids": transaction_phids },
                }),
            )
            .await?;

        let mut transactions = Vec::with_capacity(data.len());
        for entry in &data {
            let Some(phid) = entry.get("phid").and_then(Value::as_str) else {
                continue;
            };
            let object_phid = entry
                .get("objectPHID")
                .and_then(Value::as_str)
                .unwrap_or(object_phid);
            transactions.push(Transaction {
                phid: phid.to_string(),
                object_type: ObjectType::from_phid(object_phid),
                object_phid: object_phid.to_string(),
                kind: entry
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                actor_phid: entry
                    .get("authorPHID")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                old: flatten_delta(entry.pointer("/fields/old")),
                new: flatten_delta(entry.pointer("/fields/new")),
                comment: first_comment_raw(entry),
            });
        }
        Ok(transactions)
    }

    async fn user_search(&self, phids: &[String]) -> Result<Vec<PhabUser>> {
        if phids.is_empty() {
            return Ok(Vec::new());
        }
        let data = self
            .search_data("user.search", phid_constraints(phids))
            .await?;
        Ok(data
            .iter()
            .filter_map(|entry| {
                Some(PhabUser {
                    phid: entry.get("phid").and_then(Value::as_str)?.to_string(),
                    username: str_at(entry, "/fields/username")
                        .unwrap_or_default()
                        .to_string(),
                    real_name: str_at(entry, "/fields/realName")
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .collect())
    }

    async fn task_search(&self, phids: &[String]) -> Result<Vec<TaskInfo>> {
        let data = self
            .search_data(
                "maniphest.search",
                json!({
                    "constraints": { "phids": phids },
                    "attachments": { "projects": true },
                }),
            )
            .await?;
        Ok(data
            .iter()
            .filter_map(|entry| {
                Some(TaskInfo {
                    phid: entry.get("phid").and_then(Value::as_str)?.to_string(),
                    id: entry.get("id").and_then(Value::as_u64)?,
                    title: str_at(entry, "/fields/name").unwrap_or_default().to_string(),
                    owner_phid: str_at(entry, "/fields/ownerPHID").map(str::to_string),
                    project_phids: entry
                        .pointer("/attachments/projects/projectPHIDs")
                        .and_then(Value::as_array)
                        .map(|phids| {
                            phids
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn revision_search(&self, phids: &[String]) -> Result<Vec<RevisionInfo>> {
        let data = self
            .search_data("differential.revision.search", phid_constraints(phids))
            .await?;
        Ok(data
            .iter()
            .filter_map(|entry| {
                Some(RevisionInfo {
                    phid: entry.get("phid").and_then(Value::as_str)?.to_string(),
                    id: entry.get("id").and_then(Value::as_u64)?,
                    title: str_at(entry, "/fields/title")
                        .unwrap_or_default()
                        .to_string(),
                    author_phid: str_at(entry, "/fields/authorPHID").map(str::to_string),
                    repository_phid: str_at(entry, "/fields/repositoryPHID").map(str::to_string),
                })
            })
            .collect())
    }

    async fn commit_search(&self, phids: &[String]) -> Result<Vec<CommitInfo>> {
        let data = self
            .search_data("diffusion.commit.search", phid_constraints(phids))
            .await?;
        Ok(data
            .iter()
            .filter_map(|entry| {
                Some(CommitInfo {
                    phid: entry.get("phid").and_then(Value::as_str)?.to_string(),
                    identifier: str_at(entry, "/fields/identifier")
                        .unwrap_or_default()
                        .to_string(),
                    summary: str_at(entry, "/fields/message/summary")
                        .or_else(|| str_at(entry, "/fields/summary"))
                        .unwrap_or_default()
                        .to_string(),
                    author_phid: str_at(entry, "/fields/author/userPHID")
                        .or_else(|| str_at(entry, "/fields/authorPHID"))
                        .map(str::to_string),
                    repository_phid: str_at(entry, "/fields/repositoryPHID").map(str::to_string),
                })
            })
            .collect())
    }

    async fn project_search(&self, phids: &[String]) -> Result<Vec<ProjectInfo>> {
        let data = self
            .search_data("project.search", phid_constraints(phids))
            .await?;
        Ok(data
            .iter()
            .filter_map(|entry| {
                Some(ProjectInfo {
                    phid: entry.get("phid").and_then(Value::as_str)?.to_string(),
                    name: str_at(entry, "/fields/name").unwrap_or_default().to_string(),
                })
            })
            .collect())
    }

    async fn repository_search(&self, phids: &[String]) -> Result<Vec<RepositoryInfo>> {
        let data = self
            .search_data("diffusion.repository.search", phid_constraints(phids))
            .await?;
        Ok(data
            .iter()
            .filter_map(|entry| {
                Some(RepositoryInfo {
                    phid: entry.get("phid").and_then(Value::as_str)?.to_string(),
                    name: str_at(entry, "/fields/name").unwrap_or_default().to_string(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{first_comment_raw, flatten_delta};

    #[test]
    fn unit_flatten_delta_handles_conduit_shapes() {
        assert_eq!(
            flatten_delta(Some(&json!("open"))),
            Some("open".to_string())
        );
        assert_eq!(flatten_delta(Some(&json!(90))), Some("90".to_string()));
        assert_eq!(
            flatten_delta(Some(&json!({"value": "high", "name": "High"}))),
            Some("High".to_string())
        );
        assert_eq!(flatten_delta(Some(&json!(null))), None);
        assert_eq!(flatten_delta(None), None);
    }

    #[test]
    fn unit_first_comment_raw_reads_nested_content() {
        let entry = json!({
            "comments": [{"content": {"raw": "looks good"}}],
        });
        assert_eq!(first_comment_raw(&entry), Some("looks good".to_string()));
        assert_eq!(first_comment_raw(&json!({"comments": []})), None);
        assert_eq!(first_comment_raw(&json!({})), None);
    }
}
