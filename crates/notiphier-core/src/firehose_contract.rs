//! Shared contract types for the Firehose notification pipeline.
//!
//! A webhook delivery carries one object reference plus a set of transaction
//! PHIDs; everything else here is derived per delivery and never outlives it.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Enumerates supported `ObjectType` values.
pub enum ObjectType {
    Task,
    Revision,
    Commit,
    Project,
    Repository,
    Unknown,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "TASK",
            Self::Revision => "DREV",
            Self::Commit => "CMIT",
            Self::Project => "PROJ",
            Self::Repository => "REPO",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "TASK" => Self::Task,
            "DREV" => Self::Revision,
            "CMIT" => Self::Commit,
            "PROJ" => Self::Project,
            "REPO" => Self::Repository,
            _ => Self::Unknown,
        }
    }

    /// Derives the object type from a PHID such as `PHID-TASK-abc123`.
    pub fn from_phid(phid: &str) -> Self {
        let mut parts = phid.splitn(3, '-');
        match (parts.next(), parts.next()) {
            (Some("PHID"), Some(kind)) => Self::from_wire(kind),
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One webhook delivery parsed down to the references the pipeline needs.
pub struct WebhookDelivery {
    pub object_type: ObjectType,
    pub object_phid: String,
    pub transaction_phids: Vec<String>,
}

impl WebhookDelivery {
    /// Parses a raw Firehose delivery payload. This is the only parse failure
    /// treated as fatal for the whole delivery.
    pub fn from_request(request: &Value) -> Result<Self> {
        let object = request
            .get("object")
            .context("firehose delivery missing object")?;
        let object_phid = object
            .get("phid")
            .and_then(Value::as_str)
            .context("firehose delivery object missing phid")?
            .to_string();
        let object_type = object
            .get("type")
            .and_then(Value::as_str)
            .map(ObjectType::from_wire)
            .unwrap_or_else(|| ObjectType::from_phid(&object_phid));

        let transaction_phids = request
            .get("transactions")
            .and_then(Value::as_array)
            .context("firehose delivery missing transactions")?
            .iter()
            .filter_map(|entry| entry.get("phid").and_then(Value::as_str))
            .map(str::to_string)
            .collect::<Vec<_>>();
        if transaction_phids.is_empty() {
            return Err(anyhow!("firehose delivery carried no transaction phids"));
        }

        Ok(Self {
            object_type,
            object_phid,
            transaction_phids,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One atomic change on a platform object, as returned by transaction.search.
pub struct Transaction {
    pub phid: String,
    pub object_type: ObjectType,
    pub object_phid: String,
    pub kind: String,
    pub actor_phid: String,
    pub old: Option<String>,
    pub new: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Freshly fetched state of the object a transaction references. Never cached
/// across deliveries.
pub struct ResolvedObject {
    pub phid: String,
    pub object_type: ObjectType,
    pub monogram: String,
    pub title: String,
    pub owner_phid: Option<String>,
    pub route_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Platform identity plus the Slack member it maps to, if any.
pub struct UserIdentity {
    pub phid: String,
    pub username: String,
    pub real_name: String,
    pub slack_id: Option<String>,
}

impl UserIdentity {
    /// Slack mention form when the member is known, plain display name
    /// otherwise. Directory misses degrade wording, never delivery.
    pub fn mention_label(&self) -> String {
        match &self.slack_id {
            Some(slack_id) => format!("<@{slack_id}>"),
            None => self.real_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Enumerates supported `EventKind` values. Exactly one entry per notified
/// (object type, transaction type) pair; everything else classifies to None.
pub enum EventKind {
    TaskCreate,
    TaskAddComment,
    TaskClaim,
    TaskAssign,
    TaskChangePriority,
    TaskChangeStatus,
    DiffCreate,
    DiffUpdate,
    DiffAbandon,
    DiffReclaim,
    DiffAccept,
    DiffRequestChanges,
    DiffCommandeer,
    DiffAddComment,
    DiffAddInlineComment,
    CommitAddComment,
    ProjCreate,
    RepoCreate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A classified transaction, directory-resolved and ready for rendering.
pub struct NotificationEvent {
    pub kind: EventKind,
    pub own_action: bool,
    pub actor: UserIdentity,
    pub target: Option<UserIdentity>,
    pub monogram: String,
    pub title: String,
    pub old: Option<String>,
    pub new: Option<String>,
    pub comment: Option<String>,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Final Slack payload: channel plus ordered `{text, color}` attachments.
pub struct RenderedMessage {
    pub channel: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub text: String,
    pub color: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// Per-delivery outcome counters reported back to the webhook shell.
pub struct FirehoseReport {
    pub transactions_seen: usize,
    pub notifications_sent: usize,
    pub skipped_unclassified: usize,
    pub dropped_unresolved: usize,
    pub failed_deliveries: usize,
}
