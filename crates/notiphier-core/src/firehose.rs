//! Webhook Firehose pipeline: delivery in, Slack notifications out.
//!
//! Each delivery is one stateless pass: fetch transaction details, resolve
//! objects and identities in bulk, classify, render, dispatch. Per-object and
//! per-message failures stay isolated to their unit of work; only an
//! unparseable delivery payload is fatal to the whole request.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::channel_routing::ChannelRoutes;
use crate::event_classifier::classify;
use crate::firehose_contract::{FirehoseReport, ResolvedObject, Transaction, WebhookDelivery};
use crate::mention_resolver::render_mentions;
use crate::message_renderer::render;
use crate::notification_dispatcher::NotificationDispatcher;
use crate::phab_client::PhabClient;
use crate::platform_resolver::PlatformResolver;
use crate::slack_client::SlackClient;
use crate::user_directory::UserDirectory;


/// The core pipeline. Owns the only process-wide state (the user directory);
/// everything else lives for one delivery.
pub struct WebhookFirehose {
    phab: Arc<dyn PhabClient>,
    resolver: PlatformResolver,
    directory: UserDirectory,
    dispatcher: NotificationDispatcher,
    routes: ChannelRoutes,
}

impl WebhookFirehose {
    /// Wires the pipeline, populates the directory, and posts the one-time
    /// startup announcement to the default channel.
    pub async fn new(
        phab: Arc<dyn PhabClient>,
        slack: Arc<dyn SlackClient>,
        routes: ChannelRoutes,
    ) -> Result<Self> {
        let directory = UserDirectory::new(phab.clone(), slack.clone());
        let first_population = directory
            .ensure_populated()
            .await
            .context("failed to populate user directory at startup")?;
        let firehose = Self {
            resolver: PlatformResolver::new(phab.clone()),
            phab,
            directory,
            dispatcher: NotificationDispatcher::new(slack),
            routes,
        };
        if first_population {
            firehose
                .dispatcher
                .announce_startup(firehose.routes.default_channel())
                .await
                .context("failed to post startup announcement")?;
        }
        Ok(firehose)
    }

    /// Drops and refetches the Slack roster and cached identities.
    pub async fn refresh_directory(&self) -> Result<()> {
        self.directory.refresh().await
    }

    /// Processes one webhook delivery and reports what happened to each
    /// transaction in it.
    pub async fn handle(&self, request: &Value) -> Result<FirehoseReport> {
        let delivery = WebhookDelivery::from_request(request)?;
        let mut report = FirehoseReport::default();

        let transactions = match self
            .phab
            .transaction_search(&delivery.object_phid, &delivery.transaction_phids)
            .await
        {
            Ok(transactions) => transactions,
            Err(error) => {
                tracing::warn!(
                    object_phid = %delivery.object_phid,
                    error = %error,
                    "transaction lookup failed; dropping delivery"
                );
                report.transactions_seen = delivery.transaction_phids.len();
                report.dropped_unresolved = delivery.transaction_phids.len();
                return Ok(report);
            }
        };
        report.transactions_seen = transactions.len();

        let resolved = self.resolver.resolve(&transactions).await;

        // One bulk identity fetch for every actor and affected user in the
        // batch. A failed prime degrades wording, never delivery.
        if let Err(error) = self
            .directory
            .prime_batch(&batch_user_phids(&transactions, &resolved.objects))
            .await
        {
            tracing::warn!(error = %error, "identity prime failed; falling back to placeholders");
        }

        for transaction in &transactions {
            let Some(object) = resolved.objects.get(&transaction.object_phid) else {
                if !resolved.failed_object_phids.contains(&transaction.object_phid) {
                    tracing::warn!(
                        object_phid = %transaction.object_phid,
                        "object not returned by search; dropping transaction"
                    );
                }
                report.dropped_unresolved += 1;
                continue;
            };

            let Some(mut event) = classify(transaction, object, &self.routes, &self.directory).await
            else {
                tracing::debug!(
                    transaction_type = %transaction.kind,
                    object_type = transaction.object_type.as_str(),
                    "transaction type outside the notified set"
                );
                report.skipped_unclassified += 1;
                continue;
            };

            if let Some(comment) = event.comment.take() {
                event.comment = Some(render_mentions(&comment, &self.directory).await);
            }

            match self.dispatcher.dispatch(&render(&event)).await {
                Ok(()) => report.notifications_sent += 1,
                // Already logged by the dispatcher; siblings keep flowing.
                Err(_) => report.failed_deliveries += 1,
            }
        }
        Ok(report)
    }
}

/// Every user PHID a delivery can end up mentioning: actors, resolved object
/// owners, and old/new owners on reassignment transactions.
fn batch_user_phids(
    transactions: &[Transaction],
    objects: &HashMap<String, ResolvedObject>,
) -> Vec<String> {
    let mut phids = HashSet::new();
    for transaction in transactions {
        phids.insert(transaction.actor_phid.clone());
        if transaction.kind == "owner" {
            for value in [&transaction.old, &transaction.new] {
                if let Some(phid) = value {
                    phids.insert(phid.clone());
                }
            }
        }
    }
    for object in objects.values() {
        if let Some(owner) = &object.owner_phid {
            phids.insert(owner.clone());
        }
    }
    phids.into_iter().collect()
}
