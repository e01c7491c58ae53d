//! Maps (object type, transaction type) pairs onto notification events.
//!
//! The mapping is a closed table: pairs outside it classify to `None` and
//! produce no notification at all. Acting on your own object never suppresses
//! the notification, it only selects the "-own" wording variant downstream.

use crate::channel_routing::ChannelRoutes;
use crate::firehose_contract::{
    EventKind, NotificationEvent, ObjectType, ResolvedObject, Transaction, UserIdentity,
};
use crate::user_directory::UserDirectory;

/// Wording falls back to this when the directory has nothing for a PHID.
fn placeholder_identity(phid: &str) -> UserIdentity {
    UserIdentity {
        phid: phid.to_string(),
        username: String::new(),
        real_name: "an unknown user".to_string(),
        slack_id: None,
    }
}

/// Table entry: the event kind plus whether the "-own" variant applies when
/// the actor owns the object, plus the affected user for reassignments.
struct Classification {
    kind: EventKind,
    own_capable: bool,
    target_phid: Option<String>,
}

fn classification_for(transaction: &Transaction) -> Option<Classification> {
    let entry = |kind, own_capable| {
        Some(Classification {
            kind,
            own_capable,
            target_phid: None,
        })
    };
    match (transaction.object_type, transaction.kind.as_str()) {
        (ObjectType::Task, "create") => entry(EventKind::TaskCreate, false),
        (ObjectType::Task, "comment") => entry(EventKind::TaskAddComment, true),
        (ObjectType::Task, "priority") => entry(EventKind::TaskChangePriority, true),
        (ObjectType::Task, "status") => entry(EventKind::TaskChangeStatus, true),
        (ObjectType::Task, "owner") => {
            // Taking the task yourself is a claim; handing it to anyone else
            // is an assignment with that user as the affected party.
            if transaction.new.as_deref() == Some(transaction.actor_phid.as_str()) {
                entry(EventKind::TaskClaim, false)
            } else {
                Some(Classification {
                    kind: EventKind::TaskAssign,
                    own_capable: false,
                    target_phid: transaction.new.clone(),
                })
            }
        }
        (ObjectType::Revision, "create") => entry(EventKind::DiffCreate, false),
        (ObjectType::Revision, "update") => entry(EventKind::DiffUpdate, false),
        (ObjectType::Revision, "abandon") => entry(EventKind::DiffAbandon, false),
        (ObjectType::Revision, "reclaim") => entry(EventKind::DiffReclaim, false),
        (ObjectType::Revision, "accept") => entry(EventKind::DiffAccept, false),
        (ObjectType::Revision, "request-changes") => entry(EventKind::DiffRequestChanges, false),
        (ObjectType::Revision, "commandeer") => entry(EventKind::DiffCommandeer, false),
        (ObjectType::Revision, "comment") => entry(EventKind::DiffAddComment, true),
        (ObjectType::Revision, "inline") => entry(EventKind::DiffAddInlineComment, true),
        (ObjectType::Commit, "comment") => entry(EventKind::CommitAddComment, true),
        (ObjectType::Project, "create") => entry(EventKind::ProjCreate, false),
        (ObjectType::Repository, "create") => entry(EventKind::RepoCreate, false),
        _ => None,
    }
}

/// Classifies one transaction against its freshly resolved object. Returns
/// `None` for transaction types outside the notified set; that is a silent
/// no-op, not an error.
pub async fn classify(
    transaction: &Transaction,
    object: &ResolvedObject,
    routes: &ChannelRoutes,
    directory: &UserDirectory,
) -> Option<NotificationEvent> {
    let classification = classification_for(transaction)?;

    let own_action = classification.own_capable
        && object.owner_phid.as_deref() == Some(transaction.actor_phid.as_str());
    let actor = directory
        .resolve_platform_user(&transaction.actor_phid)
        .await
        .unwrap_or_else(|| placeholder_identity(&transaction.actor_phid));
    let target = match &classification.target_phid {
        Some(phid) => Some(
            directory
                .resolve_platform_user(phid)
                .await
                .unwrap_or_else(|| placeholder_identity(phid)),
        ),
        None => None,
    };

    Some(NotificationEvent {
        kind: classification.kind,
        own_action,
        actor,
        target,
        monogram: object.monogram.clone(),
        title: object.title.clone(),
        old: transaction.old.clone(),
        new: transaction.new.clone(),
        comment: transaction.comment.clone(),
        channel: routes.channel_for(&object.route_tags),
    })
}
