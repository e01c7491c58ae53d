//! Renders classified events into Slack attachment payloads.
//!
//! The template match below is the single source of truth for notification
//! wording; the palette groups kinds into creation, state-change, and comment
//! colors. No kind renders empty text.

use crate::firehose_contract::{Attachment, EventKind, NotificationEvent, RenderedMessage};

pub const COLOR_CREATE: &str = "#36A64F";
pub const COLOR_CHANGE: &str = "#E8912D";
pub const COLOR_COMMENT: &str = "#439FE0";
pub const COLOR_STARTUP: &str = "#28D7E5";

pub const STARTUP_TEXT: &str = "Slack Notiphier started running.";

fn color_for(kind: EventKind) -> &'static str {
    match kind {
        EventKind::TaskCreate
        | EventKind::DiffCreate
        | EventKind::ProjCreate
        | EventKind::RepoCreate => COLOR_CREATE,
        EventKind::TaskClaim
        | EventKind::TaskAssign
        | EventKind::TaskChangePriority
        | EventKind::TaskChangeStatus
        | EventKind::DiffUpdate
        | EventKind::DiffAbandon
        | EventKind::DiffReclaim
        | EventKind::DiffAccept
        | EventKind::DiffRequestChanges
        | EventKind::DiffCommandeer => COLOR_CHANGE,
        EventKind::TaskAddComment
        | EventKind::DiffAddComment
        | EventKind::DiffAddInlineComment
        | EventKind::CommitAddComment => COLOR_COMMENT,
    }
}

fn comment_suffix(event: &NotificationEvent) -> String {
    match event.comment.as_deref().map(str::trim) {
        Some(comment) if !comment.is_empty() => format!(": {comment}"),
        _ => String::new(),
    }
}

fn delta(value: Option<&str>) -> &str {
    value.unwrap_or("unknown")
}

fn event_text(event: &NotificationEvent) -> String {
    let actor = event.actor.mention_label();
    let mono = &event.monogram;
    let title = &event.title;
    match (event.kind, event.own_action) {
        (EventKind::TaskCreate, _) => format!("{actor} created task {mono}: {title}"),
        (EventKind::TaskAddComment, false) => format!(
            "{actor} commented on task {mono} ({title}){}",
            comment_suffix(event)
        ),
        (EventKind::TaskAddComment, true) => format!(
            "{actor} commented on their own task {mono} ({title}){}",
            comment_suffix(event)
        ),
        (EventKind::TaskClaim, _) => format!("{actor} claimed task {mono} ({title})"),
        (EventKind::TaskAssign, _) => {
            let target = event
                .target
                .as_ref()
                .map(|target| target.mention_label())
                .unwrap_or_else(|| "an unknown user".to_string());
            format!("{actor} assigned task {mono} ({title}) to {target}")
        }
        (EventKind::TaskChangePriority, false) => format!(
            "{actor} changed the priority of task {mono} ({title}) from {} to {}",
            delta(event.old.as_deref()),
            delta(event.new.as_deref())
        ),
        (EventKind::TaskChangePriority, true) => format!(
            "{actor} changed the priority of their own task {mono} ({title}) from {} to {}",
            delta(event.old.as_deref()),
            delta(event.new.as_deref())
        ),
        (EventKind::TaskChangeStatus, false) => format!(
            "{actor} changed the status of task {mono} ({title}) from {} to {}",
            delta(event.old.as_deref()),
            delta(event.new.as_deref())
        ),
        (EventKind::TaskChangeStatus, true) => format!(
            "{actor} changed the status of their own task {mono} ({title}) from {} to {}",
            delta(event.old.as_deref()),
            delta(event.new.as_deref())
        ),
        (EventKind::DiffCreate, _) => format!("{actor} created diff {mono}: {title}"),
        (EventKind::DiffUpdate, _) => format!("{actor} updated diff {mono} ({title})"),
        (EventKind::DiffAbandon, _) => format!("{actor} abandoned diff {mono} ({title})"),
        (EventKind::DiffReclaim, _) => format!("{actor} reclaimed diff {mono} ({title})"),
        (EventKind::DiffAccept, _) => format!("{actor} accepted diff {mono} ({title})"),
        (EventKind::DiffRequestChanges, _) => {
            format!("{actor} requested changes to diff {mono} ({title})")
        }
        (EventKind::DiffCommandeer, _) => format!("{actor} commandeered diff {mono} ({title})"),
        (EventKind::DiffAddComment, false) => format!(
            "{actor} commented on diff {mono} ({title}){}",
            comment_suffix(event)
        ),
        (EventKind::DiffAddComment, true) => format!(
            "{actor} commented on their own diff {mono} ({title}){}",
            comment_suffix(event)
        ),
        (EventKind::DiffAddInlineComment, false) => format!(
            "{actor} added an inline comment to diff {mono} ({title}){}",
            comment_suffix(event)
        ),
        (EventKind::DiffAddInlineComment, true) => format!(
            "{actor} added an inline comment to their own diff {mono} ({title}){}",
            comment_suffix(event)
        ),
        (EventKind::CommitAddComment, false) => format!(
            "{actor} commented on commit {mono}{}",
            comment_suffix(event)
        ),
        (EventKind::CommitAddComment, true) => format!(
            "{actor} commented on their own commit {mono}{}",
            comment_suffix(event)
        ),
        (EventKind::ProjCreate, _) => format!("{actor} created project {title}"),
        (EventKind::RepoCreate, _) => format!("{actor} created repository {title}"),
    }
}

/// Renders the final Slack payload for a classified event.
pub fn render(event: &NotificationEvent) -> RenderedMessage {
    RenderedMessage {
        channel: event.channel.clone(),
        attachments: vec![Attachment {
            text: event_text(event),
            color: color_for(event.kind).to_string(),
        }],
    }
}

/// The fixed liveness announcement, posted once after the first directory
/// population.
pub fn startup_message(default_channel: &str) -> RenderedMessage {
    RenderedMessage {
        channel: default_channel.to_string(),
        attachments: vec![Attachment {
            text: STARTUP_TEXT.to_string(),
            color: COLOR_STARTUP.to_string(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::{render, startup_message, COLOR_COMMENT, COLOR_CREATE, COLOR_STARTUP};
    use crate::firehose_contract::{EventKind, NotificationEvent, UserIdentity};

    fn actor() -> UserIdentity {
        UserIdentity {
            phid: "PHID-USER-ana".to_string(),
            username: "ana".to_string(),
            real_name: "Ana Garcia".to_string(),
            slack_id: Some("U111".to_string()),
        }
    }

    fn event(kind: EventKind, own_action: bool) -> NotificationEvent {
        NotificationEvent {
            kind,
            own_action,
            actor: actor(),
            target: None,
            monogram: "T7".to_string(),
            title: "Ship the importer".to_string(),
            old: Some("Low".to_string()),
            new: Some("High".to_string()),
            comment: Some("nice work".to_string()),
            channel: "#backend".to_string(),
        }
    }

    #[test]
    fn functional_task_create_renders_creation_color_and_actor_mention() {
        let message = render(&event(EventKind::TaskCreate, false));
        assert_eq!(message.channel, "#backend");
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(
            message.attachments[0].text,
            "<@U111> created task T7: Ship the importer"
        );
        assert_eq!(message.attachments[0].color, COLOR_CREATE);
    }

    #[test]
    fn functional_own_variant_changes_wording_but_not_channel() {
        let own = render(&event(EventKind::TaskAddComment, true));
        let other = render(&event(EventKind::TaskAddComment, false));
        assert_ne!(own.attachments[0].text, other.attachments[0].text);
        assert!(own.attachments[0].text.contains("their own task"));
        assert_eq!(own.channel, other.channel);
        assert_eq!(own.attachments[0].color, COLOR_COMMENT);
    }

    #[test]
    fn functional_priority_change_interpolates_old_and_new_values() {
        let message = render(&event(EventKind::TaskChangePriority, false));
        assert_eq!(
            message.attachments[0].text,
            "<@U111> changed the priority of task T7 (Ship the importer) from Low to High"
        );
    }

    #[test]
    fn unit_every_kind_renders_non_empty_text() {
        let kinds = [
            EventKind::TaskCreate,
            EventKind::TaskAddComment,
            EventKind::TaskClaim,
            EventKind::TaskAssign,
            EventKind::TaskChangePriority,
            EventKind::TaskChangeStatus,
            EventKind::DiffCreate,
            EventKind::DiffUpdate,
            EventKind::DiffAbandon,
            EventKind::DiffReclaim,
            EventKind::DiffAccept,
            EventKind::DiffRequestChanges,
            EventKind::DiffCommandeer,
            EventKind::DiffAddComment,
            EventKind::DiffAddInlineComment,
            EventKind::CommitAddComment,
            EventKind::ProjCreate,
            EventKind::RepoCreate,
        ];
        for kind in kinds {
            for own_action in [false, true] {
                let message = render(&event(kind, own_action));
                assert!(
                    !message.attachments[0].text.trim().is_empty(),
                    "{kind:?} rendered empty text"
                );
                assert!(!message.attachments[0].color.is_empty());
            }
        }
    }

    #[test]
    fn unit_startup_message_is_fixed() {
        let message = startup_message("#firehose");
        assert_eq!(message.channel, "#firehose");
        assert_eq!(
            message.attachments[0].text,
            "Slack Notiphier started running."
        );
        assert_eq!(message.attachments[0].color, COLOR_STARTUP);
    }

    #[test]
    fn regression_missing_comment_body_does_not_render_a_dangling_colon() {
        let mut no_comment = event(EventKind::DiffAddComment, false);
        no_comment.comment = None;
        let message = render(&no_comment);
        assert_eq!(
            message.attachments[0].text,
            "<@U111> commented on diff T7 (Ship the importer)"
        );
    }
}
