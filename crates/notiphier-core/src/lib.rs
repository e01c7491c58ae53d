//! Notiphier core: resolves platform Firehose transactions into Slack
//! notifications.
//!
//! The pipeline is [`firehose::WebhookFirehose`]; the collaborator seams are
//! [`phab_client::PhabClient`] and [`slack_client::SlackClient`] so the whole
//! engine can run against canned responses in tests. The hosting HTTP shell
//! lives in the `notiphier-server` crate.

pub mod channel_routing;
pub mod event_classifier;
pub mod firehose;
pub mod firehose_contract;
pub mod mention_resolver;
pub mod message_renderer;
pub mod notification_dispatcher;
pub mod phab_client;
pub mod platform_resolver;
pub mod slack_client;
pub mod user_directory;

#[cfg(test)]
pub(crate) mod test_support;

pub use channel_routing::ChannelRoutes;
pub use firehose::WebhookFirehose;
pub use firehose_contract::{
    Attachment, EventKind, FirehoseReport, NotificationEvent, ObjectType, RenderedMessage,
    Transaction, UserIdentity, WebhookDelivery,
};
pub use phab_client::{ConduitClient, PhabClient};
pub use slack_client::{SlackClient, SlackWebClient};
pub use user_directory::UserDirectory;
