//! Project/repository tag to Slack channel routing.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Configured routing table. Objects whose tags match no entry go to the
/// default channel.
pub struct ChannelRoutes {
    default_channel: String,
    channels: BTreeMap<String, String>,
}

impl ChannelRoutes {
    pub fn new(default_channel: &str, channels: BTreeMap<String, String>) -> Self {
        let channels = channels
            .into_iter()
            .map(|(tag, channel)| (tag.trim().to_lowercase(), channel))
            .collect();
        Self {
            default_channel: default_channel.to_string(),
            channels,
        }
    }

    pub fn default_channel(&self) -> &str {
        &self.default_channel
    }

    /// First tag with a mapped channel wins; tag order is the resolved
    /// object's project order, then its repository.
    pub fn channel_for(&self, route_tags: &[String]) -> String {
        route_tags
            .iter()
            .find_map(|tag| self.channels.get(&tag.trim().to_lowercase()))
            .cloned()
            .unwrap_or_else(|| self.default_channel.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::ChannelRoutes;

    fn routes() -> ChannelRoutes {
        let mut channels = BTreeMap::new();
        channels.insert("Backend".to_string(), "#backend".to_string());
        channels.insert("infra".to_string(), "#infra".to_string());
        ChannelRoutes::new("#firehose", channels)
    }

    #[test]
    fn unit_mapped_tag_routes_to_its_channel() {
        let channel = routes().channel_for(&["backend".to_string()]);
        assert_eq!(channel, "#backend");
    }

    #[test]
    fn unit_first_mapped_tag_wins() {
        let channel = routes().channel_for(&["unmapped".to_string(), "infra".to_string()]);
        assert_eq!(channel, "#infra");
    }

    #[test]
    fn unit_untagged_objects_route_to_the_default_channel() {
        let routes = routes();
        assert_eq!(routes.channel_for(&[]), "#firehose");
        assert_eq!(routes.channel_for(&["sandbox".to_string()]), "#firehose");
    }
}
