//! Process configuration for the webhook shell.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use notiphier_core::ChannelRoutes;
use serde::Deserialize;

fn default_slack_api_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_channel() -> String {
    "#firehose".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
/// TOML configuration for the server binary. The `[channels]` table maps
/// project/repository names to Slack channels; unmapped objects route to the
/// default channel.
pub struct ServerConfig {
    pub phabricator_url: String,
    pub phabricator_token: String,
    #[serde(default = "default_slack_api_url")]
    pub slack_api_url: String,
    pub slack_token: String,
    #[serde(default = "default_channel")]
    pub default_channel: String,
    #[serde(default)]
    pub channels: BTreeMap<String, String>,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn channel_routes(&self) -> ChannelRoutes {
        ChannelRoutes::new(&self.default_channel, self.channels.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::ServerConfig;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn functional_config_parses_channel_table_and_defaults() {
        let file = write_config(
            r##"
phabricator_url = "https://phab.example.com"
phabricator_token = "api-abc"
slack_token = "xoxb-test"
default_channel = "#notiphier"

[channels]
Backend = "#backend"
"deploy-tools" = "#deploys"
"##,
        );
        let config = ServerConfig::load(file.path()).expect("config loads");
        assert_eq!(config.default_channel, "#notiphier");
        assert_eq!(config.slack_api_url, "https://slack.com/api");
        assert_eq!(config.listen_addr, "127.0.0.1:8080");

        let routes = config.channel_routes();
        assert_eq!(routes.channel_for(&["backend".to_string()]), "#backend");
        assert_eq!(routes.channel_for(&["unknown".to_string()]), "#notiphier");
    }

    #[test]
    fn regression_missing_required_keys_fail_with_context() {
        let file = write_config("default_channel = \"#notiphier\"\n");
        let error = ServerConfig::load(file.path()).expect_err("must fail");
        assert!(format!("{error:#}").contains("failed to parse config file"));
    }
}
