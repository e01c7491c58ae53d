//! Webhook-listening shell hosting the Notiphier core pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use notiphier_core::{ConduitClient, SlackWebClient, WebhookFirehose};

mod server_config;

use server_config::ServerConfig;

#[derive(Debug, Parser)]
#[command(name = "notiphier", about = "Bridges the platform Firehose to Slack")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "NOTIPHIER_CONFIG_FILE", default_value = "notiphier.toml")]
    config: PathBuf,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config)?;

    let phab = ConduitClient::new(
        &config.phabricator_url,
        &config.phabricator_token,
        config.request_timeout_ms,
    )?;
    let slack = SlackWebClient::new(
        &config.slack_api_url,
        &config.slack_token,
        config.request_timeout_ms,
    )?;
    let firehose =
        WebhookFirehose::new(Arc::new(phab), Arc::new(slack), config.channel_routes()).await?;

    let app = Router::new()
        .route("/firehose", post(handle_firehose))
        .route("/healthz", get(healthz))
        .with_state(Arc::new(firehose));

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "notiphier listening");
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}

async fn handle_firehose(
    State(firehose): State<Arc<WebhookFirehose>>,
    Json(payload): Json<Value>,
) -> StatusCode {
    match firehose.handle(&payload).await {
        Ok(report) => {
            tracing::info!(
                transactions = report.transactions_seen,
                sent = report.notifications_sent,
                skipped = report.skipped_unclassified,
                dropped = report.dropped_unresolved,
                failed = report.failed_deliveries,
                "delivery processed"
            );
            StatusCode::ACCEPTED
        }
        Err(error) => {
            tracing::warn!(error = %error, "rejected delivery");
            StatusCode::BAD_REQUEST
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}
