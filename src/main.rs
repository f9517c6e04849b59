use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use relay_core::schedule::DelaySchedule;
use relay_engine::{HttpClientConfig, HttpInquiryClient, PollOrchestrator, SessionRegistry};
use relay_settings::RelaySettings;
use relay_telemetry::TelemetryConfig;

/// Relay between browser SSE sessions and a polled external inquiry API.
#[derive(Debug, Parser)]
#[command(name = "inquiry-relay", version)]
struct Args {
    /// Settings file (defaults to ~/.inquiry-relay/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Bind address, overriding settings.
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overriding settings.
    #[arg(long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level = level.clone();
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => relay_settings::load_settings_from_path(path),
        None => relay_settings::load_settings(),
    }
    .context("failed to load settings")?;
    args.apply(&mut settings);

    let telemetry = TelemetryConfig::from_level_str(&settings.logging.level, settings.logging.json)?;
    relay_telemetry::init_telemetry(&telemetry)?;

    tracing::info!("Starting inquiry relay");

    let schedule = DelaySchedule::from_config(&settings.polling.intervals);

    let client = HttpInquiryClient::new(HttpClientConfig {
        base_url: settings.external.base_url.clone(),
        start_path: settings.external.start_path.clone(),
        status_path: settings.external.status_path.clone(),
        request_timeout: Duration::from_millis(settings.external.request_timeout_ms),
    })?;

    let orchestrator = Arc::new(PollOrchestrator::new(
        Arc::new(client),
        Arc::new(SessionRegistry::new()),
        schedule,
    ));

    let config = relay_server::ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        keep_alive: Duration::from_secs(settings.server.keep_alive_secs),
        cors_origins: settings.server.cors_origins.clone(),
    };
    let handle = relay_server::start(config, Arc::clone(&orchestrator))
        .await
        .context("failed to start server")?;

    tracing::info!(port = handle.port, "Inquiry relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    let cancelled = orchestrator.cancel_all();
    handle.abort();
    tracing::info!(cancelled, "Shutting down");
    Ok(())
}
