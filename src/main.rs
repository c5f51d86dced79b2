use std::sync::Arc;
use std::time::Duration;

use benchscope::adapters::TungsteniteTransport;
use benchscope::cli::{handle_version_command, parse_args, CliCommand, WatchOptions};
use benchscope::config::TelemetryConfig;
use benchscope::metrics::MetricsSnapshot;
use benchscope::stream::{BackoffPolicy, ConnectionState, OutboundMessage, TelemetryClient};

use color_eyre::eyre::{eyre, Result};
use color_eyre::Section;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let options = match parse_args(std::env::args()) {
        CliCommand::Version => handle_version_command(),
        CliCommand::Invalid(message) => {
            eprintln!("Error: {}", message);
            eprintln!("Usage: benchscope [--endpoint URL] [--fixed] [--version]");
            std::process::exit(2);
        }
        CliCommand::Watch(options) => options,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "benchscope=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    watch(options).await
}

async fn watch(options: WatchOptions) -> Result<()> {
    let mut config = TelemetryConfig::from_env();
    if options.fixed {
        config.retry = BackoffPolicy::fixed(config.retry.base_delay)
            .with_max_attempts(config.retry.max_attempts);
    }
    if let Some(endpoint) = options.endpoint {
        config = config.with_endpoint(endpoint);
    }
    config.validate().map_err(|e| {
        eyre!("invalid configuration [{}]: {}", e.error_code(), e)
            .note(e.category().description())
            .suggestion(e.recovery_hint())
    })?;
    let endpoint = config.metrics_endpoint()?;

    info!(
        endpoint = %endpoint,
        strategy = ?config.retry.strategy,
        max_attempts = config.retry.max_attempts,
        "Starting telemetry stream"
    );

    let transport =
        Arc::new(TungsteniteTransport::new().with_connect_timeout(Duration::from_secs(10)));
    let client = TelemetryClient::from_config(transport, &config);
    let subscription = client.subscribe(endpoint, config.retry.clone());
    let mut view = subscription.view();
    let mut last_state = view.state();
    let mut last_version = None;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, unsubscribing");
                break;
            }
            alive = view.changed() => {
                if !alive {
                    break;
                }
                let state = view.state();
                if state != last_state {
                    if state.is_open() {
                        subscription.send(&OutboundMessage::RequestSnapshot);
                    }
                    if let ConnectionState::Failed { reason } = &state {
                        warn!(
                            last_error = view.last_error().as_deref().unwrap_or_default(),
                            "Stream failed: {}. Press Ctrl-C to exit.",
                            reason
                        );
                    }
                    last_state = state;
                }
                if let Some(snapshot) = view.snapshot() {
                    if last_version != Some(snapshot.version) {
                        last_version = Some(snapshot.version);
                        log_snapshot(&snapshot);
                    }
                }
            }
        }
    }

    subscription.unsubscribe();
    Ok(())
}

fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        version = snapshot.version,
        cpu = ?snapshot.cpu_usage,
        memory_pct = ?snapshot.memory_used_percent(),
        gpus = snapshot.accelerator_count(),
        gpu_util = ?snapshot.average_gpu_utilization(),
        peak_temp = ?snapshot.peak_gpu_temp(),
        power_w = ?snapshot.total_power_draw(),
        tps = ?snapshot.tokens_per_second,
        avg_tps = ?snapshot.history.average_tokens_per_second(),
        latency = ?snapshot.latency,
        progress = ?snapshot.progress.as_ref().map(|p| p.percent_complete()),
        "Telemetry"
    );
}
