//! Deadline-aware message consumer.
//!
//! Reads newline-delimited JSON envelopes from stdin, publishes them to an
//! in-memory broker, and consumes them through the deadline middleware.
//!
//! ```text
//! {"headers": {"x-deadline": "2030-01-01T00:00:00Z", "x-work-ms": "250"}, "payload": "job-1"}
//! ```
//!
//! The demo handler sleeps for `x-work-ms` milliseconds and fails for the
//! payload `fail`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tower::{service_fn, ServiceBuilder};

use deadline_propagation::broker::{self, Consumer, Envelope, Publisher};
use deadline_propagation::config::{load_config, validate_config, AppConfig};
use deadline_propagation::context;
use deadline_propagation::lifecycle::{shutdown_on_signal, Shutdown};
use deadline_propagation::middleware::DeadlineLayer;
use deadline_propagation::observability::{logging, metrics};

/// Header telling the demo handler how long to work.
const WORK_HEADER: &str = "x-work-ms";

#[derive(Parser)]
#[command(name = "deadline-propagation")]
#[command(about = "Consume messages under propagated processing deadlines", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the default time budget, in seconds.
    #[arg(long)]
    default_timeout: Option<f64>,
}

#[derive(Debug, Error)]
enum HandlerError {
    #[error("payload rejected: {0}")]
    Rejected(String),
}

async fn handle(envelope: Envelope) -> Result<(), HandlerError> {
    let work = envelope
        .headers
        .get(WORK_HEADER)
        .and_then(|ms| ms.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or_default();

    tracing::info!(
        payload = %envelope.payload,
        work_ms = work.as_millis() as u64,
        remaining_secs = ?context::remaining_secs(),
        "Handling message"
    );
    tokio::time::sleep(work).await;

    if envelope.payload == "fail" {
        return Err(HandlerError::Rejected(envelope.payload));
    }
    tracing::info!(remaining_secs = ?context::remaining_secs(), "Message handled");
    Ok(())
}

async fn read_stdin(publisher: Publisher) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match serde_json::from_str::<Envelope>(&line) {
                Ok(envelope) => {
                    if let Err(e) = publisher.publish(envelope).await {
                        tracing::error!(error = %e, "Publish failed");
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, line = %line, "Skipping invalid envelope"),
            },
            Ok(None) => {
                tracing::info!("End of input");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(secs) = cli.default_timeout {
        config.deadline.default_timeout_secs = Some(secs);
        validate_config(&config).map_err(|errors| {
            errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        })?;
    }

    logging::init_logging(&config.observability);
    tracing::info!(
        header = %config.deadline.header,
        default_timeout_secs = ?config.deadline.default_timeout_secs,
        max_in_flight = config.consumer.max_in_flight,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let service = ServiceBuilder::new()
        .layer(DeadlineLayer::from_config(&config.deadline))
        .service(service_fn(handle));

    let (publisher, subscription) = broker::channel(config.consumer.queue_capacity);
    tokio::spawn(read_stdin(publisher));

    let consumer = Consumer::new(service, config.consumer.clone());
    let stats = consumer.run(subscription, shutdown.subscribe()).await;

    tracing::info!(processed = stats.total(), "Shutdown complete");
    Ok(())
}
