use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use stepwatch::{relay, Overrides, RelayConfig, SnapshotListener};
use stepwatch_forwarder::{AmqpPublisher, Forwarder};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Snapshots buffered between the listener and the broker.
const RELAY_BUFFER: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "stepwatch-relay")]
#[command(about = "Receive stepwatch activity snapshots and forward them to a message broker")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to accept agent connections on (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// AMQP broker URI
    #[arg(long)]
    broker_url: Option<String>,

    /// Queue to publish documents to
    #[arg(short, long)]
    queue: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            listen: self.listen.clone(),
            broker_url: self.broker_url.clone(),
            queue: self.queue.clone(),
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let config = RelayConfig::load(args.config.as_deref(), &args.overrides())?;
    info!(listen = %config.listen, queue = %config.broker.queue, "Starting relay");

    let publisher = AmqpPublisher::connect(&config.broker)
        .await
        .with_context(|| format!("Failed to connect to broker at {}", config.broker.broker_url))?;
    let mut forwarder = Forwarder::new(publisher);

    let listener = SnapshotListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to listen on {}", config.listen))?;

    let (tx, rx) = mpsc::channel(RELAY_BUFFER);
    let accept = tokio::spawn(listener.run(tx));

    tokio::select! {
        stats = relay(rx, &mut forwarder) => {
            warn!(forwarded = stats.forwarded, failed = stats.failed, "Listener stopped");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to wait for Ctrl-C")?;
            info!("Shutting down");
        }
    }

    accept.abort();
    forwarder.close().await.context("Failed to close forwarder")?;
    Ok(())
}
