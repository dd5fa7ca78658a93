use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use relaysync::protocol::SiteId;
use relaysync::{MemoryChangeLog, SiteIdentity, SyncConfig, SyncNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "relaysync")]
#[command(about = "Relay-based change-log sync node", long_about = None)]
struct Args {
    /// WebSocket relay endpoint
    #[arg(long, default_value = "ws://127.0.0.1:9400/relay")]
    relay_url: String,

    /// Workspace to join on the relay
    #[arg(long, default_value = "default-workspace")]
    workspace: String,

    /// Device identifier (auto-generated if not provided)
    #[arg(long)]
    device_id: Option<String>,

    /// Local site id as 32 hex characters (auto-generated if not provided)
    #[arg(long)]
    site_id: Option<String>,

    /// Seconds between local change broadcasts
    #[arg(long, default_value_t = 30)]
    sync_interval: u64,

    /// Disable compression of large frames
    #[arg(long)]
    no_compression: bool,

    /// Seconds between status log lines (0 disables)
    #[arg(long, default_value_t = 60)]
    status_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relaysync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let identity = build_identity(&args)?;
    tracing::info!(
        "Device {} (site {})",
        identity.device_id,
        identity.site_id.short()
    );

    let config = SyncConfig::new(&args.relay_url, &args.workspace)
        .with_sync_interval(Duration::from_secs(args.sync_interval.max(1)))
        .with_compression(!args.no_compression, 1024);

    let store = Arc::new(MemoryChangeLog::new(identity.site_id.clone()));
    let node = Arc::new(SyncNode::new(identity, config, store));
    node.start().await?;

    if args.status_interval > 0 {
        let status_node = node.clone();
        tokio::spawn(async move {
            let mut timer =
                tokio::time::interval(Duration::from_secs(args.status_interval));
            timer.tick().await;
            loop {
                timer.tick().await;
                let status = status_node.status();
                tracing::info!(
                    "Status: relay={} peers={} version={} sent={} received={}",
                    status.relay_connected,
                    status.connections.len(),
                    status.database.version,
                    status.counters.messages_sent,
                    status.counters.messages_received
                );
            }
        });
    }

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");
    node.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

fn build_identity(args: &Args) -> anyhow::Result<SiteIdentity> {
    let site_id = match &args.site_id {
        Some(hex_id) => {
            let bytes = hex::decode(hex_id)?;
            let site = SiteId::new(bytes);
            if !site.is_valid() {
                anyhow::bail!("site id must be exactly {} bytes of hex", SiteId::LEN);
            }
            site
        }
        None => SiteId::random(),
    };

    Ok(match &args.device_id {
        Some(device_id) => SiteIdentity::new(device_id, site_id),
        None => SiteIdentity::new(uuid::Uuid::new_v4().to_string(), site_id),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
