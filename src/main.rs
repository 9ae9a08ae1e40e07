use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use routing_gateway::config::load_config;
use routing_gateway::observability::{logging, metrics};
use routing_gateway::store::watcher::RulesWatcher;
use routing_gateway::{HttpServer, Shutdown, SnapshotStore};

#[derive(Parser)]
#[command(name = "routing-gateway")]
#[command(about = "Rule-driven API routing gateway", long_about = None)]
struct Args {
    /// Path to the gateway configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init(&config.observability.log_filter);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rules_path = %config.rules.path,
        request_timeout_secs = config.timeouts.request_secs,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "failed to parse metrics address"
            ),
        }
    }

    let rules_path = Path::new(&config.rules.path).to_path_buf();
    let store = Arc::new(SnapshotStore::load(&rules_path)?);

    // The watcher handle must stay alive for reloads to keep flowing.
    let _watcher = if config.rules.watch {
        Some(RulesWatcher::new(&rules_path, store.clone()).run()?)
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = HttpServer::new(config, store);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
