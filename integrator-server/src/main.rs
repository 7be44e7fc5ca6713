//! Integrator Server
//!
//! A unified gateway in front of the task, CRM and logistics services with
//! an in-process event broker and employee records.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::ConfigLoader;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Unified integration gateway and event broker
#[derive(Parser, Debug)]
#[command(name = "integrator-server", version, about)]
struct Args {
    /// TOML configuration file; defaults apply when it is missing
    #[arg(short, long, default_value = "./integrator-config.toml")]
    config: PathBuf,

    /// Listen address, overriding `server.listen` from the file
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    run(Args::parse()).await
}

async fn run(args: Args) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "integrator-server starting");

    let loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded = loader
        .load()
        .inspect_err(|e| tracing::error!(error = %e, path = %args.config.display(), "Invalid configuration"))?;
    tracing::info!(
        rules = loaded.rules.len(),
        subscriptions = loaded.subscriptions.len(),
        listen = %loaded.listen,
        "Configuration ready"
    );

    let addr = loaded.listen;
    let state = AppState::new(loaded).await;
    let broker = state.broker.clone();
    broker.start().await;

    let reload_stop = shutdown::spawn_config_reload_handler(state.clone(), loader);
    let served = server::run_server(server::build_router(state), addr).await;
    reload_stop.notify_one();

    broker.stop().await;
    tracing::info!(events = broker.store().len().await, "Gateway stopped");
    Ok(served?)
}
