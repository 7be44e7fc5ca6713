//! Signal handling for graceful shutdown and config reload.

use crate::config::{ConfigLoader, LoadedConfig};
use crate::state::AppState;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;

/// Completes on SIGTERM or SIGINT.
///
/// Falls back to `tokio::signal::ctrl_c` when the Unix handlers cannot be
/// installed.
pub async fn shutdown_signal() {
    let handlers = signal(SignalKind::terminate())
        .and_then(|term| signal(SignalKind::interrupt()).map(|int| (term, int)));
    let (mut sigterm, mut sigint) = match handlers {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(error = %e, "Signal handlers unavailable, waiting for Ctrl+C");
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Received Ctrl+C, initiating graceful shutdown"),
                Err(e) => {
                    tracing::error!(error = %e, "Cannot listen for Ctrl+C either");
                    std::future::pending::<()>().await;
                }
            }
            return;
        }
    };

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    tracing::info!(signal = received, "Initiating graceful shutdown");
}

/// Swap the reloadable sections of `state` for freshly loaded ones.
///
/// Upstream base URLs, compliance, advisor endpoints and alerts change in
/// place. Rules, subscriptions, the listen address and the advisor API key
/// keep their startup values.
pub async fn apply_reload(state: &AppState, loaded: LoadedConfig) {
    {
        let mut upstreams = state.config.upstreams.write().await;
        if *upstreams != loaded.upstreams {
            tracing::info!(
                task = %loaded.upstreams.task_base_url,
                crm = %loaded.upstreams.crm_base_url,
                logistics = %loaded.upstreams.logistics_base_url,
                "Upstream base URLs changed"
            );
        }
        *upstreams = loaded.upstreams;
    }
    {
        let mut compliance = state.config.compliance.write().await;
        if compliance.enabled != loaded.compliance.enabled {
            tracing::info!(enabled = loaded.compliance.enabled, "Compliance checks toggled");
        }
        *compliance = loaded.compliance;
    }
    *state.config.advisor.write().await = loaded.advisor;
    *state.config.alerts.write().await = loaded.alerts;
}

/// Spawns a task that reloads the configuration on every SIGHUP until the
/// returned `Notify` fires.
pub fn spawn_config_reload_handler(state: AppState, config_loader: Arc<ConfigLoader>) -> Arc<Notify> {
    let stop = Arc::new(Notify::new());
    let stopped = stop.clone();

    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(e) => {
                tracing::error!(error = %e, "SIGHUP handler unavailable, config reload disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sighup.recv() => match config_loader.reload() {
                    Ok(loaded) => {
                        apply_reload(&state, loaded).await;
                        tracing::info!("Configuration reloaded");
                    }
                    Err(e) => tracing::error!(error = %e, "Reload failed, keeping current configuration"),
                },
                _ = stopped.notified() => {
                    tracing::debug!("Config reload handler stopping");
                    break;
                }
            }
        }
    });

    stop
}
