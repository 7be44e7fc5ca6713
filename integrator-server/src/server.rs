//! Axum server setup and router configuration.

use crate::api::extractors::QueryParams;
use crate::api::{crm, employee, event, logistics, task};
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, extract::State, routing::get};
use futures_util::future::join_all;
use integrator_core::services::Upstream;
use integrator_sdk::objects::gateway::{
    DependencyStatus, HealthResponse, LogsQuery, LogsResponse, StatusResponse,
};
use integrator_sdk::objects::normalize_limit;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const SYSTEM_NAME: &str = "Unified Integration Gateway";

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health_check))
        .route("/status", get(status))
        .route("/logs", get(logs))
        .nest("/task", task::router())
        .nest("/crm", crm::router())
        .nest("/logistics", logistics::router())
        .nest("/employee", employee::router())
        .nest("/event", event::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct Banner {
    message: &'static str,
    version: &'static str,
    routers: [&'static str; 5],
}

async fn banner() -> Json<Banner> {
    Json(Banner {
        message: SYSTEM_NAME,
        version: env!("CARGO_PKG_VERSION"),
        routers: ["/task", "/crm", "/logistics", "/employee", "/event"],
    })
}

/// Probe every dependency concurrently. The gateway is `degraded` when
/// any probed dependency is down; disabled ones do not count.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (upstreams, compliance) = tokio::join!(
        join_all(Upstream::ALL.map(|service| state.upstream.probe(service))),
        state.compliance.probe(),
    );

    let mut dependencies: BTreeMap<String, _> = Upstream::ALL
        .iter()
        .map(|service| service.key().to_string())
        .zip(upstreams)
        .collect();
    dependencies.insert("compliance".to_string(), compliance);

    let degraded = dependencies
        .values()
        .any(|d| d.status == DependencyStatus::Down);
    let event_broker = if state.broker.is_running().await {
        "running"
    } else {
        "stopped"
    };

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        event_broker: event_broker.to_string(),
        dependencies,
        timestamp: OffsetDateTime::now_utc(),
    })
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        system: SYSTEM_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        broker_running: state.broker.is_running().await,
        events_stored: state.broker.store().len().await,
        reaction_rules: state.broker.rules().len(),
        subscriptions: state.broker.subscription_registry().len().await,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// `GET /logs?limit=`: the most recent events, oldest first.
async fn logs(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<LogsQuery>,
) -> Json<LogsResponse> {
    let logs = state
        .broker
        .store()
        .recent(normalize_limit(query.limit))
        .await;
    Json(LogsResponse {
        count: logs.len(),
        logs,
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
