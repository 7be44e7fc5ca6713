//! Application state shared across all request handlers.

use crate::config::LoadedConfig;
use integrator_core::broker::EventBroker;
use integrator_core::config::SharedConfig;
use integrator_core::entities::{DeliveryRoster, EmployeeStore};
use integrator_core::processors::triggers::{TriggerRunner, TriggerTable};
use integrator_core::services::{AiAdvisor, ComplianceHooks, HttpAdvisor, UpstreamClient};
use std::sync::Arc;
use std::time::Instant;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<EventBroker>,
    /// Runtime configuration (sections can be reloaded via SIGHUP).
    pub config: SharedConfig,
    pub upstream: UpstreamClient,
    pub compliance: ComplianceHooks,
    pub advisor: Arc<dyn AiAdvisor>,
    pub employees: EmployeeStore,
    pub roster: DeliveryRoster,
    pub started_at: Instant,
}

impl AppState {
    /// Build the state from a loaded configuration and register the
    /// configured subscriptions. The broker is not started.
    pub async fn new(loaded: LoadedConfig) -> Self {
        let config = loaded.shared();
        let advisor = HttpAdvisor::new(config.advisor.clone(), loaded.advisor_api_key);
        let broker = EventBroker::new(loaded.rules, config.alerts.clone())
            .with_triggers(trigger_runner(&config, loaded.triggers));
        for subscription in loaded.subscriptions {
            broker.subscribe(subscription).await;
        }

        Self::with_parts(Arc::new(broker), config, Arc::new(advisor))
    }

    /// Assemble the state around an existing broker and advisor.
    pub fn with_parts(
        broker: Arc<EventBroker>,
        config: SharedConfig,
        advisor: Arc<dyn AiAdvisor>,
    ) -> Self {
        Self {
            upstream: UpstreamClient::new(config.upstreams.clone()),
            compliance: ComplianceHooks::new(config.compliance.clone()),
            broker,
            config,
            advisor,
            employees: EmployeeStore::new(),
            roster: DeliveryRoster::default(),
            started_at: Instant::now(),
        }
    }
}

/// Trigger actions against the configured services. Base URLs and the
/// compliance switch follow reloads.
pub fn trigger_runner(config: &SharedConfig, table: TriggerTable) -> TriggerRunner {
    TriggerRunner::new(
        UpstreamClient::new(config.upstreams.clone()),
        ComplianceHooks::new(config.compliance.clone()),
        table,
    )
}
