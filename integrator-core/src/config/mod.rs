//! Runtime configuration shared between the gateway and its background
//! processors.
//!
//! These are the validated forms. Loading and parsing live in the server
//! crate.

use std::sync::Arc;

use tokio::sync::RwLock;
use url::Url;

/// Base URLs of the proxied business services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamsConfig {
    pub task_base_url: Url,
    pub crm_base_url: Url,
    pub logistics_base_url: Url,
}

/// External compliance service. Every check allows when disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceConfig {
    pub enabled: bool,
    pub url: Url,
    pub api_key: Option<String>,
}

/// AI advisor endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorConfig {
    pub uniguru_url: Url,
    pub gurukul_url: Url,
}

/// Which events raise alerts and where alerts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    pub event_types: Vec<String>,
    pub slack_webhook_url: Option<Url>,
    pub teams_webhook_url: Option<Url>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            event_types: vec![
                "inventory_low".to_string(),
                "delivery_delayed".to_string(),
                "compliance_violation".to_string(),
            ],
            slack_webhook_url: None,
            teams_webhook_url: None,
        }
    }
}

/// Shared configuration state with separate locks for each section.
///
/// Sections are replaced independently on reload.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    pub upstreams: Arc<RwLock<UpstreamsConfig>>,
    pub compliance: Arc<RwLock<ComplianceConfig>>,
    pub advisor: Arc<RwLock<AdvisorConfig>>,
    pub alerts: Arc<RwLock<AlertConfig>>,
}

impl SharedConfig {
    pub fn new(
        upstreams: UpstreamsConfig,
        compliance: ComplianceConfig,
        advisor: AdvisorConfig,
        alerts: AlertConfig,
    ) -> Self {
        Self {
            upstreams: Arc::new(RwLock::new(upstreams)),
            compliance: Arc::new(RwLock::new(compliance)),
            advisor: Arc::new(RwLock::new(advisor)),
            alerts: Arc::new(RwLock::new(alerts)),
        }
    }
}
