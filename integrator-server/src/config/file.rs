//! TOML file configuration structures.
//!
//! These structs directly map to the `integrator-config.toml` file format.
//! Every section is optional; an empty file describes a gateway talking to
//! services on localhost.

use integrator_core::processors::triggers::TriggerTable;
use integrator_core::reactions::ReactionRule;
use integrator_sdk::objects::Subscription;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstreams: UpstreamsConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// Webhook subscriptions registered at startup.
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    /// Extra reaction rules, appended after the built-in table.
    #[serde(default)]
    pub reactions: Vec<ReactionRule>,
    /// Trigger actions per event type. An entry replaces the built-in one
    /// for that event type; an empty list switches it off.
    #[serde(default)]
    pub triggers: TriggerTable,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Base URLs of the proxied services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamsConfig {
    #[serde(default = "default_task_url")]
    pub task_base_url: String,
    #[serde(default = "default_crm_url")]
    pub crm_base_url: String,
    #[serde(default = "default_logistics_url")]
    pub logistics_base_url: String,
}

impl Default for UpstreamsConfig {
    fn default() -> Self {
        Self {
            task_base_url: default_task_url(),
            crm_base_url: default_crm_url(),
            logistics_base_url: default_logistics_url(),
        }
    }
}

fn default_task_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_crm_url() -> String {
    "http://localhost:8502".to_string()
}

fn default_logistics_url() -> String {
    "http://localhost:8000".to_string()
}

/// Compliance service section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_compliance_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_compliance_url(),
            api_key: None,
        }
    }
}

fn default_compliance_url() -> String {
    "http://localhost:8007".to_string()
}

/// AI advisor section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "default_advisor_url")]
    pub uniguru_url: String,
    #[serde(default = "default_advisor_url")]
    pub gurukul_url: String,
    /// Sent with every advisor request. Read once at startup.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            uniguru_url: default_advisor_url(),
            gurukul_url: default_advisor_url(),
            api_key: None,
        }
    }
}

fn default_advisor_url() -> String {
    "http://localhost:8001".to_string()
}

/// Alerting section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_alert_event_types")]
    pub event_types: Vec<String>,
    #[serde(default)]
    pub slack_webhook_url: Option<String>,
    #[serde(default)]
    pub teams_webhook_url: Option<String>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            event_types: default_alert_event_types(),
            slack_webhook_url: None,
            teams_webhook_url: None,
        }
    }
}

fn default_alert_event_types() -> Vec<String> {
    integrator_core::config::AlertConfig::default().event_types
}

#[cfg(test)]
mod tests {
    use super::*;
    use integrator_core::processors::triggers::TriggerAction;
    use integrator_core::reactions::Condition;
    use integrator_sdk::objects::Priority;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[upstreams]
task_base_url = "http://tasks.internal:9000"
crm_base_url = "http://crm.internal"

[compliance]
enabled = true
url = "http://compliance.internal"
api_key = "k-123"

[advisor]
uniguru_url = "http://uniguru.internal"

[alerts]
event_types = ["inventory_low"]
slack_webhook_url = "https://hooks.slack.com/services/T/B/X"

[[subscriptions]]
system_name = "crm"
event_types = ["task_completed", "task_escalated"]
webhook_url = "http://crm.internal/hooks/events"

[[reactions]]
name = "vip_lead"
trigger = "lead_created"
condition = { kind = "field_equals", path = "request.tier", value = "vip" }
derived = { event_type = "vip_lead_created", target_systems = ["task_manager"], priority = "high" }

[triggers]
order_created = ["create_task"]
delivery_delayed = []
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.upstreams.task_base_url, "http://tasks.internal:9000");
        // Unset keys keep their defaults.
        assert_eq!(config.upstreams.logistics_base_url, "http://localhost:8000");
        assert!(config.compliance.enabled);
        assert_eq!(config.compliance.api_key.as_deref(), Some("k-123"));
        assert_eq!(config.advisor.gurukul_url, "http://localhost:8001");
        assert_eq!(config.alerts.event_types, vec!["inventory_low"]);
        assert!(config.alerts.teams_webhook_url.is_none());

        assert_eq!(config.subscriptions.len(), 1);
        assert!(config.subscriptions[0].active);
        assert!(config.subscriptions[0].wants("task_escalated"));

        let rule = &config.reactions[0];
        assert_eq!(rule.trigger, "lead_created");
        assert_eq!(rule.condition, Condition::field_equals("request.tier", "vip"));
        assert_eq!(rule.derived.priority, Priority::High);
        assert_eq!(rule.derived.payload_from, None);

        assert_eq!(config.triggers["order_created"], vec![TriggerAction::CreateTask]);
        assert!(config.triggers["delivery_delayed"].is_empty());
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.upstreams.crm_base_url, "http://localhost:8502");
        assert!(!config.compliance.enabled);
        assert_eq!(config.compliance.url, "http://localhost:8007");
        assert_eq!(
            config.alerts.event_types,
            vec!["inventory_low", "delivery_delayed", "compliance_violation"]
        );
        assert!(config.subscriptions.is_empty());
        assert!(config.reactions.is_empty());
        assert!(config.triggers.is_empty());
    }
}
