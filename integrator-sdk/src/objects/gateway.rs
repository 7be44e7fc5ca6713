//! Health, status and log views of the gateway.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::event::{EventRecord, Priority};

/// Reachability of one upstream dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStatus {
    Up,
    Down,
    /// The dependency is switched off in configuration and was not probed.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub status: DependencyStatus,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when every probed dependency is up, `degraded` otherwise.
    pub status: String,
    pub version: String,
    pub event_broker: String,
    pub dependencies: BTreeMap<String, DependencyHealth>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Response of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub system: String,
    pub version: String,
    pub broker_running: bool,
    pub events_stored: usize,
    pub reaction_rules: usize,
    pub subscriptions: usize,
    pub uptime_seconds: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Response of `GET /event/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerHealthResponse {
    pub status: String,
    pub subscribers: usize,
    pub events_stored: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Query parameters of `GET /logs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Response of `GET /logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<EventRecord>,
    pub count: usize,
}

/// One row of the reaction rule table as shown by `GET /event/rules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleView {
    pub name: String,
    pub trigger: String,
    /// `path == value`, or `None` when the rule fires on every trigger.
    pub condition: Option<String>,
    pub derived_event_type: String,
    pub target_systems: Vec<String>,
    pub priority: Priority,
}

/// Response of `GET /event/rules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesResponse {
    pub rules: Vec<RuleView>,
}
