//! Event broker request and response types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Event payload: a JSON object.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Number of records returned by listing endpoints when no usable `limit`
/// is given.
pub const DEFAULT_EVENT_LIMIT: usize = 100;

/// Event priority.
///
/// Priority never changes delivery order. It is used for categorisation and
/// for deciding which events raise alerts. `"normal"` is accepted on input as
/// an alias of `medium`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    #[serde(alias = "normal")]
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// A published event, exactly as stored by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    /// Position in the event store, starting at 1.
    pub sequence: u64,
    pub event_type: String,
    pub source_system: String,
    pub target_systems: Vec<String>,
    pub payload: Payload,
    pub priority: Priority,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Shared by every event of one cascade.
    pub correlation_id: String,
}

/// Body of `POST /event/publish`.
///
/// `event_type` and `source_system` are optional here so that the broker,
/// not the deserializer, decides what a missing field means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishEventRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_systems: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl PublishEventRequest {
    /// Start a request with the two mandatory fields set.
    pub fn new(event_type: impl Into<String>, source_system: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            source_system: Some(source_system.into()),
            ..Default::default()
        }
    }

    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_systems = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Response of `POST /event/publish`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishEventResponse {
    pub event_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Ids of the events the reaction rules derived from this one, in
    /// publish order.
    #[serde(default)]
    pub derived_event_ids: Vec<String>,
}

/// Query parameters of `GET /event/events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    /// Only events naming this system in `target_systems`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

/// Response of `GET /event/events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventListResponse {
    pub events: Vec<EventRecord>,
    pub count: usize,
}

/// Body of `POST /event/unified`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedEventRequest {
    pub task_id: String,
    pub user_id: String,
    #[serde(default)]
    pub rl_score: Option<f64>,
    #[serde(default = "consent_default")]
    pub consent_flag: bool,
    pub event_type: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub metadata: Payload,
}

fn consent_default() -> bool {
    true
}

/// Response of `POST /event/unified`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedEventResponse {
    pub status: String,
    pub event_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
}

/// Turn an optional caller-supplied limit into a usable one.
///
/// Missing, zero and negative limits fall back to [`DEFAULT_EVENT_LIMIT`].
pub fn normalize_limit(limit: Option<i64>) -> usize {
    match limit {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
        _ => DEFAULT_EVENT_LIMIT,
    }
}
