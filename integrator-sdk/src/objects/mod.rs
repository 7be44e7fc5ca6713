pub mod employee;
pub mod event;
pub mod gateway;
pub mod subscription;

pub use event::{
    DEFAULT_EVENT_LIMIT, EventListQuery, EventListResponse, EventRecord, Payload, Priority,
    PublishEventRequest, PublishEventResponse, UnifiedEventRequest, UnifiedEventResponse,
    normalize_limit,
};
pub use subscription::Subscription;

use serde::{Deserialize, Serialize};

/// Body returned by every failed gateway request.
///
/// ```json
/// {"status": "error", "detail": "task service unavailable: ..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub detail: String,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            detail: detail.into(),
        }
    }
}

/// Acknowledgement returned by the inbound webhook endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
}

impl WebhookAck {
    pub fn processed() -> Self {
        Self {
            status: "processed".to_string(),
        }
    }
}
