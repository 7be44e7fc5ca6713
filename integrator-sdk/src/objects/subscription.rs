//! Webhook subscription types.

use serde::{Deserialize, Serialize};
use url::Url;

/// A system asking the broker to push selected event types to a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub system_name: String,
    pub event_types: Vec<String>,
    pub webhook_url: Url,
    #[serde(default = "active_default")]
    pub active: bool,
}

fn active_default() -> bool {
    true
}

impl Subscription {
    /// Whether an event of `event_type` should be pushed to this subscriber.
    pub fn wants(&self, event_type: &str) -> bool {
        self.active && self.event_types.iter().any(|t| t == event_type)
    }
}

/// Response of `POST /event/subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub status: String,
    pub system: String,
}

/// Response of `GET /event/subscriptions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionsResponse {
    pub subscriptions: Vec<Subscription>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_subscription_wants_nothing() {
        let mut sub: Subscription = serde_json::from_str(
            r#"{"system_name":"crm","event_types":["lead_created"],"webhook_url":"http://crm.local/hook"}"#,
        )
        .unwrap();
        assert!(sub.active);
        assert!(sub.wants("lead_created"));
        assert!(!sub.wants("task_created"));

        sub.active = false;
        assert!(!sub.wants("lead_created"));
    }
}
