//! Notifier processor.
//!
//! The Notifier is responsible for:
//! - Receiving appended event records from the broker queue
//! - POSTing each record to every active subscription that wants its type
//! - Raising alerts for configured event types and critical events, via
//!   Slack and Teams webhooks or the console when neither is configured
//!
//! Delivery is best effort: one attempt per subscriber, no retries.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use integrator_sdk::objects::{EventRecord, Priority, Subscription};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::broker::SubscriptionRegistry;
use crate::config::AlertConfig;
use crate::events::NotificationReceiver;

/// Timeout of every outbound webhook call.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },
}

pub struct Notifier {
    rx: NotificationReceiver,
    shutdown_rx: watch::Receiver<bool>,
    subscriptions: SubscriptionRegistry,
    alerts: Arc<RwLock<AlertConfig>>,
    http_client: reqwest::Client,
}

impl Notifier {
    pub fn new(
        rx: NotificationReceiver,
        shutdown_rx: watch::Receiver<bool>,
        subscriptions: SubscriptionRegistry,
        alerts: Arc<RwLock<AlertConfig>>,
    ) -> Self {
        Self {
            rx,
            shutdown_rx,
            subscriptions,
            alerts,
            http_client: reqwest::Client::builder()
                .timeout(WEBHOOK_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub async fn run(mut self) {
        info!("Notifier started");

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Notifier received shutdown signal");
                        break;
                    }
                }

                Some(record) = self.rx.recv() => {
                    self.process(record).await;
                }

                else => {
                    info!("Notification channel closed");
                    break;
                }
            }
        }

        info!("Notifier shutdown complete");
    }

    async fn process(&self, record: EventRecord) {
        let subscribers = self.subscriptions.interested_in(&record.event_type).await;
        if !subscribers.is_empty() {
            self.fan_out(&record, &subscribers).await;
        }

        let alerts = self.alerts.read().await.clone();
        if should_alert(&alerts, &record) {
            self.alert(&alerts, &record).await;
        }
    }

    async fn fan_out(&self, record: &EventRecord, subscribers: &[Subscription]) {
        let body = match serde_json::to_value(record) {
            Ok(body) => body,
            Err(e) => {
                warn!(event_id = %record.event_id, error = %e, "Failed to serialize event");
                return;
            }
        };

        let body = &body;
        let deliveries = subscribers
            .iter()
            .map(|sub| async move { (sub, self.post_json(&sub.webhook_url, body).await) });

        for (sub, result) in join_all(deliveries).await {
            match result {
                Ok(()) => debug!(
                    event_id = %record.event_id,
                    system = %sub.system_name,
                    "Webhook delivered"
                ),
                Err(e) => warn!(
                    event_id = %record.event_id,
                    system = %sub.system_name,
                    error = %e,
                    "Webhook delivery failed"
                ),
            }
        }
    }

    async fn alert(&self, alerts: &AlertConfig, record: &EventRecord) {
        if alerts.slack_webhook_url.is_none() && alerts.teams_webhook_url.is_none() {
            warn!(
                event_id = %record.event_id,
                event_type = %record.event_type,
                source = %record.source_system,
                priority = %record.priority,
                payload = %serde_json::Value::Object(record.payload.clone()),
                "ALERT"
            );
            return;
        }

        if let Some(url) = &alerts.slack_webhook_url {
            match self.post_json(url, &slack_message(record)).await {
                Ok(()) => info!(event_id = %record.event_id, "Slack alert sent"),
                Err(e) => warn!(event_id = %record.event_id, error = %e, "Slack alert failed"),
            }
        }
        if let Some(url) = &alerts.teams_webhook_url {
            match self.post_json(url, &teams_message(record)).await {
                Ok(()) => info!(event_id = %record.event_id, "Teams alert sent"),
                Err(e) => warn!(event_id = %record.event_id, error = %e, "Teams alert failed"),
            }
        }
    }

    async fn post_json(&self, url: &Url, body: &Value) -> Result<(), NotifyError> {
        let response = self.http_client.post(url.clone()).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotifyError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Configured alert types and every critical event raise an alert.
pub fn should_alert(alerts: &AlertConfig, record: &EventRecord) -> bool {
    record.priority == Priority::Critical
        || alerts.event_types.iter().any(|t| *t == record.event_type)
}

/// `inventory_low` becomes `Inventory Low`.
fn title(event_type: &str) -> String {
    event_type
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn pretty_payload(record: &EventRecord) -> String {
    serde_json::to_string_pretty(&record.payload).unwrap_or_default()
}

fn slack_message(record: &EventRecord) -> Value {
    json!({
        "text": format!("Integrator alert: {}", record.event_type),
        "blocks": [
            {
                "type": "header",
                "text": {"type": "plain_text", "text": title(&record.event_type)}
            },
            {
                "type": "section",
                "fields": [
                    {"type": "mrkdwn", "text": format!("*Source:* {}", record.source_system)},
                    {"type": "mrkdwn", "text": format!("*Priority:* {}", record.priority)},
                    {"type": "mrkdwn", "text": format!("*Event ID:* {}", record.event_id)},
                    {"type": "mrkdwn", "text": format!("*Time:* {}", record.timestamp)}
                ]
            },
            {
                "type": "section",
                "text": {"type": "mrkdwn", "text": format!("*Details:* {}", pretty_payload(record))}
            }
        ]
    })
}

fn teams_message(record: &EventRecord) -> Value {
    let theme = if record.priority >= Priority::High {
        "0076D7"
    } else {
        "FFA500"
    };
    json!({
        "@type": "MessageCard",
        "@context": "http://schema.org/extensions",
        "themeColor": theme,
        "summary": format!("Integrator alert: {}", record.event_type),
        "sections": [{
            "activityTitle": title(&record.event_type),
            "activitySubtitle": format!(
                "Source: {} | Priority: {}",
                record.source_system, record.priority
            ),
            "facts": [
                {"name": "Event ID:", "value": record.event_id},
                {"name": "Timestamp:", "value": record.timestamp.to_string()},
                {"name": "Correlation ID:", "value": record.correlation_id}
            ],
            "text": format!("**Payload:**\n```\n{}\n```", pretty_payload(record))
        }]
    })
}
