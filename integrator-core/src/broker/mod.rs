//! The in-process event broker.
//!
//! Publishing validates the event, appends it to the [`EventStore`], then
//! runs the reaction cascade: every rule matching an appended record fires
//! in declaration order and derived records are processed breadth-first.
//! Trigger actions then run for each appended record, and the events they
//! ask for go through the same cascade. Every appended record is also
//! handed to the background notifier when it is running. Publishing never
//! waits for the notifier.

mod subscriptions;

pub use subscriptions::SubscriptionRegistry;

use std::collections::VecDeque;
use std::sync::Arc;

use integrator_sdk::objects::{
    EventRecord, PublishEventRequest, PublishEventResponse, Subscription,
};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AlertConfig;
use crate::events::{
    EventStore, EventValidationError, NewEvent, NotificationSender, notification_channel,
};
use crate::processors::notifier::Notifier;
use crate::processors::triggers::TriggerRunner;
use crate::reactions::RuleSet;

/// Longest chain of derived events one publish may produce.
pub const MAX_CASCADE_DEPTH: usize = 8;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid event: {0}")]
    Validation(#[from] EventValidationError),
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishResult {
    pub event_id: String,
    pub timestamp: OffsetDateTime,
    pub correlation_id: String,
    /// In the order they were appended.
    pub derived_event_ids: Vec<String>,
}

impl From<PublishResult> for PublishEventResponse {
    fn from(result: PublishResult) -> Self {
        PublishEventResponse {
            event_id: result.event_id,
            timestamp: result.timestamp,
            derived_event_ids: result.derived_event_ids,
        }
    }
}

struct RunningNotifier {
    tx: NotificationSender,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct EventBroker {
    store: EventStore,
    rules: Arc<RuleSet>,
    subscriptions: SubscriptionRegistry,
    alerts: Arc<RwLock<AlertConfig>>,
    triggers: Option<TriggerRunner>,
    notifier: Mutex<Option<RunningNotifier>>,
}

impl EventBroker {
    pub fn new(rules: RuleSet, alerts: Arc<RwLock<AlertConfig>>) -> Self {
        Self {
            store: EventStore::new(),
            rules: Arc::new(rules),
            subscriptions: SubscriptionRegistry::new(),
            alerts,
            triggers: None,
            notifier: Mutex::new(None),
        }
    }

    /// Run `triggers` for every appended record.
    pub fn with_triggers(mut self, triggers: TriggerRunner) -> Self {
        self.triggers = Some(triggers);
        self
    }

    /// Publish `event` and everything the reaction rules derive from it.
    ///
    /// Nothing is stored when validation fails. Once this returns, the
    /// primary event and every derived event are visible in the store, and
    /// the trigger actions of each of them have run.
    pub async fn publish(&self, event: NewEvent) -> Result<PublishResult, BrokerError> {
        event.validate()?;
        let sender = self.notification_sender().await;

        let primary = self.store.append(event).await;
        info!(
            event_id = %primary.event_id,
            event_type = %primary.event_type,
            source = %primary.source_system,
            "Event published"
        );
        Self::notify(sender.as_ref(), &primary);

        let mut derived_event_ids = Vec::new();
        let mut round = vec![(primary.clone(), 0usize)];
        while !round.is_empty() {
            let appended = self
                .cascade(round, sender.as_ref(), &mut derived_event_ids)
                .await;
            round = self
                .run_triggers(&appended, sender.as_ref(), &mut derived_event_ids)
                .await;
        }

        Ok(PublishResult {
            event_id: primary.event_id,
            timestamp: primary.timestamp,
            correlation_id: primary.correlation_id,
            derived_event_ids,
        })
    }

    /// Fire the reaction rules breadth-first from `seeds`. Returns the seeds
    /// and everything derived from them in append order, with their depth.
    async fn cascade(
        &self,
        seeds: Vec<(EventRecord, usize)>,
        sender: Option<&NotificationSender>,
        derived_event_ids: &mut Vec<String>,
    ) -> Vec<(EventRecord, usize)> {
        let mut processed = Vec::new();
        let mut pending = VecDeque::from(seeds);

        while let Some((record, depth)) = pending.pop_front() {
            for rule in self.rules.matching(&record) {
                if depth >= MAX_CASCADE_DEPTH {
                    error!(
                        rule = %rule.name,
                        event_id = %record.event_id,
                        correlation_id = %record.correlation_id,
                        depth,
                        "Cascade depth limit reached, derived event dropped"
                    );
                    continue;
                }

                let derived = self.store.append(rule.derive(&record)).await;
                debug!(
                    rule = %rule.name,
                    parent = %record.event_id,
                    event_id = %derived.event_id,
                    event_type = %derived.event_type,
                    "Derived event published"
                );
                Self::notify(sender, &derived);
                derived_event_ids.push(derived.event_id.clone());
                pending.push_back((derived, depth + 1));
            }
            processed.push((record, depth));
        }
        processed
    }

    /// Run the trigger actions of `records`. Follow-up events land one level
    /// below the record that caused them and seed the next cascade round.
    async fn run_triggers(
        &self,
        records: &[(EventRecord, usize)],
        sender: Option<&NotificationSender>,
        derived_event_ids: &mut Vec<String>,
    ) -> Vec<(EventRecord, usize)> {
        let Some(triggers) = &self.triggers else {
            return Vec::new();
        };

        let mut follow_ups = Vec::new();
        for (record, depth) in records {
            for event in triggers.run(record).await {
                if *depth >= MAX_CASCADE_DEPTH {
                    error!(
                        event_id = %record.event_id,
                        follow_up = %event.event_type,
                        depth,
                        "Cascade depth limit reached, follow-up event dropped"
                    );
                    continue;
                }

                let appended = self.store.append(event).await;
                info!(
                    parent = %record.event_id,
                    event_id = %appended.event_id,
                    event_type = %appended.event_type,
                    "Trigger follow-up published"
                );
                Self::notify(sender, &appended);
                derived_event_ids.push(appended.event_id.clone());
                follow_ups.push((appended, depth + 1));
            }
        }
        follow_ups
    }

    /// Validate a wire request and publish it.
    pub async fn publish_request(
        &self,
        request: PublishEventRequest,
    ) -> Result<PublishResult, BrokerError> {
        let event = NewEvent::try_from(request)?;
        self.publish(event).await
    }

    async fn notification_sender(&self) -> Option<NotificationSender> {
        self.notifier.lock().await.as_ref().map(|n| n.tx.clone())
    }

    fn notify(sender: Option<&NotificationSender>, record: &EventRecord) {
        let Some(sender) = sender else {
            return;
        };
        match sender.try_send(record.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    event_id = %record.event_id,
                    event_type = %record.event_type,
                    "Notification queue full, notification dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                debug!(event_id = %record.event_id, "Notifier stopped, notification skipped");
            }
        }
    }

    /// Spawn the background notifier. Does nothing when already running.
    pub async fn start(&self) {
        let mut guard = self.notifier.lock().await;
        if guard.is_some() {
            debug!("Event broker already running");
            return;
        }

        let (tx, rx) = notification_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let notifier = Notifier::new(
            rx,
            shutdown_rx,
            self.subscriptions.clone(),
            self.alerts.clone(),
        );
        let task = tokio::spawn(notifier.run());
        *guard = Some(RunningNotifier {
            tx,
            shutdown_tx,
            task,
        });
        info!("Event broker started");
    }

    /// Stop the background notifier and wait for it to exit. Does nothing
    /// when not running.
    pub async fn stop(&self) {
        let Some(running) = self.notifier.lock().await.take() else {
            debug!("Event broker already stopped");
            return;
        };

        let _ = running.shutdown_tx.send(true);
        drop(running.tx);
        if let Err(e) = running.task.await {
            error!(error = %e, "Notifier task ended abnormally");
        }
        info!("Event broker stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.notifier.lock().await.is_some()
    }

    /// Register a webhook subscription. Returns `true` when it replaced an
    /// earlier subscription of the same system.
    pub async fn subscribe(&self, subscription: Subscription) -> bool {
        info!(
            system = %subscription.system_name,
            event_types = ?subscription.event_types,
            "Subscription registered"
        );
        self.subscriptions.register(subscription).await
    }

    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.list().await
    }

    pub fn subscription_registry(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactions::{Condition, DerivedTemplate, ReactionRule, default_rules};
    use integrator_sdk::objects::{Payload, Priority};
    use serde_json::json;
    use std::collections::HashSet;

    fn broker_with(rules: Vec<ReactionRule>) -> EventBroker {
        EventBroker::new(
            RuleSet::new(rules).unwrap(),
            Arc::new(RwLock::new(AlertConfig::default())),
        )
    }

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn chain_rule(trigger: &str, derived: &str) -> ReactionRule {
        ReactionRule::new(
            format!("{trigger}_to_{derived}"),
            trigger,
            Condition::Always,
            DerivedTemplate {
                event_type: derived.into(),
                target_systems: vec![],
                priority: Priority::Low,
                payload_from: None,
            },
        )
    }

    #[tokio::test]
    async fn test_empty_publish_is_rejected_without_append() {
        let broker = broker_with(default_rules());
        let err = broker
            .publish_request(PublishEventRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BrokerError::Validation(EventValidationError::MissingEventType)
        ));
        assert_eq!(broker.store().len().await, 0);
    }

    #[tokio::test]
    async fn test_task_completed_cascade() {
        let broker = broker_with(default_rules());
        let result = broker
            .publish(
                NewEvent::new("task_updated", "task_manager")
                    .targets(["crm"])
                    .priority(Priority::Low)
                    .payload(payload(json!({
                        "task_id": "t1",
                        "request": {"status": "completed"},
                        "response": {"id": "t1", "status": "completed"}
                    }))),
            )
            .await
            .unwrap();

        assert_eq!(result.derived_event_ids.len(), 1);
        let events = broker.store().recent(10).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_id, result.event_id);

        let derived = &events[1];
        assert_eq!(derived.event_type, "task_completed");
        assert_eq!(derived.target_systems, vec!["crm", "logistics"]);
        assert_eq!(derived.correlation_id, result.correlation_id);
        assert_eq!(derived.payload.get("status"), Some(&json!("completed")));
    }

    #[tokio::test]
    async fn test_unknown_status_derives_nothing() {
        let broker = broker_with(default_rules());
        let result = broker
            .publish(
                NewEvent::new("task_updated", "task_manager")
                    .payload(payload(json!({"request": {"status": "in_progress"}}))),
            )
            .await
            .unwrap();

        assert!(result.derived_event_ids.is_empty());
        assert_eq!(broker.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_all_matching_rules_fire_in_declaration_order() {
        let broker = broker_with(default_rules());
        let result = broker
            .publish(NewEvent::new("task_updated", "task_manager").payload(payload(json!({
                "request": {"status": "escalated", "priority": "high"},
                "response": {}
            }))))
            .await
            .unwrap();

        assert_eq!(result.derived_event_ids.len(), 2);
        let types: Vec<_> = broker
            .store()
            .recent(10)
            .await
            .into_iter()
            .map(|r| r.event_type)
            .collect();
        assert_eq!(
            types,
            vec!["task_updated", "task_escalated", "task_priority_increased"]
        );
    }

    #[tokio::test]
    async fn test_cascade_is_breadth_first() {
        let broker = broker_with(vec![
            chain_rule("a", "b"),
            chain_rule("a", "c"),
            chain_rule("b", "d"),
        ]);
        broker.publish(NewEvent::new("a", "test")).await.unwrap();

        let types: Vec<_> = broker
            .store()
            .recent(10)
            .await
            .into_iter()
            .map(|r| r.event_type)
            .collect();
        assert_eq!(types, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_cascade_depth_is_capped() {
        let chain: Vec<_> = (0..12)
            .map(|i| chain_rule(&format!("e{i}"), &format!("e{}", i + 1)))
            .collect();
        let broker = broker_with(chain);

        let result = broker.publish(NewEvent::new("e0", "test")).await.unwrap();
        assert_eq!(result.derived_event_ids.len(), MAX_CASCADE_DEPTH);
        assert_eq!(broker.store().len().await, MAX_CASCADE_DEPTH + 1);
    }

    #[tokio::test]
    async fn test_concurrent_publishes() {
        let broker = Arc::new(broker_with(default_rules()));
        let mut handles = Vec::new();
        for caller in 0..10 {
            let broker = broker.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    broker
                        .publish(NewEvent::new(format!("load_{caller}_{i}"), "load_test"))
                        .await
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let events = broker.store().recent(1000).await;
        assert_eq!(events.len(), 100);
        let ids: HashSet<_> = events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[tokio::test]
    async fn test_start_stop_are_idempotent() {
        let broker = broker_with(default_rules());
        assert!(!broker.is_running().await);

        broker.stop().await;
        broker.start().await;
        broker.start().await;
        assert!(broker.is_running().await);

        broker.publish(NewEvent::new("lead_created", "crm")).await.unwrap();

        broker.stop().await;
        broker.stop().await;
        assert!(!broker.is_running().await);

        // Publishing keeps working without a notifier.
        broker.publish(NewEvent::new("lead_created", "crm")).await.unwrap();
        assert_eq!(broker.store().len().await, 2);
    }

    #[tokio::test]
    async fn test_trigger_follow_ups_join_the_cascade() {
        use crate::processors::triggers::tests::{recording_service, runner, strict_compliance};

        let (upstream, calls) = recording_service().await;
        let broker = broker_with(default_rules())
            .with_triggers(runner(&upstream, Some(&strict_compliance().await)));

        let result = broker
            .publish(
                NewEvent::new("account_status_changed", "crm")
                    .payload(payload(json!({"amount": 5000, "task_id": "t-1"}))),
            )
            .await
            .unwrap();
        assert_eq!(result.derived_event_ids.len(), 1);

        let violation = broker.store().get(&result.derived_event_ids[0]).await.unwrap();
        assert_eq!(violation.event_type, "compliance_violation");
        assert_eq!(violation.correlation_id, result.correlation_id);
        assert_eq!(violation.payload["original_event"]["event_id"], json!(result.event_id));

        // The violation escalates the task named by the refused event.
        let calls = calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!((calls[0].0.as_str(), calls[0].1.as_str()), ("PUT", "/tasks/t-1"));
    }

    #[tokio::test]
    async fn test_accepted_event_has_no_follow_ups() {
        use crate::processors::triggers::tests::{recording_service, runner, strict_compliance};

        let (upstream, calls) = recording_service().await;
        let broker = broker_with(default_rules())
            .with_triggers(runner(&upstream, Some(&strict_compliance().await)));

        let result = broker
            .publish(
                NewEvent::new("account_status_changed", "crm")
                    .payload(payload(json!({"amount": 20}))),
            )
            .await
            .unwrap();
        assert!(result.derived_event_ids.is_empty());
        assert_eq!(broker.store().len().await, 1);
        assert!(calls.lock().await.is_empty());
    }
}
