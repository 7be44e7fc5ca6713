//! Side effects on the business services, keyed by event type.
//!
//! The broker runs the configured actions for every record it appends,
//! after the reaction cascade of that record. Actions are best effort:
//! failures are logged and never fail the publish. A compliance refusal is
//! the only outcome that publishes something, a `compliance_violation`.

use std::collections::BTreeMap;

use integrator_sdk::objects::{EventRecord, Payload, Priority};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use crate::events::NewEvent;
use crate::services::{
    ComplianceError, ComplianceHooks, TransactionCheck, Upstream, UpstreamClient, UpstreamError,
};

pub const COMPLIANCE_VIOLATION: &str = "compliance_violation";
const SOURCE: &str = "event_broker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAction {
    /// `POST /leads` on the CRM from an order.
    CreateCrmLead,
    /// `POST /tasks` with a follow-up task referencing the event.
    CreateTask,
    /// `PUT /tasks/{task_id}` to `escalated`.
    EscalateTask,
    /// `PUT /opportunities/{opportunity_id}` with the latest activity.
    UpdateCrmOpportunity,
    /// Log the event as a transaction with the compliance service.
    ComplianceCheck,
}

impl TriggerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerAction::CreateCrmLead => "create_crm_lead",
            TriggerAction::CreateTask => "create_task",
            TriggerAction::EscalateTask => "escalate_task",
            TriggerAction::UpdateCrmOpportunity => "update_crm_opportunity",
            TriggerAction::ComplianceCheck => "compliance_check",
        }
    }
}

/// Event type to the actions it sets off, run in list order.
pub type TriggerTable = BTreeMap<String, Vec<TriggerAction>>;

pub fn default_triggers() -> TriggerTable {
    use TriggerAction::*;

    [
        ("order_created", vec![CreateCrmLead, CreateTask]),
        ("delivery_delayed", vec![EscalateTask]),
        ("account_status_changed", vec![ComplianceCheck]),
        ("task_completed", vec![UpdateCrmOpportunity]),
        (COMPLIANCE_VIOLATION, vec![EscalateTask]),
    ]
    .into_iter()
    .map(|(event_type, actions)| (event_type.to_string(), actions))
    .collect()
}

#[derive(Debug, Error)]
enum ActionError {
    #[error("payload has no {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Compliance(#[from] ComplianceError),
}

#[derive(Debug, Clone)]
pub struct TriggerRunner {
    upstream: UpstreamClient,
    compliance: ComplianceHooks,
    table: TriggerTable,
}

impl TriggerRunner {
    pub fn new(upstream: UpstreamClient, compliance: ComplianceHooks, table: TriggerTable) -> Self {
        Self {
            upstream,
            compliance,
            table,
        }
    }

    pub fn table(&self) -> &TriggerTable {
        &self.table
    }

    /// Run the actions configured for `record` and return the events they
    /// ask to publish.
    pub async fn run(&self, record: &EventRecord) -> Vec<NewEvent> {
        let Some(actions) = self.table.get(&record.event_type) else {
            return Vec::new();
        };

        let mut follow_ups = Vec::new();
        for action in actions {
            match self.execute(*action, record).await {
                Ok(Some(event)) => follow_ups.push(event),
                Ok(None) => debug!(
                    action = action.as_str(),
                    event_id = %record.event_id,
                    "Trigger action done"
                ),
                Err(ActionError::MissingField(field)) => debug!(
                    action = action.as_str(),
                    event_id = %record.event_id,
                    field,
                    "Trigger action skipped"
                ),
                Err(e) => warn!(
                    action = action.as_str(),
                    event_id = %record.event_id,
                    event_type = %record.event_type,
                    error = %e,
                    "Trigger action failed"
                ),
            }
        }
        follow_ups
    }

    async fn execute(
        &self,
        action: TriggerAction,
        record: &EventRecord,
    ) -> Result<Option<NewEvent>, ActionError> {
        match action {
            TriggerAction::CreateCrmLead => self.create_crm_lead(record).await.map(|()| None),
            TriggerAction::CreateTask => self.create_task(record).await.map(|()| None),
            TriggerAction::EscalateTask => self.escalate_task(record).await.map(|()| None),
            TriggerAction::UpdateCrmOpportunity => {
                self.update_crm_opportunity(record).await.map(|()| None)
            }
            TriggerAction::ComplianceCheck => self.compliance_check(record).await,
        }
    }

    async fn create_crm_lead(&self, record: &EventRecord) -> Result<(), ActionError> {
        let order_id = text(&record.payload, "order_id").unwrap_or_else(|| "unknown".into());
        let lead = json!({
            "lead_source": "order",
            "company": text(&record.payload, "customer_name").unwrap_or_else(|| "Unknown".into()),
            "budget": record.payload.get("order_value").cloned().unwrap_or(json!(0)),
            "notes": format!("Auto-created from order {order_id}"),
        });
        self.upstream.post(Upstream::Crm, "/leads", &lead).await?;
        info!(order_id = %order_id, "CRM lead created from order");
        Ok(())
    }

    async fn create_task(&self, record: &EventRecord) -> Result<(), ActionError> {
        let task = json!({
            "title": format!("Follow up on {}", record.event_type),
            "description": format!("Auto-created task for {}", record.event_type),
            "priority": "medium",
            "assignee": "system",
            "reference_id": record.event_id,
        });
        self.upstream.post(Upstream::Task, "/tasks", &task).await?;
        info!(event_id = %record.event_id, "Follow-up task created");
        Ok(())
    }

    /// Violations carry the offending event, so its `task_id` counts too.
    async fn escalate_task(&self, record: &EventRecord) -> Result<(), ActionError> {
        let task_id = text(&record.payload, "task_id")
            .or_else(|| {
                record
                    .payload
                    .get("original_event")
                    .and_then(|e| e.get("payload"))
                    .and_then(Value::as_object)
                    .and_then(|p| text(p, "task_id"))
            })
            .ok_or(ActionError::MissingField("task_id"))?;

        let escalation = json!({
            "status": "escalated",
            "priority": "high",
            "escalation_reason": format!("Triggered by {}", record.event_type),
            "escalation_timestamp": now(),
        });
        self.upstream
            .put(
                Upstream::Task,
                &format!("/tasks/{}", urlencoding::encode(&task_id)),
                &escalation,
            )
            .await?;
        info!(task_id = %task_id, cause = %record.event_type, "Task escalated");
        Ok(())
    }

    async fn update_crm_opportunity(&self, record: &EventRecord) -> Result<(), ActionError> {
        let opportunity_id = text(&record.payload, "opportunity_id")
            .ok_or(ActionError::MissingField("opportunity_id"))?;

        let mut update = Payload::new();
        update.insert("last_activity".into(), json!(now()));
        update.insert("last_activity_type".into(), json!(record.event_type));
        update.insert(
            "notes".into(),
            json!(format!("Updated due to {} event", record.event_type)),
        );
        match record.event_type.as_str() {
            "task_completed" => {
                update.insert("probability".into(), json!(90));
            }
            "delivery_completed" => {
                update.insert("stage".into(), json!("closed_won"));
                update.insert("close_date".into(), json!(now()));
            }
            _ => {}
        }

        self.upstream
            .put(
                Upstream::Crm,
                &format!("/opportunities/{}", urlencoding::encode(&opportunity_id)),
                &Value::Object(update),
            )
            .await?;
        info!(opportunity_id = %opportunity_id, cause = %record.event_type, "Opportunity updated");
        Ok(())
    }

    async fn compliance_check(&self, record: &EventRecord) -> Result<Option<NewEvent>, ActionError> {
        let mut check = TransactionCheck::from_body(&record.event_type, &record.payload);
        check.transaction_id = record.event_id.clone();
        check.actor = record.source_system.clone();

        let reason = match self.compliance.check_transaction(&check).await {
            Ok(()) => return Ok(None),
            Err(ComplianceError::Denied(reason)) => reason,
            Err(e) => return Err(e.into()),
        };
        warn!(event_id = %record.event_id, %reason, "Compliance check failed");

        let mut payload = Payload::new();
        payload.insert(
            "original_event".into(),
            serde_json::to_value(record).unwrap_or(Value::Null),
        );
        payload.insert(
            "violation_details".into(),
            json!({"compliant": false, "message": reason}),
        );
        Ok(Some(
            NewEvent::new(COMPLIANCE_VIOLATION, SOURCE)
                .targets(["compliance", "task_manager"])
                .priority(Priority::High)
                .payload(payload)
                .correlated_with(record.correlation_id.clone()),
        ))
    }
}

/// Strings as they are, numbers in their JSON form.
fn text(payload: &Payload, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn now() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}
