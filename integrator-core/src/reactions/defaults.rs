use integrator_sdk::objects::Priority;

use super::{Condition, DerivedTemplate, ReactionRule};

const CRM: &str = "crm";
const LOGISTICS: &str = "logistics";
const COMPLIANCE: &str = "compliance";
const TASK_MANAGER: &str = "task_manager";
const PROCUREMENT: &str = "procurement";

fn rule(
    name: &str,
    trigger: &str,
    condition: Condition,
    event_type: &str,
    targets: &[&str],
    priority: Priority,
    payload_from: Option<&str>,
) -> ReactionRule {
    ReactionRule::new(
        name,
        trigger,
        condition,
        DerivedTemplate {
            event_type: event_type.to_string(),
            target_systems: targets.iter().map(|t| t.to_string()).collect(),
            priority,
            payload_from: payload_from.map(str::to_string),
        },
    )
}

/// Status transitions of tasks and workflows that other systems react to.
fn status_rules(trigger: &str, field: &str) -> Vec<ReactionRule> {
    let path = format!("request.{field}");
    vec![
        rule(
            &format!("{trigger}_completed"),
            trigger,
            Condition::field_equals(&path, "completed"),
            "task_completed",
            &[CRM, LOGISTICS],
            Priority::Medium,
            Some("response"),
        ),
        rule(
            &format!("{trigger}_escalated"),
            trigger,
            Condition::field_equals(&path, "escalated"),
            "task_escalated",
            &[CRM, COMPLIANCE],
            Priority::High,
            Some("response"),
        ),
        rule(
            &format!("{trigger}_blocked"),
            trigger,
            Condition::field_equals(&path, "blocked"),
            "task_blocked",
            &[CRM],
            Priority::Medium,
            Some("response"),
        ),
    ]
}

/// Inbound webhook `event_type` values mapped to a derived event.
fn webhook_rule(
    trigger: &str,
    inbound: &str,
    event_type: &str,
    targets: &[&str],
    priority: Priority,
) -> ReactionRule {
    rule(
        &format!("{trigger}_{inbound}"),
        trigger,
        Condition::field_equals("event_type", inbound),
        event_type,
        targets,
        priority,
        Some("payload"),
    )
}

/// The built-in reaction table.
pub fn default_rules() -> Vec<ReactionRule> {
    let mut rules = status_rules("task_updated", "status");
    rules.push(rule(
        "task_updated_priority_high",
        "task_updated",
        Condition::field_equals("request.priority", "high"),
        "task_priority_increased",
        &[CRM],
        Priority::High,
        Some("response"),
    ));
    rules.extend(status_rules("workflow_state_changed", "state"));

    rules.extend([
        rule(
            "feedback_complaint",
            "feedback_received",
            Condition::field_equals("request.type", "complaint"),
            "complaint_received",
            &[CRM, COMPLIANCE],
            Priority::High,
            Some("response"),
        ),
        rule(
            "feedback_escalation",
            "feedback_received",
            Condition::field_equals("request.type", "escalation"),
            "task_escalated",
            &[CRM, LOGISTICS],
            Priority::High,
            Some("response"),
        ),
        rule(
            "opportunity_closed_won",
            "opportunity_updated",
            Condition::field_equals("request.stage", "closed_won"),
            "opportunity_won",
            &[TASK_MANAGER, LOGISTICS],
            Priority::High,
            Some("response"),
        ),
        rule(
            "opportunity_closed_lost",
            "opportunity_updated",
            Condition::field_equals("request.stage", "closed_lost"),
            "opportunity_lost",
            &[TASK_MANAGER, LOGISTICS],
            Priority::High,
            Some("response"),
        ),
        rule(
            "inventory_low_stock",
            "inventory_updated",
            Condition::field_equals("low_stock", true),
            "inventory_low",
            &[PROCUREMENT, CRM],
            Priority::High,
            None,
        ),
        webhook_rule(
            "task_webhook_received",
            "task_overdue",
            "task_overdue",
            &[CRM, COMPLIANCE],
            Priority::High,
        ),
        webhook_rule(
            "task_webhook_received",
            "task_assigned",
            "task_assigned",
            &[CRM],
            Priority::Low,
        ),
        webhook_rule(
            "crm_webhook_received",
            "lead_converted",
            "lead_to_opportunity",
            &[TASK_MANAGER],
            Priority::High,
        ),
        webhook_rule(
            "crm_webhook_received",
            "account_status_changed",
            "account_status_changed",
            &[COMPLIANCE, TASK_MANAGER],
            Priority::Medium,
        ),
        webhook_rule(
            "logistics_webhook_received",
            "order_delivered",
            "delivery_completed",
            &[CRM],
            Priority::Medium,
        ),
        webhook_rule(
            "logistics_webhook_received",
            "order_delayed",
            "delivery_delayed",
            &[TASK_MANAGER, CRM],
            Priority::High,
        ),
    ]);
    rules
}
