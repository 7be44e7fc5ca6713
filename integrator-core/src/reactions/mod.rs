//! Declarative reaction rules.
//!
//! A rule maps a trigger event type, optionally narrowed by a payload field
//! condition, to a derived event template. The broker evaluates every rule
//! whose trigger matches an appended record, in declaration order, and
//! publishes one derived event per matching rule.

mod defaults;
mod validate;

pub use defaults::default_rules;
pub use validate::RuleError;

use integrator_sdk::objects::gateway::RuleView;
use integrator_sdk::objects::{EventRecord, Payload, Priority};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::NewEvent;

/// When a rule fires for a matching trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    #[default]
    Always,
    /// The value at dotted `path` in the payload equals `value`.
    FieldEquals { path: String, value: Value },
}

impl Condition {
    pub fn field_equals(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::FieldEquals {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, payload: &Payload) -> bool {
        match self {
            Condition::Always => true,
            Condition::FieldEquals { path, value } => {
                lookup(payload, path).is_some_and(|found| found == value)
            }
        }
    }
}

fn lookup<'a>(payload: &'a Payload, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = payload.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// The event a rule publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTemplate {
    pub event_type: String,
    #[serde(default)]
    pub target_systems: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Top-level payload field carried into the derived event. The whole
    /// triggering payload is carried when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionRule {
    pub name: String,
    pub trigger: String,
    #[serde(default)]
    pub condition: Condition,
    pub derived: DerivedTemplate,
}

impl ReactionRule {
    pub fn new(
        name: impl Into<String>,
        trigger: impl Into<String>,
        condition: Condition,
        derived: DerivedTemplate,
    ) -> Self {
        Self {
            name: name.into(),
            trigger: trigger.into(),
            condition,
            derived,
        }
    }

    pub fn matches(&self, record: &EventRecord) -> bool {
        self.trigger == record.event_type && self.condition.matches(&record.payload)
    }

    /// Build the derived event for `parent`.
    ///
    /// The derived event keeps the parent's source system and correlation id.
    pub fn derive(&self, parent: &EventRecord) -> NewEvent {
        let payload = match &self.derived.payload_from {
            None => parent.payload.clone(),
            Some(field) => match parent.payload.get(field) {
                Some(Value::Object(map)) => map.clone(),
                None | Some(Value::Null) => Payload::new(),
                Some(other) => {
                    let mut wrapped = Payload::new();
                    wrapped.insert(field.clone(), other.clone());
                    wrapped
                }
            },
        };

        NewEvent::new(&self.derived.event_type, &parent.source_system)
            .targets(self.derived.target_systems.iter().cloned())
            .payload(payload)
            .priority(self.derived.priority)
            .correlated_with(&parent.correlation_id)
    }

    pub fn view(&self) -> RuleView {
        RuleView {
            name: self.name.clone(),
            trigger: self.trigger.clone(),
            condition: match &self.condition {
                Condition::Always => None,
                Condition::FieldEquals { path, value } => Some(format!("{path} == {value}")),
            },
            derived_event_type: self.derived.event_type.clone(),
            target_systems: self.derived.target_systems.clone(),
            priority: self.derived.priority,
        }
    }
}

/// A validated, read-only rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ReactionRule>,
}

impl RuleSet {
    /// Validate `rules` and freeze them in declaration order.
    pub fn new(rules: Vec<ReactionRule>) -> Result<Self, RuleError> {
        validate::validate(&rules)?;
        Ok(Self { rules })
    }

    /// Rules that fire for `record`, in declaration order.
    pub fn matching<'a>(
        &'a self,
        record: &'a EventRecord,
    ) -> impl Iterator<Item = &'a ReactionRule> + 'a {
        self.rules.iter().filter(move |r| r.matches(record))
    }

    pub fn rules(&self) -> &[ReactionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
