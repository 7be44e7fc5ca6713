//! The publishable form of an event, before the broker stamps it.

use integrator_sdk::objects::{Payload, Priority, PublishEventRequest};
use thiserror::Error;

/// Reasons a publish request is refused before anything is stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventValidationError {
    #[error("event_type is required")]
    MissingEventType,
    #[error("source_system is required")]
    MissingSourceSystem,
}

/// An event waiting to be published.
///
/// The broker turns it into an [`EventRecord`](super::EventRecord) by
/// assigning the id, sequence, timestamp and correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub event_type: String,
    pub source_system: String,
    pub target_systems: Vec<String>,
    pub payload: Payload,
    pub priority: Priority,
    /// Falls back to the event's own id when `None`.
    pub correlation_id: Option<String>,
}

impl NewEvent {
    pub fn new(event_type: impl Into<String>, source_system: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_system: source_system.into(),
            target_systems: Vec::new(),
            payload: Payload::new(),
            priority: Priority::default(),
            correlation_id: None,
        }
    }

    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_systems = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn correlated_with(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Blank event types and source systems are rejected.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.event_type.trim().is_empty() {
            return Err(EventValidationError::MissingEventType);
        }
        if self.source_system.trim().is_empty() {
            return Err(EventValidationError::MissingSourceSystem);
        }
        Ok(())
    }
}

impl TryFrom<PublishEventRequest> for NewEvent {
    type Error = EventValidationError;

    fn try_from(req: PublishEventRequest) -> Result<Self, Self::Error> {
        let event = NewEvent {
            event_type: req.event_type.ok_or(EventValidationError::MissingEventType)?,
            source_system: req
                .source_system
                .ok_or(EventValidationError::MissingSourceSystem)?,
            target_systems: req.target_systems.unwrap_or_default(),
            payload: req.payload.unwrap_or_default(),
            priority: req.priority.unwrap_or_default(),
            correlation_id: req.correlation_id.filter(|c| !c.trim().is_empty()),
        };
        event.validate()?;
        Ok(event)
    }
}
