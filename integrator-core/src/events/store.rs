//! Append-only in-memory event log.

use std::sync::Arc;

use integrator_sdk::objects::{DEFAULT_EVENT_LIMIT, EventRecord};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::NewEvent;

/// Filter for [`EventStore::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub limit: usize,
    /// Only records whose `target_systems` contain this name.
    pub target_system: Option<String>,
    pub event_type: Option<String>,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_EVENT_LIMIT,
            target_system: None,
            event_type: None,
        }
    }
}

impl EventQuery {
    fn matches(&self, record: &EventRecord) -> bool {
        let target_ok = self
            .target_system
            .as_ref()
            .is_none_or(|target| record.target_systems.iter().any(|t| t == target));
        let type_ok = self
            .event_type
            .as_ref()
            .is_none_or(|event_type| record.event_type == *event_type);
        target_ok && type_ok
    }
}

/// Shared handle to the event log.
///
/// Appends are serialized by one lock. Records are never modified or removed,
/// so insertion order is retrieval order.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    records: Arc<RwLock<Vec<EventRecord>>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `event` with id, sequence, timestamp and correlation id and
    /// append it.
    ///
    /// Stamping happens under the write lock so sequence, timestamp and
    /// position always agree.
    pub async fn append(&self, event: NewEvent) -> EventRecord {
        let mut records = self.records.write().await;
        let event_id = Uuid::now_v7().to_string();
        let record = EventRecord {
            sequence: records.len() as u64 + 1,
            correlation_id: event.correlation_id.unwrap_or_else(|| event_id.clone()),
            event_id,
            event_type: event.event_type,
            source_system: event.source_system,
            target_systems: event.target_systems,
            payload: event.payload,
            priority: event.priority,
            timestamp: OffsetDateTime::now_utc(),
        };
        records.push(record.clone());
        record
    }

    /// The last `limit` records, oldest first.
    pub async fn recent(&self, limit: usize) -> Vec<EventRecord> {
        let records = self.records.read().await;
        let start = records.len().saturating_sub(limit);
        records[start..].to_vec()
    }

    /// Filter first, then keep the last `query.limit` matches, oldest first.
    pub async fn query(&self, query: &EventQuery) -> Vec<EventRecord> {
        let records = self.records.read().await;
        let mut matched: Vec<EventRecord> = records
            .iter()
            .rev()
            .filter(|r| query.matches(r))
            .take(query.limit)
            .cloned()
            .collect();
        matched.reverse();
        matched
    }

    pub async fn get(&self, event_id: &str) -> Option<EventRecord> {
        let records = self.records.read().await;
        records.iter().find(|r| r.event_id == event_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
