use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use pantry_core::{ExpectedVersion, OrganizationId, RecordId};
use pantry_events::{Event, EventEnvelope};
use pantry_inventory::InventoryEvent;
use std::sync::Arc;

/// An event ready to be appended (not yet assigned a sequence number).
///
/// The payload is kept as JSON so the log never needs to understand the
/// event schema; `event_type` and `event_version` travel alongside for
/// decoding and inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub organization_id: OrganizationId,
    pub record_id: RecordId,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A committed event with its position in the organization stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub organization_id: OrganizationId,
    pub record_id: RecordId,

    /// Monotonically increasing position in the organization stream, starting at 1.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    /// Convert into an envelope for publication.
    pub fn to_envelope(&self) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            self.organization_id,
            self.record_id,
            self.sequence_number,
            self.payload.clone(),
        )
    }

    /// Decode the payload into a typed event.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("organization isolation violation: {0}")]
    OrganizationIsolation(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event publication failed: {0}")]
    Publish(String),
}

/// Append-only, per-organization ordered event log.
///
/// This is the external history the aggregate replays. Each organization has
/// exactly one stream; every event of the organization, whatever record it was
/// published for, gets the next sequence number of that stream.
///
/// Implementations must:
/// - reject batches spanning more than one organization
/// - check `expected_version` against the organization's current stream version
/// - assign sequence numbers `current + 1, current + 2, ...` with no gaps
/// - persist a batch atomically
pub trait EventLog: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventLogError>;

    /// Full stream of one organization, in sequence order.
    fn load_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<StoredEvent>, EventLogError>;

    /// Events published for one record, in sequence order.
    fn load_record(
        &self,
        organization_id: OrganizationId,
        record_id: RecordId,
    ) -> Result<Vec<StoredEvent>, EventLogError> {
        Ok(self
            .load_organization(organization_id)?
            .into_iter()
            .filter(|e| e.record_id == record_id)
            .collect())
    }
}

impl<L> EventLog for Arc<L>
where
    L: EventLog + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventLogError> {
        (**self).append(events, expected_version)
    }

    fn load_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<StoredEvent>, EventLogError> {
        (**self).load_organization(organization_id)
    }

    fn load_record(
        &self,
        organization_id: OrganizationId,
        record_id: RecordId,
    ) -> Result<Vec<StoredEvent>, EventLogError> {
        (**self).load_record(organization_id, record_id)
    }
}

impl UncommittedEvent {
    /// Wrap a typed event, capturing the metadata needed to decode it later.
    pub fn from_typed<E>(
        organization_id: OrganizationId,
        record_id: RecordId,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventLogError>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventLogError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            organization_id,
            record_id,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }

    pub fn from_inventory(event: &InventoryEvent) -> Result<Self, EventLogError> {
        Self::from_typed(event.organization_id, event.record_id, Uuid::now_v7(), event)
    }
}
