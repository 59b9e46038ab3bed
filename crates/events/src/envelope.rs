use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pantry_core::{OrganizationId, RecordId};

/// Envelope for an event, carrying organization + stream metadata.
///
/// Notes:
/// - Streams are **per organization**; `sequence_number` orders every event of
///   one organization and is meaningless across organizations.
/// - `record_id` names the transactional record the event was published for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    organization_id: OrganizationId,
    record_id: RecordId,

    /// Monotonically increasing position in the organization stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        organization_id: OrganizationId,
        record_id: RecordId,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            organization_id,
            record_id,
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
