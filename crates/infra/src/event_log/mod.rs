//! Append-only event log boundary.
//!
//! The log belongs to the outside world: the aggregate only ever reads it.
//! The in-memory implementation here stands in for it in tests and dev.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventLog;
pub use r#trait::{EventLog, EventLogError, StoredEvent, UncommittedEvent};

use pantry_core::{ExpectedVersion, OrganizationId, RecordId};
use pantry_events::{EventBus, EventEnvelope};
use serde_json::Value as JsonValue;

/// Log adapter that publishes committed events to an `EventBus` after a
/// successful append.
///
/// Publication happens only after the append succeeded.
pub struct PublishingEventLog<L, B> {
    log: L,
    bus: B,
}

impl<L, B> PublishingEventLog<L, B> {
    pub fn new(log: L, bus: B) -> Self {
        Self { log, bus }
    }
}

impl<L, B> EventLog for PublishingEventLog<L, B>
where
    L: EventLog,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventLogError> {
        let committed = self.log.append(events, expected_version)?;

        for e in &committed {
            self.bus
                .publish(e.to_envelope())
                .map_err(|err| EventLogError::Publish(format!("{err:?}")))?;
        }

        Ok(committed)
    }

    fn load_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<StoredEvent>, EventLogError> {
        self.log.load_organization(organization_id)
    }

    fn load_record(
        &self,
        organization_id: OrganizationId,
        record_id: RecordId,
    ) -> Result<Vec<StoredEvent>, EventLogError> {
        self.log.load_record(organization_id, record_id)
    }
}
