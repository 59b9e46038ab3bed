use std::collections::HashMap;
use std::sync::RwLock;

use pantry_core::{ExpectedVersion, OrganizationId};

use super::r#trait::{EventLog, EventLogError, StoredEvent, UncommittedEvent};

/// In-memory append-only event log.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    streams: RwLock<HashMap<OrganizationId, Vec<StoredEvent>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventLog for InMemoryEventLog {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventLogError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };
        let organization_id = first.organization_id;

        if let Some(idx) = events.iter().position(|e| e.organization_id != organization_id) {
            return Err(EventLogError::OrganizationIsolation(format!(
                "batch contains multiple organization_ids (index {idx})"
            )));
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventLogError::InvalidAppend("lock poisoned".to_string()))?;

        let stream = streams.entry(organization_id).or_default();
        let current = Self::current_version(stream);

        expected_version
            .check(current)
            .map_err(|e| EventLogError::Concurrency(e.to_string()))?;

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                organization_id: e.organization_id,
                record_id: e.record_id,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<StoredEvent>, EventLogError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventLogError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&organization_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantry_core::{ItemId, RecordId, StorageLocationId};
    use pantry_inventory::{EventKind, InventoryEvent, LineItem};

    fn uncommitted(org: OrganizationId, record: RecordId) -> UncommittedEvent {
        let ev = InventoryEvent::new(
            EventKind::Donation,
            org,
            record,
            StorageLocationId::new(),
            vec![LineItem::new(ItemId::new(), 5)],
        );
        UncommittedEvent::from_inventory(&ev).unwrap()
    }

    #[test]
    fn sequence_numbers_are_per_organization() {
        let log = InMemoryEventLog::new();
        let (org_a, org_b) = (OrganizationId::new(), OrganizationId::new());

        log.append(vec![uncommitted(org_a, RecordId::new())], ExpectedVersion::Exact(0)).unwrap();
        log.append(vec![uncommitted(org_b, RecordId::new())], ExpectedVersion::Exact(0)).unwrap();
        let second = log
            .append(vec![uncommitted(org_a, RecordId::new())], ExpectedVersion::Exact(1))
            .unwrap();

        assert_eq!(second[0].sequence_number, 2);
        assert_eq!(log.load_organization(org_a).unwrap().len(), 2);
        assert_eq!(log.load_organization(org_b).unwrap().len(), 1);
    }

    #[test]
    fn stale_expected_version_is_rejected() {
        let log = InMemoryEventLog::new();
        let org = OrganizationId::new();
        log.append(vec![uncommitted(org, RecordId::new())], ExpectedVersion::Any).unwrap();

        let err = log
            .append(vec![uncommitted(org, RecordId::new())], ExpectedVersion::Exact(0))
            .unwrap_err();

        assert!(matches!(err, EventLogError::Concurrency(msg) if msg.contains("actual: 1")));
        assert_eq!(log.load_organization(org).unwrap().len(), 1);
    }

    #[test]
    fn mixed_organization_batch_is_rejected() {
        let log = InMemoryEventLog::new();
        let batch = vec![
            uncommitted(OrganizationId::new(), RecordId::new()),
            uncommitted(OrganizationId::new(), RecordId::new()),
        ];

        let err = log.append(batch, ExpectedVersion::Any).unwrap_err();

        assert!(matches!(err, EventLogError::OrganizationIsolation(msg) if msg.contains("index 1")));
    }

    #[test]
    fn load_record_filters_one_record_in_order() {
        let log = InMemoryEventLog::new();
        let org = OrganizationId::new();
        let record = RecordId::new();

        log.append(vec![uncommitted(org, record)], ExpectedVersion::Any).unwrap();
        log.append(vec![uncommitted(org, RecordId::new())], ExpectedVersion::Any).unwrap();
        log.append(vec![uncommitted(org, record)], ExpectedVersion::Any).unwrap();

        let seqs: Vec<u64> = log
            .load_record(org, record)
            .unwrap()
            .iter()
            .map(|e| e.sequence_number)
            .collect();
        assert_eq!(seqs, vec![1, 3]);
    }

    #[test]
    fn unknown_organization_has_an_empty_stream() {
        let log = InMemoryEventLog::new();
        assert!(log.load_organization(OrganizationId::new()).unwrap().is_empty());
    }
}
