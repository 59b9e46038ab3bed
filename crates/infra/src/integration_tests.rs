//! Integration tests for the full pipeline.
//!
//! Tests: InventoryEvent → EventLog → EventBus → SnapshotWorker → SnapshotCache
//!
//! Verifies:
//! - the worker-maintained snapshot equals a full replay of the log
//! - organizations are folded independently
//! - concurrent writers of one organization leave the cache at the log head
//! - corrections net out instead of accumulating

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use serde_json::Value as JsonValue;

    use pantry_core::{ExpectedVersion, ItemId, OrganizationId, RecordId, StorageLocationId};
    use pantry_events::{EventEnvelope, InMemoryEventBus};
    use pantry_inventory::{EventKind, InventoryEvent, InventorySnapshot, LineItem, LocationInventory};

    use crate::config::EngineConfig;
    use crate::engine::InventoryEngine;
    use crate::event_log::{EventLog, InMemoryEventLog, PublishingEventLog};
    use crate::projections::SnapshotCache;
    use crate::workers::SnapshotWorker;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Log = PublishingEventLog<InMemoryEventLog, Bus>;

    fn setup() -> (Arc<InventoryEngine<Log>>, Bus) {
        pantry_observability::init();

        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let log = PublishingEventLog::new(InMemoryEventLog::new(), bus.clone());
        let engine = Arc::new(InventoryEngine::new(log, EngineConfig::default()));
        (engine, bus)
    }

    /// Poll until the worker cache for `org` reaches `cursor`.
    fn wait_for_cursor(cache: &SnapshotCache, org: OrganizationId, cursor: u64) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cache.get(org).map(|c| c.cursor) == Some(cursor) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn event(
        kind: EventKind,
        org: OrganizationId,
        loc: StorageLocationId,
        lines: &[(ItemId, i64)],
    ) -> InventoryEvent {
        InventoryEvent::new(
            kind,
            org,
            RecordId::new(),
            loc,
            lines.iter().map(|(i, q)| LineItem::new(*i, *q)).collect(),
        )
    }

    #[test]
    fn multiple_events_through_log_bus_and_worker() {
        let (engine, bus) = setup();
        let worker_cache = Arc::new(SnapshotCache::new());
        let worker = SnapshotWorker::spawn("inventory-snapshots", bus.clone(), None, worker_cache.clone())
            .unwrap();

        let org = OrganizationId::new();
        let (l1, l2) = (StorageLocationId::new(), StorageLocationId::new());
        let (a, b) = (ItemId::new(), ItemId::new());

        let donation3 = event(EventKind::Donation, org, l2, &[(b, 50)]);
        let history = vec![
            event(EventKind::Donation, org, l1, &[(a, 50), (b, 30)]),
            event(EventKind::Donation, org, l1, &[(a, 30)]),
            donation3.clone(),
            donation3.corrected(vec![LineItem::new(b, 40)]),
            event(EventKind::Distribution, org, l1, &[(a, 10)]),
            event(EventKind::Distribution, org, l2, &[(b, 15)]),
        ];
        for (version, ev) in history.iter().enumerate() {
            engine
                .record(ev, ExpectedVersion::Exact(version as u64))
                .unwrap();
        }

        let expected = InventorySnapshot::empty(org)
            .with_location(LocationInventory::with_items(l1, [(a, 70), (b, 30)]))
            .with_location(LocationInventory::with_items(l2, [(b, 25)]));

        assert_eq!(engine.inventory_for(org).unwrap(), expected);
        assert_eq!(*engine.current(org).unwrap(), expected);

        assert!(wait_for_cursor(&worker_cache, org, 6));
        assert_eq!(*worker_cache.get(org).unwrap().snapshot, expected);

        worker.shutdown();
    }

    #[test]
    fn replay_is_repeatable_and_side_effect_free() {
        let (engine, _bus) = setup();
        let org = OrganizationId::new();
        let loc = StorageLocationId::new();
        let item = ItemId::new();

        engine
            .record(&event(EventKind::Purchase, org, loc, &[(item, 12)]), ExpectedVersion::Any)
            .unwrap();

        let first = engine.inventory_for(org).unwrap();
        let second = engine.inventory_for(org).unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.log().load_organization(org).unwrap().len(), 1);
    }

    #[test]
    fn organizations_fold_independently_in_parallel() {
        let (engine, _bus) = setup();
        let loc = StorageLocationId::new();
        let item = ItemId::new();
        let orgs: Vec<OrganizationId> = (0..4).map(|_| OrganizationId::new()).collect();

        let handles: Vec<_> = orgs
            .iter()
            .copied()
            .map(|org| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for version in 0..25u64 {
                        let ev = event(EventKind::Donation, org, loc, &[(item, 2)]);
                        engine.record(&ev, ExpectedVersion::Exact(version)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for org in orgs {
            let replayed = engine.inventory_for(org).unwrap();
            assert_eq!(replayed.quantity(loc, item), Some(50));
            assert_eq!(*engine.current(org).unwrap(), replayed);
        }
    }

    #[test]
    fn concurrent_writers_of_one_organization_agree_with_replay() {
        let (engine, bus) = setup();
        let worker_cache = Arc::new(SnapshotCache::new());
        let worker = SnapshotWorker::spawn("same-org", bus.clone(), None, worker_cache.clone())
            .unwrap();
        let org = OrganizationId::new();
        let loc = StorageLocationId::new();
        let item = ItemId::new();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        let ev = event(EventKind::Donation, org, loc, &[(item, 3)]);
                        let stored = engine.record(&ev, ExpectedVersion::Any).unwrap();
                        let seen = engine.current(org).unwrap();
                        assert!(seen.quantity(loc, item).unwrap() >= 3 * stored.sequence_number as i64);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let replayed = engine.inventory_for(org).unwrap();
        assert_eq!(replayed.quantity(loc, item), Some(240));
        let cached = engine.cache().get(org).unwrap();
        assert_eq!(cached.cursor, 80);
        assert_eq!(*cached.snapshot, replayed);

        assert!(wait_for_cursor(&worker_cache, org, 80));
        assert_eq!(*worker_cache.get(org).unwrap().snapshot, replayed);

        worker.shutdown();
    }

    #[test]
    fn worker_pinned_to_one_organization_ignores_others() {
        let (engine, bus) = setup();
        let (mine, theirs) = (OrganizationId::new(), OrganizationId::new());
        let cache = Arc::new(SnapshotCache::new());
        let worker = SnapshotWorker::spawn("pinned", bus.clone(), Some(mine), cache.clone()).unwrap();
        let loc = StorageLocationId::new();
        let item = ItemId::new();

        engine
            .record(&event(EventKind::Donation, theirs, loc, &[(item, 1)]), ExpectedVersion::Any)
            .unwrap();
        engine
            .record(&event(EventKind::Donation, mine, loc, &[(item, 9)]), ExpectedVersion::Any)
            .unwrap();

        assert!(wait_for_cursor(&cache, mine, 1));
        assert!(cache.get(theirs).is_none());

        worker.shutdown();
    }

    #[test]
    fn transfer_update_moves_only_the_difference() {
        let (engine, _bus) = setup();
        let org = OrganizationId::new();
        let (from, to) = (StorageLocationId::new(), StorageLocationId::new());
        let item = ItemId::new();

        engine
            .record(&event(EventKind::Donation, org, from, &[(item, 100)]), ExpectedVersion::Any)
            .unwrap();
        let transfer = event(EventKind::Transfer, org, from, &[(item, 20)]).with_destination(to);
        engine.record(&transfer, ExpectedVersion::Any).unwrap();
        engine
            .record(&transfer.corrected(vec![LineItem::new(item, 35)]), ExpectedVersion::Any)
            .unwrap();

        let inv = engine.inventory_for(org).unwrap();
        assert_eq!(inv.quantity(from, item), Some(65));
        assert_eq!(inv.quantity(to, item), Some(35));
        assert_eq!(inv.on_hand(item), 100);
    }
}
