//! Dispatch + fold.

use std::collections::HashMap;

use tracing::{debug, warn};

use pantry_core::{ItemId, OrganizationId, StorageLocationId};

use crate::error::AggregateError;
use crate::event::InventoryEvent;
use crate::handlers::{StockOperation, operations_for};
use crate::snapshot::InventorySnapshot;

/// Applies inventory events to snapshots.
///
/// Stateless: the snapshot is always passed in, so one organization's state
/// can never leak into another's. Events of one organization must be applied
/// strictly in stream order; different organizations are independent.
#[derive(Debug, Default, Copy, Clone)]
pub struct InventoryAggregate;

impl InventoryAggregate {
    /// Apply one event in place.
    ///
    /// On error the snapshot is exactly as it was before the call.
    pub fn handle(
        event: &InventoryEvent,
        snapshot: &mut InventorySnapshot,
    ) -> Result<(), AggregateError> {
        if event.organization_id != snapshot.organization_id {
            return Err(AggregateError::OrganizationMismatch {
                expected: snapshot.organization_id,
                found: event.organization_id,
            });
        }

        let ops = operations_for(event)?;

        debug!(
            organization_id = %event.organization_id,
            record_id = %event.record_id,
            kind = %event.kind,
            action = ?event.action,
            operations = ops.len(),
            "applying inventory event"
        );

        for write in resolve(snapshot, ops)? {
            match write {
                Write::Set {
                    location,
                    item,
                    quantity,
                } => snapshot.set(location, item, quantity),
                Write::Replace { location, items } => snapshot.replace(location, &items),
            }
        }

        Ok(())
    }

    /// Functional form of [`handle`](Self::handle): returns the next snapshot
    /// and leaves `snapshot` untouched.
    pub fn handled(
        event: &InventoryEvent,
        snapshot: &InventorySnapshot,
    ) -> Result<InventorySnapshot, AggregateError> {
        let mut next = snapshot.clone();
        Self::handle(event, &mut next)?;
        Ok(next)
    }

    /// Fold an ordered event history into a fresh snapshot.
    pub fn replay<'a>(
        organization_id: OrganizationId,
        events: impl IntoIterator<Item = &'a InventoryEvent>,
    ) -> Result<InventorySnapshot, AggregateError> {
        let mut snapshot = InventorySnapshot::empty(organization_id);

        for (position, event) in events.into_iter().enumerate() {
            if let Err(err) = Self::handle(event, &mut snapshot) {
                warn!(
                    organization_id = %organization_id,
                    position,
                    record_id = %event.record_id,
                    error = %err,
                    "replay stopped at rejected event"
                );
                return Err(err);
            }
        }

        Ok(snapshot)
    }
}

/// An absolute change, computed before the snapshot is touched.
enum Write {
    Set {
        location: StorageLocationId,
        item: ItemId,
        quantity: i64,
    },
    Replace {
        location: StorageLocationId,
        items: Vec<(ItemId, i64)>,
    },
}

/// Turn relative operations into absolute writes against `snapshot`.
///
/// Every resulting quantity is known (and overflow-checked) before anything
/// is written, so a failing operation leaves no partial event behind.
fn resolve(
    snapshot: &InventorySnapshot,
    ops: Vec<StockOperation>,
) -> Result<Vec<Write>, AggregateError> {
    let mut replaced: HashMap<StorageLocationId, HashMap<ItemId, i64>> = HashMap::new();
    let mut pending: HashMap<(StorageLocationId, ItemId), i64> = HashMap::new();
    let mut writes = Vec::with_capacity(ops.len());

    for op in ops {
        match op {
            StockOperation::Adjust {
                location,
                item,
                delta,
            } => {
                let current = match pending.get(&(location, item)) {
                    Some(quantity) => *quantity,
                    None => match replaced.get(&location) {
                        Some(items) => items.get(&item).copied().unwrap_or(0),
                        None => snapshot.quantity(location, item).unwrap_or(0),
                    },
                };
                let quantity = current.checked_add(delta).ok_or_else(|| {
                    AggregateError::malformed(format!(
                        "quantity of item {item} at location {location} overflows"
                    ))
                })?;
                pending.insert((location, item), quantity);
                writes.push(Write::Set {
                    location,
                    item,
                    quantity,
                });
            }
            StockOperation::Replace { location, items } => {
                pending.retain(|(l, _), _| *l != location);
                replaced.insert(location, items.iter().copied().collect());
                writes.push(Write::Replace { location, items });
            }
        }
    }

    Ok(writes)
}
