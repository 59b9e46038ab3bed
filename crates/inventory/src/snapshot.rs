//! Materialized stock levels for one organization.
//!
//! A missing item key and an item key holding `0` are different states:
//! additive events never remove keys, while an audit replaces a location's key
//! set wholesale. Equality and serialization both preserve that difference.

use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use pantry_core::{ItemId, OrganizationId, StorageLocationId};

/// Quantity of every tracked item at one storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInventory {
    pub id: StorageLocationId,
    pub items: HashMap<ItemId, i64>,
}

impl LocationInventory {
    pub fn new(id: StorageLocationId) -> Self {
        Self {
            id,
            items: HashMap::new(),
        }
    }

    pub fn with_items(id: StorageLocationId, items: impl IntoIterator<Item = (ItemId, i64)>) -> Self {
        Self {
            id,
            items: items.into_iter().collect(),
        }
    }

    pub fn quantity(&self, item_id: ItemId) -> Option<i64> {
        self.items.get(&item_id).copied()
    }
}

/// Quantity of every item at every storage location of one organization.
///
/// Each location is keyed by its own `id`; `from_json` refuses input where the
/// two disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub organization_id: OrganizationId,
    pub locations: HashMap<StorageLocationId, LocationInventory>,
}

impl InventorySnapshot {
    /// Snapshot with no locations, the starting point of every replay.
    pub fn empty(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            locations: HashMap::new(),
        }
    }

    /// Builder used when seeding a snapshot (tests, cache loads).
    pub fn with_location(mut self, location: LocationInventory) -> Self {
        self.locations.insert(location.id, location);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn location(&self, id: StorageLocationId) -> Option<&LocationInventory> {
        self.locations.get(&id)
    }

    /// `None` when the item is not tracked at that location.
    pub fn quantity(&self, location: StorageLocationId, item_id: ItemId) -> Option<i64> {
        self.location(location).and_then(|l| l.quantity(item_id))
    }

    /// Total quantity of an item across all locations.
    pub fn on_hand(&self, item_id: ItemId) -> i64 {
        self.locations
            .values()
            .filter_map(|l| l.quantity(item_id))
            .sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let snapshot: Self = serde_json::from_str(json)?;
        if let Some((key, location)) = snapshot.locations.iter().find(|(k, l)| **k != l.id) {
            return Err(serde_json::Error::custom(format!(
                "location keyed {key} carries id {}",
                location.id
            )));
        }
        Ok(snapshot)
    }

    pub(crate) fn set(&mut self, location: StorageLocationId, item_id: ItemId, quantity: i64) {
        self.locations
            .entry(location)
            .or_insert_with(|| LocationInventory::new(location))
            .items
            .insert(item_id, quantity);
    }

    pub(crate) fn replace(&mut self, location: StorageLocationId, items: &[(ItemId, i64)]) {
        self.locations.insert(
            location,
            LocationInventory::with_items(location, items.iter().copied()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_differs_from_explicit_zero() {
        let org = OrganizationId::new();
        let loc = StorageLocationId::new();
        let item = ItemId::new();

        let tracked = InventorySnapshot::empty(org)
            .with_location(LocationInventory::with_items(loc, [(item, 0)]));
        let untracked = InventorySnapshot::empty(org).with_location(LocationInventory::new(loc));

        assert_ne!(tracked, untracked);
        assert_eq!(tracked.quantity(loc, item), Some(0));
        assert_eq!(untracked.quantity(loc, item), None);
    }

    #[test]
    fn json_round_trip_preserves_key_sets() {
        let org = OrganizationId::new();
        let (l1, l2) = (StorageLocationId::new(), StorageLocationId::new());
        let (a, b) = (ItemId::new(), ItemId::new());
        let snapshot = InventorySnapshot::empty(org)
            .with_location(LocationInventory::with_items(l1, [(a, 0), (b, -3)]))
            .with_location(LocationInventory::new(l2));

        let decoded = InventorySnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();

        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.quantity(l1, a), Some(0));
        assert!(decoded.location(l2).unwrap().items.is_empty());
    }

    #[test]
    fn from_json_rejects_location_keyed_under_another_id() {
        let org = OrganizationId::new();
        let (key, id) = (StorageLocationId::new(), StorageLocationId::new());
        let mut snapshot = InventorySnapshot::empty(org);
        snapshot.locations.insert(key, LocationInventory::new(id));

        let err = InventorySnapshot::from_json(&snapshot.to_json().unwrap()).unwrap_err();

        assert!(err.to_string().contains(&format!("location keyed {key}")));
    }

    #[test]
    fn on_hand_sums_across_locations() {
        let org = OrganizationId::new();
        let item = ItemId::new();
        let snapshot = InventorySnapshot::empty(org)
            .with_location(LocationInventory::with_items(StorageLocationId::new(), [(item, 10)]))
            .with_location(LocationInventory::with_items(StorageLocationId::new(), [(item, -4)]))
            .with_location(LocationInventory::new(StorageLocationId::new()));

        assert_eq!(snapshot.on_hand(item), 6);
        assert_eq!(snapshot.on_hand(ItemId::new()), 0);
    }

    #[test]
    fn set_creates_location_and_item_on_first_write() {
        let mut snapshot = InventorySnapshot::empty(OrganizationId::new());
        let loc = StorageLocationId::new();
        let item = ItemId::new();

        snapshot.set(loc, item, 5);
        snapshot.set(loc, item, -3);

        assert_eq!(snapshot.quantity(loc, item), Some(-3));
        assert_eq!(snapshot.location(loc).unwrap().items.len(), 1);
    }
}
