//! Per-kind delta rules.
//!
//! Each rule turns one event into stock operations without looking at the
//! snapshot. Validation happens here, before any operation exists, which is
//! what lets the aggregate apply an event all-or-nothing.

use pantry_core::{ItemId, StorageLocationId};

use crate::error::AggregateError;
use crate::event::{EventAction, EventKind, InventoryEvent};
use crate::line_item::net_quantities;

/// A single change to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockOperation {
    /// Add `delta` (possibly negative) to one item at one location.
    Adjust {
        location: StorageLocationId,
        item: ItemId,
        delta: i64,
    },
    /// Set a location's item map to exactly `items`.
    Replace {
        location: StorageLocationId,
        items: Vec<(ItemId, i64)>,
    },
}

/// How a recognized kind moves stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum StockRule {
    /// Donations and purchases add to the location.
    Receive,
    /// Distributions take from the location.
    Issue,
    /// Adjustments carry their own sign.
    Adjust,
    /// Stock leaves the primary location and arrives at the destination.
    Transfer,
    /// A physical count replaces what the location tracks.
    Audit,
}

impl StockRule {
    fn for_kind(kind: &EventKind) -> Result<Self, AggregateError> {
        match kind {
            EventKind::Donation | EventKind::Purchase => Ok(StockRule::Receive),
            EventKind::Distribution => Ok(StockRule::Issue),
            EventKind::Adjustment => Ok(StockRule::Adjust),
            EventKind::Transfer => Ok(StockRule::Transfer),
            EventKind::Audit => Ok(StockRule::Audit),
            EventKind::Unrecognized(raw) => Err(AggregateError::UnknownEventKind(raw.clone())),
        }
    }
}

/// Compute the operations an event contributes.
pub fn operations_for(event: &InventoryEvent) -> Result<Vec<StockOperation>, AggregateError> {
    let rule = StockRule::for_kind(&event.kind)?;

    if event.action == EventAction::Update && event.previous_line_items.is_none() {
        return Err(AggregateError::malformed(format!(
            "{} update for record {} has no previous line items",
            event.kind, event.record_id
        )));
    }

    match (rule, event.secondary_location_id) {
        (StockRule::Transfer, None) => {
            return Err(AggregateError::malformed(format!(
                "transfer for record {} has no destination location",
                event.record_id
            )));
        }
        (StockRule::Transfer, Some(_)) | (_, None) => {}
        (_, Some(destination)) => {
            return Err(AggregateError::malformed(format!(
                "{} for record {} names destination {destination}; only transfers have one",
                event.kind, event.record_id
            )));
        }
    }

    match rule {
        StockRule::Receive | StockRule::Adjust => single_location(event, 1),
        StockRule::Issue => single_location(event, -1),
        StockRule::Transfer => transfer(event),
        StockRule::Audit => audit(event),
    }
}

/// Net per-item change the event contributes, before direction is applied.
///
/// - create: the line items as-is
/// - update: new minus previous, unchanged items dropped
/// - destroy: the line items negated
fn net_change(event: &InventoryEvent) -> Result<Vec<(ItemId, i64)>, AggregateError> {
    let current = net_quantities(&event.line_items, "line_items")?;

    match event.action {
        EventAction::Create => Ok(current),
        EventAction::Destroy => current
            .into_iter()
            .map(|(item, q)| Ok((item, negate(item, q)?)))
            .collect(),
        EventAction::Update => {
            let previous = net_quantities(
                event.previous_line_items.as_deref().unwrap_or_default(),
                "previous_line_items",
            )?;
            diff(current, previous)
        }
    }
}

fn diff(
    current: Vec<(ItemId, i64)>,
    previous: Vec<(ItemId, i64)>,
) -> Result<Vec<(ItemId, i64)>, AggregateError> {
    let mut changes: Vec<(ItemId, i64)> = Vec::with_capacity(current.len() + previous.len());

    for (item, quantity) in &current {
        let before = previous
            .iter()
            .find(|(p, _)| p == item)
            .map(|(_, q)| *q)
            .unwrap_or(0);
        let delta = quantity
            .checked_sub(before)
            .ok_or_else(|| overflow(*item))?;
        changes.push((*item, delta));
    }
    for (item, quantity) in previous {
        if !current.iter().any(|(c, _)| *c == item) {
            changes.push((item, negate(item, quantity)?));
        }
    }

    changes.retain(|(_, delta)| *delta != 0);
    Ok(changes)
}

fn negate(item: ItemId, quantity: i64) -> Result<i64, AggregateError> {
    quantity.checked_neg().ok_or_else(|| overflow(item))
}

fn overflow(item: ItemId) -> AggregateError {
    AggregateError::malformed(format!("quantity change for item {item} overflows"))
}

fn single_location(event: &InventoryEvent, sign: i64) -> Result<Vec<StockOperation>, AggregateError> {
    let location = event.primary_location_id;
    net_change(event)?
        .into_iter()
        .map(|(item, delta)| {
            let delta = delta.checked_mul(sign).ok_or_else(|| overflow(item))?;
            Ok(StockOperation::Adjust {
                location,
                item,
                delta,
            })
        })
        .collect()
}

fn transfer(event: &InventoryEvent) -> Result<Vec<StockOperation>, AggregateError> {
    let from = event.primary_location_id;
    let Some(to) = event.secondary_location_id else {
        return Err(AggregateError::malformed("transfer has no destination location"));
    };

    let mut ops = Vec::new();
    for (item, delta) in net_change(event)? {
        ops.push(StockOperation::Adjust {
            location: from,
            item,
            delta: negate(item, delta)?,
        });
        ops.push(StockOperation::Adjust {
            location: to,
            item,
            delta,
        });
    }
    Ok(ops)
}

fn audit(event: &InventoryEvent) -> Result<Vec<StockOperation>, AggregateError> {
    if event.action == EventAction::Destroy {
        return Err(AggregateError::malformed(format!(
            "audit {} cannot be destroyed; there is no defined reversal for a count",
            event.record_id
        )));
    }

    // Updates are validated like any other update, but a count is absolute:
    // the new line items replace the location regardless of what was counted before.
    if let Some(previous) = &event.previous_line_items {
        net_quantities(previous, "previous_line_items")?;
    }

    Ok(vec![StockOperation::Replace {
        location: event.primary_location_id,
        items: net_quantities(&event.line_items, "line_items")?,
    }])
}
