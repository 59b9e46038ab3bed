use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pantry_core::{OrganizationId, RecordId, StorageLocationId};
use pantry_events::Event;

use crate::line_item::LineItem;

/// Which kind of transactional record an event was published for.
///
/// Kinds are carried as lowercase strings. A kind this build does not know
/// decodes to `Unrecognized` rather than failing, so the aggregate can reject
/// it explicitly with `UnknownEventKind`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Donation,
    Purchase,
    Distribution,
    Adjustment,
    Transfer,
    Audit,
    Unrecognized(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Donation => "donation",
            EventKind::Purchase => "purchase",
            EventKind::Distribution => "distribution",
            EventKind::Adjustment => "adjustment",
            EventKind::Transfer => "transfer",
            EventKind::Audit => "audit",
            EventKind::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, EventKind::Unrecognized(_))
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "donation" => EventKind::Donation,
            "purchase" => EventKind::Purchase,
            "distribution" => EventKind::Distribution,
            "adjustment" => EventKind::Adjustment,
            "transfer" => EventKind::Transfer,
            "audit" => EventKind::Audit,
            _ => EventKind::Unrecognized(value),
        }
    }
}

impl From<EventKind> for String {
    fn from(value: EventKind) -> Self {
        match value {
            EventKind::Unrecognized(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the originating record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Create,
    Update,
    Destroy,
}

/// Immutable description of one change to a transactional record.
///
/// `previous_line_items` is only meaningful for `Update` and holds the line
/// items as they stood in the record's previously published event.
/// `secondary_location_id` is only meaningful for transfers (the destination).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEvent {
    pub kind: EventKind,
    pub action: EventAction,
    pub organization_id: OrganizationId,
    pub record_id: RecordId,
    pub primary_location_id: StorageLocationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_location_id: Option<StorageLocationId>,
    pub line_items: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_line_items: Option<Vec<LineItem>>,
    pub occurred_at: DateTime<Utc>,
}

impl InventoryEvent {
    /// A `Create` event for a freshly saved record.
    pub fn new(
        kind: EventKind,
        organization_id: OrganizationId,
        record_id: RecordId,
        location: StorageLocationId,
        line_items: Vec<LineItem>,
    ) -> Self {
        Self {
            kind,
            action: EventAction::Create,
            organization_id,
            record_id,
            primary_location_id: location,
            secondary_location_id: None,
            line_items,
            previous_line_items: None,
            occurred_at: Utc::now(),
        }
    }

    /// Set the transfer destination.
    pub fn with_destination(mut self, destination: StorageLocationId) -> Self {
        self.secondary_location_id = Some(destination);
        self
    }

    /// Override the business time.
    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// The `Update` event that follows this one when the record's line items
    /// are corrected to `line_items`.
    pub fn corrected(&self, line_items: Vec<LineItem>) -> Self {
        Self {
            action: EventAction::Update,
            previous_line_items: Some(self.line_items.clone()),
            line_items,
            occurred_at: Utc::now(),
            ..self.clone()
        }
    }

    /// The `Destroy` event that follows this one when the record is removed.
    pub fn destroyed(&self) -> Self {
        Self {
            action: EventAction::Destroy,
            previous_line_items: None,
            occurred_at: Utc::now(),
            ..self.clone()
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        use EventAction::*;
        use EventKind::*;

        match (&self.kind, self.action) {
            (Donation, Create) => "inventory.donation.created",
            (Donation, Update) => "inventory.donation.updated",
            (Donation, Destroy) => "inventory.donation.destroyed",
            (Purchase, Create) => "inventory.purchase.created",
            (Purchase, Update) => "inventory.purchase.updated",
            (Purchase, Destroy) => "inventory.purchase.destroyed",
            (Distribution, Create) => "inventory.distribution.created",
            (Distribution, Update) => "inventory.distribution.updated",
            (Distribution, Destroy) => "inventory.distribution.destroyed",
            (Adjustment, Create) => "inventory.adjustment.created",
            (Adjustment, Update) => "inventory.adjustment.updated",
            (Adjustment, Destroy) => "inventory.adjustment.destroyed",
            (Transfer, Create) => "inventory.transfer.created",
            (Transfer, Update) => "inventory.transfer.updated",
            (Transfer, Destroy) => "inventory.transfer.destroyed",
            (Audit, Create) => "inventory.audit.created",
            (Audit, Update) => "inventory.audit.updated",
            (Audit, Destroy) => "inventory.audit.destroyed",
            (Unrecognized(_), Create) => "inventory.unrecognized.created",
            (Unrecognized(_), Update) => "inventory.unrecognized.updated",
            (Unrecognized(_), Destroy) => "inventory.unrecognized.destroyed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
