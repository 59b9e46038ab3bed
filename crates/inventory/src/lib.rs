//! Inventory aggregation kernel (event-sourced).
//!
//! Derives quantity-on-hand per organization, storage location and item from
//! an ordered stream of [`InventoryEvent`]s. Everything here is deterministic
//! domain logic: no IO, no clocks beyond event construction, no storage.

pub mod aggregate;
pub mod error;
pub mod event;
pub mod handlers;
pub mod line_item;
pub mod snapshot;

pub use aggregate::InventoryAggregate;
pub use error::AggregateError;
pub use event::{EventAction, EventKind, InventoryEvent};
pub use handlers::{StockOperation, operations_for};
pub use line_item::LineItem;
pub use snapshot::{InventorySnapshot, LocationInventory};
