use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use pantry_core::ItemId;

use crate::error::AggregateError;

/// One (item, quantity) pair carried by an event.
///
/// `quantity` is only signed for adjustments. `item_id` is optional on the
/// wire so a producer that lost the item reference is rejected at handling
/// time instead of being silently dropped during decoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub item_id: Option<ItemId>,
    pub quantity: i64,
}

impl LineItem {
    pub fn new(item_id: ItemId, quantity: i64) -> Self {
        Self {
            item_id: Some(item_id),
            quantity,
        }
    }
}

/// Net a sequence of line items into one quantity per item.
///
/// Repeated items are summed; the result keeps first-seen order so the
/// operations derived from it are deterministic.
pub(crate) fn net_quantities(
    line_items: &[LineItem],
    field: &str,
) -> Result<Vec<(ItemId, i64)>, AggregateError> {
    let mut order: Vec<(ItemId, i64)> = Vec::with_capacity(line_items.len());
    let mut index: HashMap<ItemId, usize> = HashMap::with_capacity(line_items.len());

    for (position, line) in line_items.iter().enumerate() {
        let item_id = line.item_id.ok_or_else(|| {
            AggregateError::malformed(format!("{field}[{position}] has no item identifier"))
        })?;

        match index.get(&item_id) {
            Some(&slot) => {
                order[slot].1 = order[slot].1.checked_add(line.quantity).ok_or_else(|| {
                    AggregateError::malformed(format!(
                        "{field}[{position}] overflows the total for item {item_id}"
                    ))
                })?;
            }
            None => {
                index.insert(item_id, order.len());
                order.push((item_id, line.quantity));
            }
        }
    }

    Ok(order)
}
