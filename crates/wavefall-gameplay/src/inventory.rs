//! Inventory system.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use wavefall_common::{CoreError, ItemId};

/// Inventory error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Not enough items
    #[error("Not enough {item}: need {needed}, have {have}")]
    NotEnough {
        /// Item requested
        item: ItemId,
        /// Amount needed
        needed: u32,
        /// Amount available
        have: u32,
    },
}

impl From<InventoryError> for CoreError {
    fn from(err: InventoryError) -> Self {
        Self::InsufficientResource(err.to_string())
    }
}

/// Result type for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Quantity ledger: item id to count. Entries never hold a zero count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    items: BTreeMap<ItemId, u32>,
}

impl Inventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of distinct items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the inventory holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the count of a specific item.
    #[must_use]
    pub fn count(&self, item: &str) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    /// Checks if the inventory contains at least the given amount.
    #[must_use]
    pub fn has(&self, item: &str, amount: u32) -> bool {
        self.count(item) >= amount
    }

    /// Adds items to the inventory. Adding zero is a no-op.
    pub fn add(&mut self, item: impl Into<ItemId>, amount: u32) {
        if amount == 0 {
            return;
        }
        let entry = self.items.entry(item.into()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Removes items from the inventory, dropping the entry at zero.
    pub fn remove(&mut self, item: &str, amount: u32) -> InventoryResult<()> {
        let current = self.count(item);
        if current < amount {
            return Err(InventoryError::NotEnough {
                item: ItemId::new(item),
                needed: amount,
                have: current,
            });
        }
        if current == amount {
            self.items.remove(item);
        } else if let Some(count) = self.items.get_mut(item) {
            *count = current - amount;
        }
        Ok(())
    }

    /// Drop zero-count entries (only needed after deserializing foreign data).
    pub fn prune(&mut self) {
        self.items.retain(|_, count| *count > 0);
    }

    /// Returns an iterator over all items.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, u32)> + '_ {
        self.items.iter().map(|(id, &count)| (id, count))
    }
}

impl<I: Into<ItemId>> FromIterator<(I, u32)> for Inventory {
    fn from_iter<T: IntoIterator<Item = (I, u32)>>(iter: T) -> Self {
        let mut inventory = Self::new();
        for (item, amount) in iter {
            inventory.add(item, amount);
        }
        inventory
    }
}
