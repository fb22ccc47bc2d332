//! Bounded membership sets
//!
//! A dense array plus a position index: O(1) membership test, append and
//! swap-remove, with a hard capacity. Order is not meaningful and is not
//! preserved by removal.

use crate::errors::{FarmingError, Result};
use drip_types::{AccountId, FarmId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    Duplicate,
    Full { capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedSet<T: Eq + Hash> {
    items: Vec<T>,
    positions: HashMap<T, usize>,
    capacity: usize,
}

impl<T: Copy + Eq + Hash> BoundedSet<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.positions.contains_key(item)
    }

    pub fn at(&self, index: usize) -> Option<T> {
        self.items.get(index).copied()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn insert(&mut self, item: T) -> std::result::Result<(), InsertError> {
        if self.contains(&item) {
            return Err(InsertError::Duplicate);
        }
        if self.items.len() >= self.capacity {
            return Err(InsertError::Full {
                capacity: self.capacity,
            });
        }
        self.positions.insert(item, self.items.len());
        self.items.push(item);
        Ok(())
    }

    /// Remove `item` by moving the last entry into its slot.
    pub fn swap_remove(&mut self, item: &T) -> bool {
        let Some(index) = self.positions.remove(item) else {
            return false;
        };
        self.items.swap_remove(index);
        if let Some(moved) = self.items.get(index) {
            self.positions.insert(*moved, index);
        }
        true
    }
}

/// Farms joined by each account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memberships {
    sets: HashMap<AccountId, BoundedSet<FarmId>>,
    capacity: usize,
}

impl Memberships {
    pub fn new(capacity: usize) -> Self {
        Self {
            sets: HashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, account: &AccountId, farm: &FarmId) -> bool {
        self.sets
            .get(account)
            .map(|set| set.contains(farm))
            .unwrap_or(false)
    }

    pub fn farms(&self, account: &AccountId) -> &[FarmId] {
        self.sets
            .get(account)
            .map(|set| set.as_slice())
            .unwrap_or(&[])
    }

    pub fn count(&self, account: &AccountId) -> usize {
        self.sets.get(account).map(|set| set.len()).unwrap_or(0)
    }

    pub fn at(&self, account: &AccountId, index: usize) -> Option<FarmId> {
        self.sets.get(account).and_then(|set| set.at(index))
    }

    /// Fail with the error `join` would produce, without mutating.
    pub fn check_join(&self, account: &AccountId, farm: &FarmId) -> Result<()> {
        if self.contains(account, farm) {
            return Err(FarmingError::AlreadyFarming(*farm));
        }
        if self.count(account) >= self.capacity {
            return Err(FarmingError::CapacityExceeded {
                resource: "user farms",
                limit: self.capacity,
            });
        }
        Ok(())
    }

    pub fn join(&mut self, account: &AccountId, farm: FarmId) -> Result<()> {
        self.check_join(account, &farm)?;
        let capacity = self.capacity;
        let set = self
            .sets
            .entry(*account)
            .or_insert_with(|| BoundedSet::with_capacity(capacity));
        set.insert(farm).map_err(|err| match err {
            InsertError::Duplicate => FarmingError::AlreadyFarming(farm),
            InsertError::Full { capacity } => FarmingError::CapacityExceeded {
                resource: "user farms",
                limit: capacity,
            },
        })
    }

    pub fn quit(&mut self, account: &AccountId, farm: &FarmId) -> Result<()> {
        let removed = self
            .sets
            .get_mut(account)
            .map(|set| set.swap_remove(farm))
            .unwrap_or(false);
        if !removed {
            return Err(FarmingError::AlreadyExited(*farm));
        }
        if self.sets.get(account).map(|set| set.is_empty()).unwrap_or(false) {
            self.sets.remove(account);
        }
        Ok(())
    }

    /// Number of accounts with at least one membership.
    pub fn accounts(&self) -> usize {
        self.sets.len()
    }
}
