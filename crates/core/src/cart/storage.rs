//! Key-value storage seen by the cart.

use std::collections::{BTreeSet, HashMap};

/// A string key-value store backing one side of the cart.
///
/// Implementations must not fail loudly: a write that cannot be completed is
/// dropped (and logged by the implementation if it cares). The cart is a
/// convenience cache, the order record created at checkout is the source of
/// truth.
pub trait CartStorage {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str);

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&mut self, key: &str);
}

impl<S: CartStorage + ?Sized> CartStorage for &mut S {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        (**self).set(key, value);
    }

    fn remove(&mut self, key: &str) {
        (**self).remove(key);
    }
}

/// Net effect of a batch of writes on one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChange {
    pub key: String,
    /// `None` means the key was removed.
    pub value: Option<String>,
}

/// In-memory [`CartStorage`] that journals which keys were written.
///
/// The storefront preloads one of these per backend from its async stores,
/// lets the synchronous cart run against it, then replays
/// [`drain_changes`](Self::drain_changes) onto the real backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
    dirty: BTreeSet<String>,
}

impl MemoryStorage {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding one entry that is not considered a change.
    #[must_use]
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut storage = Self::new();
        storage.preload(key, value);
        storage
    }

    /// Insert an existing value without journaling it.
    pub fn preload(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Whether `key` currently holds a value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether anything was written since creation or the last drain.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Take the final state of every written key, ordered by key.
    pub fn drain_changes(&mut self) -> Vec<StagedChange> {
        std::mem::take(&mut self.dirty)
            .into_iter()
            .map(|key| {
                let value = self.entries.get(&key).cloned();
                StagedChange { key, value }
            })
            .collect()
    }
}

impl CartStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_owned(), value.to_owned());
        self.dirty.insert(key.to_owned());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.dirty.insert(key.to_owned());
    }
}
