//! Snapshot storage shared between a manager's loop and its readers.
//!
//! [`SnapshotStore`] is a keyed table behind a reader-writer lock, with a
//! pending-change set that is drained by [`SnapshotStore::drain_changed`].
//! Writers mark keys changed inside the same critical section that mutates
//! them, so a reader can never see a change without also seeing its mark.
//!
//! Readers that prefer push over poll can await [`SnapshotStore::changes`],
//! which ticks after every write that marked something, and then drain.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use tokio::sync::watch;

/// The table a writer mutates inside [`SnapshotStore::write`].
///
/// Records are kept in the order their keys were first inserted.
#[derive(Debug)]
pub struct Table<K, V> {
    records: BTreeMap<K, V>,
    order: Vec<K>,
    pending: BTreeSet<K>,
    marks: u64,
}

impl<K: Ord + Clone, V> Table<K, V> {
    fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            order: Vec::new(),
            pending: BTreeSet::new(),
            marks: 0,
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.records.get_mut(key)
    }

    /// Return the record for `key`, creating it with `init` on first sight.
    pub fn get_or_insert_with(&mut self, key: K, init: impl FnOnce() -> V) -> &mut V {
        match self.records.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.order.push(entry.key().clone());
                entry.insert(init())
            }
        }
    }

    /// Insert or overwrite a record. Returns the previous value.
    ///
    /// Overwriting keeps the key's original position.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.records.insert(key.clone(), value);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    /// Record that `key` changed since the last drain.
    ///
    /// Marking a key several times before a drain yields a single entry.
    pub fn mark_changed(&mut self, key: K) {
        self.pending.insert(key);
        self.marks += 1;
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keys in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    fn values_in_order(&self) -> impl Iterator<Item = &V> {
        self.order.iter().filter_map(|key| self.records.get(key))
    }
}

/// Keyed snapshot table with delta tracking.
///
/// Records are returned in the order their keys were first seen.
pub struct SnapshotStore<K, V> {
    inner: RwLock<Table<K, V>>,
    changes: watch::Sender<u64>,
}

impl<K: Ord + Clone, V: Clone> Default for SnapshotStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone> SnapshotStore<K, V> {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: RwLock::new(Table::new()),
            changes,
        }
    }

    /// Mutate the table under the exclusive lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut Table<K, V>) -> R) -> R {
        let (result, marked) = {
            let mut table = self.inner.write();
            let before = table.marks;
            let result = f(&mut table);
            (result, table.marks != before)
        };
        if marked {
            self.notify();
        }
        result
    }

    /// Copy of every record.
    pub fn all(&self) -> Vec<V> {
        self.inner.read().values_in_order().cloned().collect()
    }

    /// Copy of every record, keyed.
    pub fn to_map(&self) -> BTreeMap<K, V> {
        self.inner.read().records.clone()
    }

    /// Copy of one record.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().records.get(key).cloned()
    }

    /// Every key currently stored, in first-seen order.
    pub fn keys(&self) -> Vec<K> {
        self.inner.read().order.clone()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.read().records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Check if any change is waiting to be drained.
    pub fn has_pending(&self) -> bool {
        !self.inner.read().pending.is_empty()
    }

    /// Records changed since the previous drain, clearing the pending set.
    ///
    /// Takes the exclusive lock: the read and the clear are one step.
    /// Records come back in first-seen order.
    pub fn drain_changed(&self) -> Vec<V> {
        let mut table = self.inner.write();
        if table.pending.is_empty() {
            return Vec::new();
        }
        let pending = std::mem::take(&mut table.pending);
        table
            .order
            .iter()
            .filter(|key| pending.contains(*key))
            .filter_map(|key| table.records.get(key).cloned())
            .collect()
    }

    /// Receiver that ticks whenever a write marks a change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Tick the change generation without touching the table.
    pub fn notify(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }
}

/// Single latest-value slot. Each write overwrites the previous value.
pub struct LatestValue<T> {
    slot: RwLock<Option<T>>,
    changes: watch::Sender<u64>,
}

impl<T: Clone> Default for LatestValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LatestValue<T> {
    /// Create an empty slot.
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            slot: RwLock::new(None),
            changes,
        }
    }

    /// Overwrite the slot.
    pub fn set(&self, value: T) {
        *self.slot.write() = Some(value);
        self.changes.send_modify(|generation| *generation += 1);
    }

    /// Current value, if any has been written.
    pub fn get(&self) -> Option<T> {
        self.slot.read().clone()
    }

    pub fn is_set(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Receiver that ticks on every write.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
