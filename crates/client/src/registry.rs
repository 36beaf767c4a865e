// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of active table subscriptions.
//!
//! Entries carry a registration sequence number, so a snapshot can tell
//! which subscription for a table was registered last.

use std::collections::HashMap;

use parking_lot::Mutex;
use sg_core::TableQuery;

use crate::transport::{SubscriptionHandle, SubscriptionId};

/// A subscription the client currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSubscription {
    pub id: SubscriptionId,
    pub table: String,
    pub filter: TableQuery,
    seq: u64,
}

/// What recovery needs to re-issue one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    /// Id of the subscription being replaced.
    pub id: SubscriptionId,
    pub table: String,
    pub filter: TableQuery,
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<SubscriptionId, ActiveSubscription>,
    next_seq: u64,
}

impl RegistryInner {
    fn insert(&mut self, handle: &SubscriptionHandle, filter: TableQuery) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            handle.id.clone(),
            ActiveSubscription { id: handle.id.clone(), table: handle.table.clone(), filter, seq },
        );
    }
}

/// Thread-safe set of active subscriptions.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<RegistryInner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new subscription. Re-registering an id refreshes it.
    pub fn register(&self, handle: &SubscriptionHandle, filter: TableQuery) {
        self.inner.lock().insert(handle, filter);
    }

    pub fn unregister(&self, id: &SubscriptionId) -> Option<ActiveSubscription> {
        self.inner.lock().entries.remove(id)
    }

    /// Drops every entry for `table` and registers `handle` in their place.
    pub fn replace_table(&self, table: &str, handle: &SubscriptionHandle, filter: TableQuery) {
        let mut inner = self.inner.lock();
        inner.entries.retain(|_, sub| sub.table != table);
        inner.insert(handle, filter);
    }

    /// Removes and returns every entry, oldest first.
    pub fn clear(&self) -> Vec<ActiveSubscription> {
        let mut drained: Vec<_> = self.inner.lock().entries.drain().map(|(_, sub)| sub).collect();
        drained.sort_by_key(|sub| sub.seq);
        drained
    }

    /// Every entry, oldest first.
    pub fn active(&self) -> Vec<ActiveSubscription> {
        let mut active: Vec<_> = self.inner.lock().entries.values().cloned().collect();
        active.sort_by_key(|sub| sub.seq);
        active
    }

    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.inner.lock().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// One snapshot per distinct table, using the most recently registered
    /// filter for that table. Ordered by that registration.
    pub fn snapshot(&self) -> Vec<SubscriptionSnapshot> {
        let inner = self.inner.lock();
        let mut latest: HashMap<&str, &ActiveSubscription> = HashMap::new();
        for sub in inner.entries.values() {
            latest
                .entry(sub.table.as_str())
                .and_modify(|current| {
                    if sub.seq > current.seq {
                        *current = sub;
                    }
                })
                .or_insert(sub);
        }
        let mut winners: Vec<&ActiveSubscription> = latest.into_values().collect();
        winners.sort_by_key(|sub| sub.seq);
        winners
            .into_iter()
            .map(|sub| SubscriptionSnapshot {
                id: sub.id.clone(),
                table: sub.table.clone(),
                filter: sub.filter.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
