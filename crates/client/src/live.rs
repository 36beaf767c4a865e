// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Mutable caches of subscribed tables, kept current from table events.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use sg_core::row::{key_from_fields, LIVE_KEY_FIELDS};
use sg_core::{PrimaryKey, Row};
use tracing::{debug, trace};

use crate::transport::{TableChange, TableEvent};

/// Rows kept per table before the oldest is evicted.
pub const DEFAULT_MAX_LIVE_ROWS: usize = 10_000;

#[derive(Debug, Default)]
struct LiveTable {
    rows: HashMap<PrimaryKey, (u64, Arc<Row>)>,
    /// Insertion sequence to key, oldest first.
    order: BTreeMap<u64, PrimaryKey>,
    next_seq: u64,
}

impl LiveTable {
    fn upsert(&mut self, key: PrimaryKey, row: Row, capacity: usize) {
        if let Some(slot) = self.rows.get_mut(&key) {
            slot.1 = Arc::new(row);
            return;
        }
        while self.rows.len() >= capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.rows.remove(&oldest);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.rows.insert(key, (seq, Arc::new(row)));
    }

    fn remove(&mut self, key: &PrimaryKey) {
        if let Some((seq, _)) = self.rows.remove(key) {
            self.order.remove(&seq);
        }
    }

    fn rows(&self) -> Vec<Arc<Row>> {
        self.order
            .values()
            .filter_map(|key| self.rows.get(key).map(|(_, row)| Arc::clone(row)))
            .collect()
    }
}

/// Per-table row maps keyed by `id`, `entity_id` or `player_id`.
///
/// Rows without any of those fields are not tracked.
pub struct LiveTables {
    tables: RwLock<HashMap<String, LiveTable>>,
    capacity: usize,
}

impl LiveTables {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_LIVE_ROWS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        LiveTables { tables: RwLock::new(HashMap::new()), capacity: capacity.max(1) }
    }

    /// Applies one table event.
    pub fn apply(&self, event: &TableEvent) {
        let mut tables = self.tables.write();
        let table = tables.entry(event.table.clone()).or_default();
        match &event.change {
            TableChange::Snapshot(rows) => {
                *table = LiveTable::default();
                for row in rows.iter() {
                    self.upsert(&event.table, table, row);
                }
                debug!(table = %event.table, rows = table.rows.len(), "Live table snapshot applied");
            }
            TableChange::Insert(row) => self.upsert(&event.table, table, row),
            TableChange::Update { old, new } => {
                let old_key = key_from_fields(LIVE_KEY_FIELDS, old);
                let new_key = key_from_fields(LIVE_KEY_FIELDS, new);
                if let Some(old_key) = old_key.filter(|k| Some(k) != new_key.as_ref()) {
                    table.remove(&old_key);
                }
                self.upsert(&event.table, table, new);
            }
            TableChange::Delete(row) => {
                if let Some(key) = key_from_fields(LIVE_KEY_FIELDS, row) {
                    table.remove(&key);
                }
            }
        }
    }

    fn upsert(&self, name: &str, table: &mut LiveTable, row: &Row) {
        match key_from_fields(LIVE_KEY_FIELDS, row) {
            Some(key) => table.upsert(key, row.clone(), self.capacity),
            None => trace!(table = name, "Live row has no key field, skipping"),
        }
    }

    pub fn get(&self, table: &str, key: impl Into<PrimaryKey>) -> Option<Arc<Row>> {
        let key = key.into();
        let tables = self.tables.read();
        tables.get(table)?.rows.get(&key).map(|(_, row)| Arc::clone(row))
    }

    /// Rows of `table`, oldest first. Empty for an unknown table.
    pub fn get_all(&self, table: &str) -> Vec<Arc<Row>> {
        self.tables.read().get(table).map(LiveTable::rows).unwrap_or_default()
    }

    pub fn query<F>(&self, table: &str, predicate: F) -> Vec<Arc<Row>>
    where
        F: Fn(&Row) -> bool,
    {
        self.get_all(table).into_iter().filter(|row| predicate(row)).collect()
    }

    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, |t| t.rows.len())
    }

    /// Names of every table seen so far.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn clear(&self) {
        self.tables.write().clear();
    }
}

impl Default for LiveTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "live_tests.rs"]
mod tests;
