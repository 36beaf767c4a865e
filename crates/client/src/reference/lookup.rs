// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Primary-key lookup over one reference table.

use std::collections::HashMap;
use std::sync::Arc;

use sg_core::{detect_primary_key, PrimaryKey, Row};
use tracing::warn;

/// Rows of one table indexed by primary key, in first-seen key order.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    rows: Vec<Arc<Row>>,
    index: HashMap<PrimaryKey, usize>,
}

/// Rows set aside while building a [`LookupTable`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Rows with no usable primary key.
    pub keyless: usize,
    /// Rows that replaced an earlier row with the same key.
    pub duplicates: usize,
    /// Rows beyond the per-table limit.
    pub truncated: usize,
}

impl LookupTable {
    /// Indexes `rows` by detected primary key.
    ///
    /// Keeps the first `max_rows` distinct keys in encounter order. A later
    /// row with an already-kept key replaces the earlier one.
    pub fn build(table: &str, rows: &[Row], max_rows: usize) -> (Self, BuildReport) {
        let mut lookup = LookupTable::default();
        let mut report = BuildReport::default();

        for row in rows {
            let Some(key) = detect_primary_key(table, row) else {
                report.keyless += 1;
                warn!(table, "Row has no valid primary key, skipping");
                continue;
            };
            if let Some(&slot) = lookup.index.get(&key) {
                report.duplicates += 1;
                warn!(table, %key, "Duplicate primary key, using latest row");
                if let Some(existing) = lookup.rows.get_mut(slot) {
                    *existing = Arc::new(row.clone());
                }
                continue;
            }
            if lookup.rows.len() >= max_rows {
                report.truncated += 1;
                continue;
            }
            lookup.index.insert(key, lookup.rows.len());
            lookup.rows.push(Arc::new(row.clone()));
        }

        if report.truncated > 0 {
            warn!(
                table,
                dropped = report.truncated,
                "Table exceeds max row limit, keeping first {} rows",
                max_rows
            );
        }
        (lookup, report)
    }

    pub fn get(&self, key: &PrimaryKey) -> Option<Arc<Row>> {
        self.index.get(key).and_then(|&slot| self.rows.get(slot)).cloned()
    }

    pub fn contains(&self, key: &PrimaryKey) -> bool {
        self.index.contains_key(key)
    }

    /// Every row, in first-seen key order.
    pub fn rows(&self) -> &[Arc<Row>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
#[path = "lookup_tests.rs"]
mod tests;
