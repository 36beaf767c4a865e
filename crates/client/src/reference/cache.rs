// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reference data cache.
//!
//! Loads every configured table once: tables are split into batches that
//! load one after another, and tables within a batch load concurrently.
//! Each table is subscribed, its snapshot captured, and the subscription
//! dropped again. The resulting lookups survive reconnects and are only
//! rebuilt by [`ReferenceDataCache::clear`] or
//! [`ReferenceDataCache::force_reload`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sg_core::{PrimaryKey, ReferenceTables, Row, TableQuery};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::lookup::LookupTable;
use crate::event::{ClientEvent, EventBus};
use crate::transport::{SubscriptionOps, TableChange, TableEvent, Transport, TransportState};

pub const DEFAULT_BATCH_SIZE: usize = 30;
pub const DEFAULT_TABLE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_ROWS_PER_TABLE: usize = 50_000;
pub const DEFAULT_MAX_TOTAL_ROWS: usize = 1_000_000;
pub const DEFAULT_LOAD_BUDGET: Duration = Duration::from_secs(10);

/// Error type for reference cache operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cannot load reference data: not connected")]
    NotConnected,

    #[error("reference data is already loading")]
    LoadInProgress,

    #[error("reference data was cleared while loading")]
    ClearedDuringLoad,

    #[error("reference data not loaded (state: {state})\n  hint: call load() first")]
    NotLoaded { state: LoadingState },

    #[error("unknown reference table: '{0}'")]
    UnknownTable(String),

    #[error("reference table not cached: '{0}'")]
    TableNotCached(String),

    #[error("failed to load reference table {table}: {reason}")]
    TableLoad { table: String, reason: String },

    #[error("timed out after {}ms waiting for snapshot of {table}", .timeout.as_millis())]
    Timeout { table: String, timeout: Duration },

    #[error("failed to decode row from {table}: {reason}")]
    Decode { table: String, reason: String },
}

/// Result type for reference cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Lifecycle of the cache contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingState {
    Idle,
    Loading,
    Loaded,
}

impl std::fmt::Display for LoadingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LoadingState::Idle => "idle",
            LoadingState::Loading => "loading",
            LoadingState::Loaded => "loaded",
        })
    }
}

/// Timing and outcome of one completed load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadMetrics {
    pub total_time: Duration,
    /// Tables that loaded successfully.
    pub table_count: usize,
    pub avg_time_per_table: Duration,
    pub failed_tables: Vec<String>,
    pub cached_at: DateTime<Utc>,
}

/// Result of [`ReferenceDataCache::load`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(LoadMetrics),
    /// Data was already cached; nothing was fetched.
    Cached,
}

/// Tuning for a [`ReferenceDataCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceOptions {
    pub batch_size: usize,
    pub table_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub max_rows_per_table: usize,
    pub max_total_rows: usize,
    pub load_budget: Duration,
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            table_timeout: DEFAULT_TABLE_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_rows_per_table: DEFAULT_MAX_ROWS_PER_TABLE,
            max_total_rows: DEFAULT_MAX_TOTAL_ROWS,
            load_budget: DEFAULT_LOAD_BUDGET,
        }
    }
}

struct CacheState {
    loading: LoadingState,
    tables: HashMap<String, Arc<LookupTable>>,
    metrics: Option<LoadMetrics>,
    /// Bumped by every clear; a load only commits if it is unchanged.
    generation: u64,
}

/// In-memory cache of immutable reference tables.
pub struct ReferenceDataCache {
    transport: Arc<dyn Transport>,
    ops: Arc<dyn SubscriptionOps>,
    events: Arc<EventBus>,
    tables: ReferenceTables,
    options: ReferenceOptions,
    state: RwLock<CacheState>,
    load_running: AtomicBool,
}

/// Releases the load slot; resets `Loading` to `Idle` if the load did not
/// complete.
struct LoadGuard<'a> {
    cache: &'a ReferenceDataCache,
    completed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            let mut state = self.cache.state.write();
            if state.loading == LoadingState::Loading {
                state.loading = LoadingState::Idle;
            }
        }
        self.cache.load_running.store(false, Ordering::Release);
    }
}

impl ReferenceDataCache {
    pub fn new(
        transport: Arc<dyn Transport>,
        ops: Arc<dyn SubscriptionOps>,
        events: Arc<EventBus>,
        tables: ReferenceTables,
        options: ReferenceOptions,
    ) -> Self {
        ReferenceDataCache {
            transport,
            ops,
            events,
            tables,
            options,
            state: RwLock::new(CacheState {
                loading: LoadingState::Idle,
                tables: HashMap::new(),
                metrics: None,
                generation: 0,
            }),
            load_running: AtomicBool::new(false),
        }
    }

    pub fn loading_state(&self) -> LoadingState {
        self.state.read().loading
    }

    /// True once a load has completed with at least one table.
    pub fn is_cached(&self) -> bool {
        let state = self.state.read();
        state.loading == LoadingState::Loaded && !state.tables.is_empty()
    }

    pub fn metrics(&self) -> Option<LoadMetrics> {
        self.state.read().metrics.clone()
    }

    /// Rows held across every cached table.
    pub fn total_rows(&self) -> usize {
        self.state.read().tables.values().map(|t| t.len()).sum()
    }

    /// The configured table list.
    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    pub fn options(&self) -> &ReferenceOptions {
        &self.options
    }

    /// Loads every configured table unless already cached.
    ///
    /// Tables that still fail after retries are listed in the metrics'
    /// `failed_tables`; they do not fail the load.
    pub async fn load(&self) -> CacheResult<LoadOutcome> {
        if self.transport.state() != TransportState::Connected {
            return Err(CacheError::NotConnected);
        }
        if self.is_cached() {
            debug!("Reference data already cached");
            self.events.emit(ClientEvent::ReferenceDataLoaded { cached: true });
            return Ok(LoadOutcome::Cached);
        }
        if self
            .load_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CacheError::LoadInProgress);
        }
        let mut guard = LoadGuard { cache: self, completed: false };
        let generation = {
            let mut state = self.state.write();
            state.loading = LoadingState::Loading;
            state.generation
        };

        let started = Instant::now();
        let total = self.tables.len();
        let mut loaded: HashMap<String, Arc<LookupTable>> = HashMap::new();
        let mut failed_tables = Vec::new();

        for batch in self.tables.batches(self.options.batch_size) {
            let mut pending: FuturesUnordered<_> = batch
                .iter()
                .map(|table| async move { (table, self.load_table_with_retry(table).await) })
                .collect();

            while let Some((table, result)) = pending.next().await {
                match result {
                    Ok(lookup) => {
                        loaded.insert(table.clone(), Arc::new(lookup));
                        self.events.emit(ClientEvent::ReferenceLoadProgress {
                            loaded: loaded.len(),
                            total,
                            table: table.clone(),
                        });
                    }
                    Err(e) => {
                        warn!("Failed to load reference table {}: {}", table, e);
                        failed_tables.push(table.clone());
                    }
                }
            }
        }

        let total_time = started.elapsed();
        let table_count = loaded.len();
        let avg_time_per_table = match u32::try_from(table_count) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => total_time / n,
        };
        let metrics = LoadMetrics {
            total_time,
            table_count,
            avg_time_per_table,
            failed_tables,
            cached_at: Utc::now(),
        };

        let total_rows: usize = loaded.values().map(|t| t.len()).sum();
        if total_rows > self.options.max_total_rows {
            warn!(
                "Reference cache holds {} rows, above the {} row limit",
                total_rows, self.options.max_total_rows
            );
        }
        if total_time > self.options.load_budget {
            warn!(
                "Reference data load took {}ms, exceeding the {}ms budget",
                total_time.as_millis(),
                self.options.load_budget.as_millis()
            );
        }

        let committed = {
            let mut state = self.state.write();
            let current = state.generation == generation;
            if current {
                state.tables = loaded;
                state.loading = LoadingState::Loaded;
                state.metrics = Some(metrics.clone());
            }
            current
        };
        if !committed {
            debug!("Reference cache cleared during load, discarding result");
            return Err(CacheError::ClearedDuringLoad);
        }
        guard.completed = true;
        drop(guard);

        info!(
            tables = metrics.table_count,
            failed = metrics.failed_tables.len(),
            rows = total_rows,
            "Reference data loaded in {}ms",
            total_time.as_millis()
        );
        self.events.emit(ClientEvent::ReferenceLoadMetrics(metrics.clone()));
        self.events.emit(ClientEvent::ReferenceDataLoaded { cached: false });
        Ok(LoadOutcome::Loaded(metrics))
    }

    /// Drops all cached rows and metrics and returns to `Idle`.
    ///
    /// A load still running is discarded when it finishes.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.tables.clear();
        state.metrics = None;
        state.loading = LoadingState::Idle;
        state.generation += 1;
    }

    /// Clears the cache and loads it again.
    pub async fn force_reload(&self) -> CacheResult<LoadOutcome> {
        self.clear();
        self.load().await
    }

    /// Looks up one row by primary key.
    pub fn get(&self, table: &str, key: impl Into<PrimaryKey>) -> CacheResult<Option<Arc<Row>>> {
        Ok(self.table(table)?.get(&key.into()))
    }

    /// Every row of `table`.
    pub fn get_all(&self, table: &str) -> CacheResult<Vec<Arc<Row>>> {
        Ok(self.table(table)?.rows().to_vec())
    }

    /// Rows of `table` matching `predicate`.
    pub fn query<F>(&self, table: &str, predicate: F) -> CacheResult<Vec<Arc<Row>>>
    where
        F: Fn(&Row) -> bool,
    {
        let lookup = self.table(table)?;
        Ok(lookup.rows().iter().filter(|row| predicate(row)).cloned().collect())
    }

    /// Looks up one row and deserializes it into `T`.
    pub fn get_as<T: DeserializeOwned>(
        &self,
        table: &str,
        key: impl Into<PrimaryKey>,
    ) -> CacheResult<Option<T>> {
        let Some(row) = self.get(table, key)? else {
            return Ok(None);
        };
        serde_json::from_value(serde_json::Value::Object(row.as_ref().clone()))
            .map(Some)
            .map_err(|e| CacheError::Decode { table: table.to_string(), reason: e.to_string() })
    }

    fn table(&self, table: &str) -> CacheResult<Arc<LookupTable>> {
        let state = self.state.read();
        if state.loading != LoadingState::Loaded {
            return Err(CacheError::NotLoaded { state: state.loading });
        }
        if !self.tables.contains(table) {
            return Err(CacheError::UnknownTable(table.to_string()));
        }
        state
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| CacheError::TableNotCached(table.to_string()))
    }

    async fn load_table_with_retry(&self, table: &str) -> CacheResult<LookupTable> {
        let mut retry = 0;
        loop {
            match self.load_table(table).await {
                Ok(lookup) => return Ok(lookup),
                Err(e) if retry < self.options.max_retries => {
                    let delay = self.options.retry_base_delay.saturating_mul(2u32.saturating_pow(retry));
                    debug!(
                        table,
                        retry,
                        "Reference table load failed, retrying in {}ms: {}",
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn load_table(&self, table: &str) -> CacheResult<LookupTable> {
        let timeout = self.options.table_timeout;
        let deadline = Instant::now() + timeout;
        let timed_out = || CacheError::Timeout { table: table.to_string(), timeout };

        // Listen before subscribing so the snapshot cannot be missed.
        let mut events = self.ops.table_events();
        let handle = tokio::time::timeout_at(deadline, self.ops.subscribe(table, &TableQuery::All))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| CacheError::TableLoad { table: table.to_string(), reason: e.to_string() })?;

        let snapshot = tokio::time::timeout_at(deadline, wait_for_snapshot(&mut events, table))
            .await
            .map_err(|_| timed_out())
            .and_then(|rows| rows);

        if let Err(e) = self.ops.unsubscribe(&handle.id).await {
            debug!(table, "Failed to unsubscribe reference table: {}", e);
        }

        let rows = snapshot?;
        let (lookup, _) = LookupTable::build(table, &rows, self.options.max_rows_per_table);
        Ok(lookup)
    }
}

async fn wait_for_snapshot(
    events: &mut broadcast::Receiver<TableEvent>,
    table: &str,
) -> CacheResult<Arc<Vec<Row>>> {
    loop {
        match events.recv().await {
            Ok(event) if event.table == table => {
                if let TableChange::Snapshot(rows) = event.change {
                    return Ok(rows);
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => {
                warn!(table, "Reference loader lagged by {} table events", n);
            }
            Err(RecvError::Closed) => {
                return Err(CacheError::TableLoad {
                    table: table.to_string(),
                    reason: "table event stream closed".into(),
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
