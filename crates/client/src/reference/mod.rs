// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable reference data, loaded once per session and served from memory.

mod cache;
mod lookup;

pub use cache::{
    CacheError, CacheResult, LoadMetrics, LoadOutcome, LoadingState, ReferenceDataCache,
    ReferenceOptions, DEFAULT_BATCH_SIZE, DEFAULT_LOAD_BUDGET, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_ROWS_PER_TABLE, DEFAULT_MAX_TOTAL_ROWS, DEFAULT_RETRY_BASE_DELAY,
    DEFAULT_TABLE_TIMEOUT,
};
pub use lookup::{BuildReport, LookupTable};
