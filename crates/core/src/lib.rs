// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! sg-core: Shared primitives for the sigil real-time client
//!
//! This crate provides the pure building blocks used by the client's
//! resilience and caching layers: backoff computation, latency percentile
//! tracking, row and primary-key handling, and reference table lists.

pub mod backoff;
pub mod error;
pub mod latency;
pub mod query;
pub mod row;
pub mod tables;

pub use backoff::BackoffPolicy;
pub use error::{Error, Result};
pub use latency::{LatencyStats, PercentileTracker};
pub use query::TableQuery;
pub use row::{detect_primary_key, PrimaryKey, Row};
pub use tables::ReferenceTables;
