// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! sigil-client: Resilience and caching for a real-time database client
//!
//! The transport and subscription service are supplied through the
//! [`Transport`] and [`SubscriptionOps`] traits. On top of them this crate
//! provides:
//! - [`ReconnectionEngine`]: automatic reconnection with jittered
//!   exponential backoff and subscription recovery
//! - [`ReferenceDataCache`]: one-shot, batched loading of immutable
//!   reference tables with primary-key lookup
//! - [`LiveTables`]: mutable caches of subscribed tables
//! - [`LatencyMonitor`]: rolling update-latency percentiles
//! - [`Client`]: a facade wiring all of the above
//!
//! Every observable occurrence is a [`ClientEvent`] on a broadcast channel.

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod latency;
pub mod live;
pub mod reconnect;
pub mod reference;
pub mod registry;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use event::{ClientEvent, EventBus};
pub use latency::LatencyMonitor;
pub use live::LiveTables;
pub use reconnect::{
    ConnectionStatus, ReconnectOptions, ReconnectionEngine, ReconnectionMetrics, RecoverySummary,
};
pub use reference::{
    CacheError, LoadMetrics, LoadOutcome, LoadingState, ReferenceDataCache, ReferenceOptions,
};
pub use registry::{ActiveSubscription, SubscriptionRegistry};
pub use transport::{
    ConnectionChange, SubscriptionError, SubscriptionHandle, SubscriptionId, SubscriptionOps,
    TableChange, TableEvent, Transport, TransportError, TransportState,
};

pub use sg_core::{
    BackoffPolicy, LatencyStats, PercentileTracker, PrimaryKey, ReferenceTables, Row, TableQuery,
};
