// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection resilience.
//!
//! ```text
//! ┌─────────────┐ state  ┌──────────────────┐ snapshot ┌──────────────┐
//! │  Transport  │───────►│ ReconnectionEngine│◄────────│   Registry   │
//! │   (trait)   │◄───────│  (watcher + loop) │────────►│              │
//! └─────────────┘connect └──────────────────┘ restore  └──────────────┘
//!                                 │
//!                                 ▼
//!                          ┌─────────────┐
//!                          │  EventBus   │
//!                          └─────────────┘
//! ```
//!
//! A watcher task listens for transport state changes. An unexpected drop
//! from `Connected` snapshots the registry and starts a single backoff loop;
//! once a connect succeeds the snapshotted subscriptions are re-issued.

mod engine;
mod metrics;
mod recovery;
mod state;

pub use engine::{
    ReconnectOptions, ReconnectionEngine, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_BUDGET, DEFAULT_SETTLE_DELAY,
};
pub use metrics::ReconnectionMetrics;
pub use recovery::{RecoverySummary, DEFAULT_RECOVERY_TIMEOUT};
pub use state::{ConnectionStatus, Transition};
