// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client notifications.
//!
//! Every observable occurrence is one variant of [`ClientEvent`], fanned out
//! to any number of observers over a broadcast channel. Closing the bus ends
//! every observer's stream.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::reconnect::{ConnectionStatus, RecoverySummary};
use crate::reference::LoadMetrics;
use crate::transport::SubscriptionId;

/// Default number of events buffered per observer before it lags.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A notification produced by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The session status changed.
    ConnectionChanged {
        status: ConnectionStatus,
        reason: Option<String>,
        /// Set on `Reconnecting`.
        attempt: Option<u32>,
        /// Set on `Reconnecting`.
        next_delay: Option<Duration>,
    },
    /// A single reconnect attempt failed; the loop continues.
    ReconnectAttemptFailed { attempt: u32, error: String },
    SubscriptionRestored { table: String, subscription_id: SubscriptionId },
    SubscriptionRestoreFailed { table: String, error: String },
    /// The recovery batch did not finish within its timeout.
    RecoveryTimedOut { elapsed: Duration, timeout: Duration },
    SubscriptionsRecovered(RecoverySummary),
    /// A reconnect took longer than the budget. Informational only.
    ReconnectBudgetExceeded { duration: Duration, threshold: Duration },
    ReferenceLoadProgress { loaded: usize, total: usize, table: String },
    ReferenceLoadMetrics(LoadMetrics),
    ReferenceDataLoaded { cached: bool },
    /// One latency sample was recorded.
    LatencyUpdated { latency_ms: f64, recorded_at: DateTime<Utc>, table: Option<String> },
    LatencyThresholdExceeded { latency_ms: f64, threshold_ms: f64, table: Option<String> },
}

impl ClientEvent {
    /// A status change with no extra detail.
    pub fn status(status: ConnectionStatus) -> Self {
        ClientEvent::ConnectionChanged { status, reason: None, attempt: None, next_delay: None }
    }

    /// A status change with a reason.
    pub fn status_with_reason(status: ConnectionStatus, reason: impl Into<String>) -> Self {
        ClientEvent::ConnectionChanged {
            status,
            reason: Some(reason.into()),
            attempt: None,
            next_delay: None,
        }
    }

    /// Short, stable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::ConnectionChanged { .. } => "connection_changed",
            ClientEvent::ReconnectAttemptFailed { .. } => "reconnect_attempt_failed",
            ClientEvent::SubscriptionRestored { .. } => "subscription_restored",
            ClientEvent::SubscriptionRestoreFailed { .. } => "subscription_restore_failed",
            ClientEvent::RecoveryTimedOut { .. } => "recovery_timed_out",
            ClientEvent::SubscriptionsRecovered(_) => "subscriptions_recovered",
            ClientEvent::ReconnectBudgetExceeded { .. } => "reconnect_budget_exceeded",
            ClientEvent::ReferenceLoadProgress { .. } => "reference_load_progress",
            ClientEvent::ReferenceLoadMetrics(_) => "reference_load_metrics",
            ClientEvent::ReferenceDataLoaded { .. } => "reference_data_loaded",
            ClientEvent::LatencyUpdated { .. } => "latency_updated",
            ClientEvent::LatencyThresholdExceeded { .. } => "latency_threshold_exceeded",
        }
    }
}

/// Broadcast fan-out of [`ClientEvent`]s.
pub struct EventBus {
    tx: Mutex<Option<broadcast::Sender<ClientEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        EventBus { tx: Mutex::new(Some(tx)) }
    }

    /// Returns a new observer. After [`EventBus::close`] the receiver
    /// reports `Closed` immediately.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Publishes an event. Events with no observers are dropped.
    pub fn emit(&self, event: ClientEvent) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Drops the sender, ending every observer's stream. Idempotent.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.lock().as_ref().map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
