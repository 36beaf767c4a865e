// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Update latency monitoring.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sg_core::{LatencyStats, PercentileTracker};
use tracing::warn;

use crate::event::{ClientEvent, EventBus};

/// Records latency samples, announcing each one and warning on those
/// above the threshold.
pub struct LatencyMonitor {
    tracker: Mutex<PercentileTracker>,
    events: Arc<EventBus>,
}

impl LatencyMonitor {
    pub fn new(tracker: PercentileTracker, events: Arc<EventBus>) -> Self {
        LatencyMonitor { tracker: Mutex::new(tracker), events }
    }

    /// Records one sample. Returns true when it exceeded the threshold.
    ///
    /// Non-finite samples are dropped without an event.
    pub fn record(&self, latency_ms: f64, table: Option<&str>) -> bool {
        if !latency_ms.is_finite() {
            return false;
        }
        let (exceeded, threshold_ms) = {
            let mut tracker = self.tracker.lock();
            (tracker.record(latency_ms), tracker.threshold_ms())
        };
        self.events.emit(ClientEvent::LatencyUpdated {
            latency_ms,
            recorded_at: Utc::now(),
            table: table.map(str::to_string),
        });
        if exceeded {
            warn!(
                table = table.unwrap_or("-"),
                "Update latency {:.1}ms exceeds {}ms threshold", latency_ms, threshold_ms
            );
            self.events.emit(ClientEvent::LatencyThresholdExceeded {
                latency_ms,
                threshold_ms,
                table: table.map(str::to_string),
            });
        }
        exceeded
    }

    /// Records the delay between a server commit and `now`.
    ///
    /// Commits stamped in the future (clock skew) count as zero.
    pub fn record_commit(&self, committed_at: DateTime<Utc>, now: DateTime<Utc>, table: &str) -> bool {
        let elapsed = (now - committed_at).num_microseconds().unwrap_or(i64::MAX).max(0);
        self.record(elapsed as f64 / 1000.0, Some(table))
    }

    pub fn stats(&self) -> LatencyStats {
        self.tracker.lock().stats()
    }

    pub fn threshold_ms(&self) -> f64 {
        self.tracker.lock().threshold_ms()
    }

    pub fn clear(&self) {
        self.tracker.lock().clear();
    }
}

#[cfg(test)]
#[path = "latency_tests.rs"]
mod tests;
