// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cumulative reconnection statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Read-only copy of an engine's reconnection statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconnectionMetrics {
    /// Connect attempts made by reconnection loops.
    pub attempt_count: u64,
    pub successful_reconnects: u64,
    pub failed_reconnects: u64,
    /// Mean time from loss to reconnection over successful reconnects.
    pub avg_reconnect_time: Duration,
    pub last_reconnect_duration: Duration,
    pub last_reconnect_at: Option<DateTime<Utc>>,
}

/// Accumulates [`ReconnectionMetrics`].
#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    metrics: ReconnectionMetrics,
    total_reconnect_time: Duration,
}

impl MetricsRecorder {
    pub(crate) fn record_attempt(&mut self) {
        self.metrics.attempt_count += 1;
    }

    pub(crate) fn record_success(&mut self, duration: Duration) {
        let m = &mut self.metrics;
        m.successful_reconnects += 1;
        m.last_reconnect_duration = duration;
        m.last_reconnect_at = Some(Utc::now());
        self.total_reconnect_time += duration;
        let count = u32::try_from(m.successful_reconnects).unwrap_or(u32::MAX);
        m.avg_reconnect_time = self.total_reconnect_time / count;
    }

    pub(crate) fn record_failure(&mut self) {
        self.metrics.failed_reconnects += 1;
    }

    pub(crate) fn snapshot(&self) -> ReconnectionMetrics {
        self.metrics.clone()
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
