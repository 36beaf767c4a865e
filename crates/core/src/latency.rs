// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling-window percentile tracking for latency samples.
//!
//! Samples are kept in arrival order in a bounded buffer. A sorted copy is
//! built lazily on the first query after an insertion and reused until the
//! next one.

use std::collections::VecDeque;

use serde::Serialize;

use crate::error::{Error, Result};

/// Default number of samples retained.
pub const DEFAULT_WINDOW_SIZE: usize = 1000;

/// Default threshold above which a sample counts as slow, in milliseconds.
pub const DEFAULT_WARN_THRESHOLD_MS: f64 = 500.0;

/// Summary of the current window. All values are in milliseconds,
/// rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LatencyStats {
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: usize,
}

/// Bounded rolling buffer of samples with interpolated percentile queries.
#[derive(Debug, Clone)]
pub struct PercentileTracker {
    samples: VecDeque<f64>,
    sorted: Option<Vec<f64>>,
    capacity: usize,
    threshold_ms: f64,
}

impl PercentileTracker {
    /// Creates a tracker with the default window and threshold.
    pub fn new() -> Self {
        PercentileTracker {
            samples: VecDeque::with_capacity(DEFAULT_WINDOW_SIZE),
            sorted: None,
            capacity: DEFAULT_WINDOW_SIZE,
            threshold_ms: DEFAULT_WARN_THRESHOLD_MS,
        }
    }

    /// Creates a tracker with a custom window size and threshold.
    pub fn with_window(capacity: usize, threshold_ms: f64) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroValue { field: "window_size" });
        }
        if !threshold_ms.is_finite() || threshold_ms < 0.0 {
            return Err(Error::InvalidThreshold { field: "warn_threshold_ms" });
        }
        Ok(PercentileTracker {
            samples: VecDeque::with_capacity(capacity),
            sorted: None,
            capacity,
            threshold_ms,
        })
    }

    /// Records a sample, evicting the oldest one when the window is full.
    ///
    /// Returns true when the sample exceeds the threshold. Non-finite
    /// samples are ignored.
    pub fn record(&mut self, sample_ms: f64) -> bool {
        if !sample_ms.is_finite() {
            return false;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample_ms);
        self.sorted = None;
        sample_ms > self.threshold_ms
    }

    /// Current window statistics; all zeros when no samples are held.
    pub fn stats(&mut self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::default();
        }
        let count = self.samples.len();
        let avg = self.samples.iter().sum::<f64>() / count as f64;
        let sorted = self.sorted();
        LatencyStats {
            avg: round2(avg),
            p50: round2(interpolate(sorted, 0.50)),
            p95: round2(interpolate(sorted, 0.95)),
            p99: round2(interpolate(sorted, 0.99)),
            count,
        }
    }

    /// Interpolated value at fraction `p` (0.0..=1.0), unrounded.
    pub fn percentile(&mut self, p: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        interpolate(self.sorted(), p.clamp(0.0, 1.0))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn threshold_ms(&self) -> f64 {
        self.threshold_ms
    }

    /// Drops every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.sorted = None;
    }

    fn sorted(&mut self) -> &[f64] {
        let samples = &self.samples;
        self.sorted.get_or_insert_with(|| {
            let mut sorted: Vec<f64> = samples.iter().copied().collect();
            sorted.sort_by(f64::total_cmp);
            sorted
        })
    }
}

impl Default for PercentileTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear interpolation at `index = (n - 1) * p` over a non-empty sorted slice.
fn interpolate(sorted: &[f64], p: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    let index = last as f64 * p;
    let lower = index.floor() as usize;
    let upper = (index.ceil() as usize).min(last);
    let weight = index - lower as f64;
    match (sorted.get(lower), sorted.get(upper)) {
        (Some(lo), Some(hi)) => lo + (hi - lo) * weight,
        _ => 0.0,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "latency_tests.rs"]
mod tests;
