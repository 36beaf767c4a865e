// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Jittered, capped exponential backoff.
//!
//! The delay for a zero-based attempt `a` is:
//!
//! ```text
//! floor(min(initial * 2^a, max) * U[1 - j/100, 1 + j/100])
//! ```
//!
//! The policy itself is immutable; randomness is drawn per call.

use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Default ceiling for any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Default jitter, as a percentage of the capped delay.
pub const DEFAULT_JITTER_PERCENT: u32 = 10;

// 2^63 ms is already far beyond any sane ceiling.
const MAX_EXPONENT: u32 = 63;

/// Exponential backoff with a ceiling and symmetric jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    jitter_percent: u32,
}

impl BackoffPolicy {
    /// Creates a validated policy.
    ///
    /// Rejects a zero initial delay, a ceiling below the initial delay,
    /// and jitter above 100%.
    pub fn new(initial_delay: Duration, max_delay: Duration, jitter_percent: u32) -> Result<Self> {
        if initial_delay.is_zero() {
            return Err(Error::InvalidBackoff("initial delay must be greater than zero".into()));
        }
        if max_delay < initial_delay {
            return Err(Error::InvalidBackoff(format!(
                "max delay ({}ms) must not be below initial delay ({}ms)",
                max_delay.as_millis(),
                initial_delay.as_millis()
            )));
        }
        if jitter_percent > 100 {
            return Err(Error::InvalidBackoff(format!(
                "jitter must be at most 100%, got {jitter_percent}%"
            )));
        }
        Ok(BackoffPolicy { initial_delay, max_delay, jitter_percent })
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter_percent(&self) -> u32 {
        self.jitter_percent
    }

    /// Capped exponential delay for `attempt` before jitter is applied.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.delay_with_factor(attempt, 1.0)
    }

    /// Inclusive bounds of the jitter multiplier.
    pub fn jitter_range(&self) -> (f64, f64) {
        let spread = f64::from(self.jitter_percent) / 100.0;
        (1.0 - spread, 1.0 + spread)
    }

    /// Jittered delay for a zero-based attempt, using the thread-local RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::thread_rng())
    }

    /// Jittered delay drawing the multiplier from `rng`.
    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let factor = if self.jitter_percent == 0 {
            1.0
        } else {
            let (low, high) = self.jitter_range();
            rng.gen_range(low..=high)
        };
        self.delay_with_factor(attempt, factor)
    }

    /// Delay for `attempt` with an explicit jitter multiplier.
    ///
    /// The factor is clamped to the policy's jitter range, so this is the
    /// deterministic counterpart of [`BackoffPolicy::delay`].
    pub fn delay_with_factor(&self, attempt: u32, factor: f64) -> Duration {
        let (low, high) = self.jitter_range();
        let factor = if factor.is_nan() { 1.0 } else { factor.clamp(low, high) };

        let initial_ms = self.initial_delay.as_secs_f64() * 1000.0;
        let max_ms = self.max_delay.as_secs_f64() * 1000.0;
        let exponent = attempt.min(MAX_EXPONENT) as i32;
        let capped = (initial_ms * 2f64.powi(exponent)).min(max_ms);

        Duration::from_millis((capped * factor).floor() as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_percent: DEFAULT_JITTER_PERCENT,
        }
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
