// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Stored as TOML. Every field is optional; omitted fields take the
//! defaults below. Sections:
//! - `[reconnect]`: loop and backoff tuning
//! - `[reference]`: reference data loading, including an optional `tables` list
//! - `[latency]`: latency window and warning threshold

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sg_core::{BackoffPolicy, PercentileTracker, ReferenceTables};

use crate::error::{Error, Result};
use crate::reconnect::ReconnectOptions;
use crate::reference::ReferenceOptions;

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Load reference data after every successful `connect()`.
    #[serde(default = "default_true")]
    pub auto_load_reference_data: bool,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    /// Attempts before giving up (0 = unlimited).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_percent")]
    pub jitter_percent: u32,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    #[serde(default = "default_recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,
    #[serde(default = "default_reconnect_budget_ms")]
    pub reconnect_budget_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_table_timeout_ms")]
    pub table_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_max_rows_per_table")]
    pub max_rows_per_table: usize,
    #[serde(default = "default_max_total_rows")]
    pub max_total_rows: usize,
    #[serde(default = "default_load_budget_ms")]
    pub load_budget_ms: u64,
    /// Tables to load. The default catalog when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_warn_threshold_ms")]
    pub warn_threshold_ms: f64,
}

fn default_true() -> bool {
    true
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_percent() -> u32 {
    10
}

fn default_settle_delay_ms() -> u64 {
    100
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

fn default_recovery_timeout_ms() -> u64 {
    5000
}

fn default_reconnect_budget_ms() -> u64 {
    10_000
}

fn default_batch_size() -> usize {
    30
}

fn default_table_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_max_rows_per_table() -> usize {
    50_000
}

fn default_max_total_rows() -> usize {
    1_000_000
}

fn default_load_budget_ms() -> u64 {
    10_000
}

fn default_window_size() -> usize {
    1000
}

fn default_warn_threshold_ms() -> f64 {
    500.0
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            auto_reconnect: true,
            max_reconnect_attempts: default_max_reconnect_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_percent: default_jitter_percent(),
            settle_delay_ms: default_settle_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            recovery_timeout_ms: default_recovery_timeout_ms(),
            reconnect_budget_ms: default_reconnect_budget_ms(),
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        ReferenceConfig {
            batch_size: default_batch_size(),
            table_timeout_ms: default_table_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_rows_per_table: default_max_rows_per_table(),
            max_total_rows: default_max_total_rows(),
            load_budget_ms: default_load_budget_ms(),
            tables: None,
        }
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        LatencyConfig {
            window_size: default_window_size(),
            warn_threshold_ms: default_warn_threshold_ms(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            auto_load_reference_data: true,
            reconnect: ReconnectConfig::default(),
            reference: ReferenceConfig::default(),
            latency: LatencyConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Checks every value that would be rejected when building the client.
    pub fn validate(&self) -> Result<()> {
        self.reconnect_options()?;
        self.reference_options()?;
        self.reference_tables()?;
        self.latency_tracker()?;
        Ok(())
    }

    pub fn reconnect_options(&self) -> Result<ReconnectOptions> {
        let r = &self.reconnect;
        let backoff = BackoffPolicy::new(
            Duration::from_millis(r.initial_delay_ms),
            Duration::from_millis(r.max_delay_ms),
            r.jitter_percent,
        )?;
        if r.attempt_timeout_ms == 0 {
            return Err(sg_core::Error::ZeroValue { field: "attempt_timeout_ms" }.into());
        }
        Ok(ReconnectOptions {
            auto_reconnect: r.auto_reconnect,
            max_reconnect_attempts: r.max_reconnect_attempts,
            backoff,
            settle_delay: Duration::from_millis(r.settle_delay_ms),
            attempt_timeout: Duration::from_millis(r.attempt_timeout_ms),
            recovery_timeout: Duration::from_millis(r.recovery_timeout_ms),
            reconnect_budget: Duration::from_millis(r.reconnect_budget_ms),
        })
    }

    pub fn reference_options(&self) -> Result<ReferenceOptions> {
        let r = &self.reference;
        let nonzero = [
            ("batch_size", r.batch_size as u64),
            ("table_timeout_ms", r.table_timeout_ms),
            ("max_rows_per_table", r.max_rows_per_table as u64),
        ];
        if let Some((field, _)) = nonzero.into_iter().find(|(_, v)| *v == 0) {
            return Err(sg_core::Error::ZeroValue { field }.into());
        }
        Ok(ReferenceOptions {
            batch_size: r.batch_size,
            table_timeout: Duration::from_millis(r.table_timeout_ms),
            max_retries: r.max_retries,
            retry_base_delay: Duration::from_millis(r.retry_base_delay_ms),
            max_rows_per_table: r.max_rows_per_table,
            max_total_rows: r.max_total_rows,
            load_budget: Duration::from_millis(r.load_budget_ms),
        })
    }

    /// The configured table list, or the default catalog.
    pub fn reference_tables(&self) -> Result<ReferenceTables> {
        match &self.reference.tables {
            Some(names) => Ok(ReferenceTables::new(names.iter().cloned())?),
            None => Ok(ReferenceTables::default_catalog()),
        }
    }

    pub fn latency_tracker(&self) -> Result<PercentileTracker> {
        Ok(PercentileTracker::with_window(
            self.latency.window_size,
            self.latency.warn_threshold_ms,
        )?)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
