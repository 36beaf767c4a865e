// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for sg-core operations.

use thiserror::Error;

/// Configuration errors raised while building core components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid backoff: {0}")]
    InvalidBackoff(String),

    #[error("invalid table name: '{0}'\n  hint: table names are 1-64 characters of letters, digits and '_'")]
    InvalidTableName(String),

    #[error("duplicate table name: '{0}'")]
    DuplicateTable(String),

    #[error("reference table list is empty")]
    EmptyTableList,

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("{field} must be a finite, non-negative number")]
    InvalidThreshold { field: &'static str },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for sg-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
