// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::reference::CacheError;
use crate::transport::{SubscriptionError, TransportError};

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] sg_core::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("client has been disposed\n  hint: create a new client")]
    Disposed,
}

/// Result type alias using the client's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
