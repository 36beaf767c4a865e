// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborator traits for the database connection.
//!
//! The wire protocol lives behind two narrow traits:
//! - [`Transport`] owns the connection and broadcasts state changes
//! - [`SubscriptionOps`] issues table subscriptions and broadcasts row events
//!
//! Both take `&self` so a single instance can be shared between the
//! reconnection engine, the reference cache and the client facade.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sg_core::{Row, TableQuery};
use tokio::sync::broadcast;

/// Boxed, sendable future returned by collaborator trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Connect did not finish in time.
    #[error("connection timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Operation requires an open connection.
    #[error("not connected")]
    NotConnected,
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Error type for subscription operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// The server refused the subscription.
    #[error("subscription to {table} rejected: {reason}")]
    Rejected { table: String, reason: String },

    /// No subscription with this id is active.
    #[error("unknown subscription: {0}")]
    UnknownSubscription(SubscriptionId),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for subscription operations.
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

/// Connection state as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
}

/// A transport state change, with the error that caused it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChange {
    pub state: TransportState,
    pub error: Option<TransportError>,
}

impl ConnectionChange {
    pub fn new(state: TransportState) -> Self {
        ConnectionChange { state, error: None }
    }

    pub fn with_error(state: TransportState, error: TransportError) -> Self {
        ConnectionChange { state, error: Some(error) }
    }
}

/// Server-assigned subscription identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        SubscriptionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(id: &str) -> Self {
        SubscriptionId::new(id)
    }
}

/// An established subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub table: String,
}

/// A row-level change delivered for a subscribed table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableChange {
    /// Full contents of the table at subscription time.
    Snapshot(Arc<Vec<Row>>),
    Insert(Row),
    Update { old: Row, new: Row },
    Delete(Row),
}

/// A change event for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEvent {
    pub table: String,
    pub change: TableChange,
    /// Server commit time of the transaction, when the server reports it.
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl TableEvent {
    pub fn snapshot(table: impl Into<String>, rows: Vec<Row>) -> Self {
        TableEvent {
            table: table.into(),
            change: TableChange::Snapshot(Arc::new(rows)),
            commit_timestamp: None,
        }
    }

    pub fn insert(table: impl Into<String>, row: Row) -> Self {
        TableEvent { table: table.into(), change: TableChange::Insert(row), commit_timestamp: None }
    }

    pub fn update(table: impl Into<String>, old: Row, new: Row) -> Self {
        TableEvent {
            table: table.into(),
            change: TableChange::Update { old, new },
            commit_timestamp: None,
        }
    }

    pub fn delete(table: impl Into<String>, row: Row) -> Self {
        TableEvent { table: table.into(), change: TableChange::Delete(row), commit_timestamp: None }
    }

    /// Attaches a commit timestamp.
    pub fn committed_at(mut self, at: DateTime<Utc>) -> Self {
        self.commit_timestamp = Some(at);
        self
    }
}

/// Connection lifecycle of the real-time database.
///
/// Implementations broadcast every state change, including drops the
/// client did not ask for, on the channel returned by `state_changes`.
pub trait Transport: Send + Sync {
    /// Open the connection.
    fn connect(&self) -> BoxFuture<'_, TransportResult<()>>;

    /// Close the connection.
    fn disconnect(&self) -> BoxFuture<'_, TransportResult<()>>;

    /// Current connection state.
    fn state(&self) -> TransportState;

    /// Subscribe to connection state changes.
    fn state_changes(&self) -> broadcast::Receiver<ConnectionChange>;
}

/// Table subscriptions over an established connection.
pub trait SubscriptionOps: Send + Sync {
    /// Subscribe to `table` with `filter`.
    fn subscribe<'a>(
        &'a self,
        table: &'a str,
        filter: &'a TableQuery,
    ) -> BoxFuture<'a, SubscriptionResult<SubscriptionHandle>>;

    /// Cancel a subscription.
    fn unsubscribe<'a>(&'a self, id: &'a SubscriptionId) -> BoxFuture<'a, SubscriptionResult<()>>;

    /// Subscribe to row events for every subscribed table.
    fn table_events(&self) -> broadcast::Receiver<TableEvent>;
}
