// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable collaborators for unit tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use sg_core::{Row, TableQuery};
use tokio::sync::broadcast;

use crate::event::ClientEvent;
use crate::transport::{
    BoxFuture, ConnectionChange, SubscriptionError, SubscriptionHandle, SubscriptionId,
    SubscriptionOps, SubscriptionResult, TableEvent, Transport, TransportError, TransportResult,
    TransportState,
};

/// Builds a row from a JSON object literal.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

/// How a mocked call behaves.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail(String),
    /// Never completes.
    Hang,
    /// Succeeds after a delay.
    Delay(Duration),
}

/// In-memory transport with scripted connect results.
pub struct MockTransport {
    state: Mutex<TransportState>,
    changes: broadcast::Sender<ConnectionChange>,
    script: Mutex<VecDeque<Behavior>>,
    fallback: Mutex<Behavior>,
    connect_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(64);
        Arc::new(MockTransport {
            state: Mutex::new(TransportState::Disconnected),
            changes,
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Behavior::Succeed),
            connect_calls: AtomicUsize::new(0),
        })
    }

    /// Queues the behavior of the next unscripted connect.
    pub fn push_connect(&self, behavior: Behavior) {
        self.script.lock().push_back(behavior);
    }

    /// Behavior used once the script is exhausted.
    pub fn set_fallback(&self, behavior: Behavior) {
        *self.fallback.lock() = behavior;
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Sets the state and broadcasts it.
    pub fn set_state(&self, state: TransportState, error: Option<TransportError>) {
        *self.state.lock() = state;
        let _ = self.changes.send(ConnectionChange { state, error });
    }

    /// Simulates the server dropping the connection.
    pub fn drop_connection(&self, reason: Option<&str>) {
        let error = reason.map(|r| TransportError::ConnectionFailed(r.to_string()));
        self.set_state(TransportState::Disconnected, error);
    }
}

impl Transport for MockTransport {
    fn connect(&self) -> BoxFuture<'_, TransportResult<()>> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.script.lock().pop_front().unwrap_or_else(|| self.fallback.lock().clone());
        Box::pin(async move {
            self.set_state(TransportState::Connecting, None);
            match behavior {
                Behavior::Succeed => {}
                Behavior::Delay(d) => tokio::time::sleep(d).await,
                Behavior::Hang => std::future::pending::<()>().await,
                Behavior::Fail(msg) => {
                    let err = TransportError::ConnectionFailed(msg);
                    self.set_state(TransportState::Disconnected, Some(err.clone()));
                    return Err(err);
                }
            }
            self.set_state(TransportState::Connected, None);
            Ok(())
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            self.set_state(TransportState::Disconnected, None);
            Ok(())
        })
    }

    fn state(&self) -> TransportState {
        *self.state.lock()
    }

    fn state_changes(&self) -> broadcast::Receiver<ConnectionChange> {
        self.changes.subscribe()
    }
}

/// In-memory subscription service with per-table behaviors.
///
/// Tables with registered rows get a snapshot event after each
/// successful subscribe.
pub struct MockSubscriptions {
    events: broadcast::Sender<TableEvent>,
    behaviors: Mutex<HashMap<String, Behavior>>,
    failures_left: Mutex<HashMap<String, usize>>,
    rows: Mutex<HashMap<String, Vec<Row>>>,
    subscribe_calls: Mutex<Vec<String>>,
    unsubscribed: Mutex<Vec<SubscriptionId>>,
    next_id: AtomicU64,
}

impl MockSubscriptions {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(MockSubscriptions {
            events,
            behaviors: Mutex::new(HashMap::new()),
            failures_left: Mutex::new(HashMap::new()),
            rows: Mutex::new(HashMap::new()),
            subscribe_calls: Mutex::new(Vec::new()),
            unsubscribed: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn set_behavior(&self, table: &str, behavior: Behavior) {
        self.behaviors.lock().insert(table.to_string(), behavior);
    }

    /// Fails the next `count` subscribes to `table`, then applies its behavior.
    pub fn fail_times(&self, table: &str, count: usize) {
        self.failures_left.lock().insert(table.to_string(), count);
    }

    /// Rows delivered as a snapshot when `table` is subscribed.
    pub fn set_rows(&self, table: &str, rows: Vec<Row>) {
        self.rows.lock().insert(table.to_string(), rows);
    }

    pub fn subscribe_calls(&self) -> Vec<String> {
        self.subscribe_calls.lock().clone()
    }

    pub fn calls_for(&self, table: &str) -> usize {
        self.subscribe_calls.lock().iter().filter(|t| *t == table).count()
    }

    pub fn unsubscribed(&self) -> Vec<SubscriptionId> {
        self.unsubscribed.lock().clone()
    }

    /// Broadcasts a table event.
    pub fn publish(&self, event: TableEvent) {
        let _ = self.events.send(event);
    }

    fn take_failure(&self, table: &str) -> bool {
        let mut left = self.failures_left.lock();
        match left.get_mut(table) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

impl SubscriptionOps for MockSubscriptions {
    fn subscribe<'a>(
        &'a self,
        table: &'a str,
        _filter: &'a TableQuery,
    ) -> BoxFuture<'a, SubscriptionResult<SubscriptionHandle>> {
        self.subscribe_calls.lock().push(table.to_string());
        let forced_failure = self.take_failure(table);
        let behavior = self.behaviors.lock().get(table).cloned().unwrap_or(Behavior::Succeed);
        Box::pin(async move {
            if forced_failure {
                return Err(SubscriptionError::Rejected {
                    table: table.to_string(),
                    reason: "scripted failure".into(),
                });
            }
            match behavior {
                Behavior::Succeed => {}
                Behavior::Delay(d) => tokio::time::sleep(d).await,
                Behavior::Hang => std::future::pending::<()>().await,
                Behavior::Fail(reason) => {
                    return Err(SubscriptionError::Rejected { table: table.to_string(), reason });
                }
            }
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let id = SubscriptionId::new(format!("{table}-{n}"));
            let rows = self.rows.lock().get(table).cloned();
            if let Some(rows) = rows {
                self.publish(TableEvent::snapshot(table, rows));
            }
            Ok(SubscriptionHandle { id, table: table.to_string() })
        })
    }

    fn unsubscribe<'a>(&'a self, id: &'a SubscriptionId) -> BoxFuture<'a, SubscriptionResult<()>> {
        Box::pin(async move {
            self.unsubscribed.lock().push(id.clone());
            Ok(())
        })
    }

    fn table_events(&self) -> broadcast::Receiver<TableEvent> {
        self.events.subscribe()
    }
}

/// Drains every event currently buffered in `rx`.
pub fn drain(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

/// Statuses of every `ConnectionChanged` event in `events`.
pub fn statuses(events: &[ClientEvent]) -> Vec<crate::reconnect::ConnectionStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::ConnectionChanged { status, .. } => Some(*status),
            _ => None,
        })
        .collect()
}

/// Lets spawned tasks run until they block. With a paused clock this
/// does not advance time.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
