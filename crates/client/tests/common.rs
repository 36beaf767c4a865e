// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Helpers are shared across test binaries; not every binary uses every one.
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use sigil_client::transport::{BoxFuture, SubscriptionResult, TransportResult};
use sigil_client::{
    ClientEvent, ConnectionChange, ConnectionStatus, Row, SubscriptionError, SubscriptionHandle,
    SubscriptionId, SubscriptionOps, TableEvent, TableQuery, Transport, TransportError,
    TransportState,
};
use tokio::sync::broadcast;

/// Installs a test-writer subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

/// An in-memory database server reachable through both client traits.
///
/// While offline every connect fails. Tables with seeded rows answer a
/// subscribe with a snapshot.
pub struct FakeServer {
    online: AtomicBool,
    state: Mutex<TransportState>,
    changes: broadcast::Sender<ConnectionChange>,
    events: broadcast::Sender<TableEvent>,
    tables: Mutex<HashMap<String, Vec<Row>>>,
    subscribes: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(64);
        let (events, _) = broadcast::channel(1024);
        Arc::new(FakeServer {
            online: AtomicBool::new(true),
            state: Mutex::new(TransportState::Disconnected),
            changes,
            events,
            tables: Mutex::new(HashMap::new()),
            subscribes: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn seed(&self, table: &str, rows: Vec<Row>) {
        self.tables.lock().insert(table.to_string(), rows);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Drops the connection from the server side.
    pub fn kill_connection(&self) {
        self.set_state(TransportState::Disconnected, Some(TransportError::ConnectionClosed));
    }

    pub fn subscribes_to(&self, table: &str) -> usize {
        self.subscribes.lock().iter().filter(|t| *t == table).count()
    }

    pub fn push(&self, event: TableEvent) {
        let _ = self.events.send(event);
    }

    fn set_state(&self, state: TransportState, error: Option<TransportError>) {
        *self.state.lock() = state;
        let _ = self.changes.send(ConnectionChange { state, error });
    }
}

impl Transport for FakeServer {
    fn connect(&self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            self.set_state(TransportState::Connecting, None);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !self.online.load(Ordering::SeqCst) {
                let err = TransportError::ConnectionFailed("server unreachable".into());
                self.set_state(TransportState::Disconnected, Some(err.clone()));
                return Err(err);
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

impl SubscriptionOps for FakeServer {
    fn subscribe<'a>(
        &'a self,
        table: &'a str,
        _filter: &'a TableQuery,
    ) -> BoxFuture<'a, SubscriptionResult<SubscriptionHandle>> {
        Box::pin(async move {
            if self.state() != TransportState::Connected {
                return Err(SubscriptionError::Transport(TransportError::NotConnected));
            }
            self.subscribes.lock().push(table.to_string());
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let rows = self.tables.lock().get(table).cloned().unwrap_or_default();
            self.push(TableEvent::snapshot(table, rows));
            let id = SubscriptionId::new(format!("sub-{n}"));
            Ok(SubscriptionHandle { id, table: table.into() })
        })
    }

    fn unsubscribe<'a>(&'a self, _id: &'a SubscriptionId) -> BoxFuture<'a, SubscriptionResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn table_events(&self) -> broadcast::Receiver<TableEvent> {
        self.events.subscribe()
    }
}

/// Waits (in test time) until `status` is reached.
pub async fn wait_for_status(
    rx: &mut broadcast::Receiver<ClientEvent>,
    status: ConnectionStatus,
) -> Vec<ClientEvent> {
    let mut seen = Vec::new();
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let reached = matches!(
                        &event,
                        ClientEvent::ConnectionChanged { status: s, .. } if *s == status
                    );
                    seen.push(event);
                    if reached {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(600), wait).await.is_err() {
        panic!("status {status} not reached; saw {seen:?}");
    }
    seen
}

/// Events buffered so far.
pub fn drain(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}
