// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The client facade.
//!
//! [`Client`] wires a transport and a subscription service to the
//! reconnection engine, the subscription registry, the reference data
//! cache, the live table cache and the latency monitor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use sg_core::{ReferenceTables, TableQuery};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::event::{ClientEvent, EventBus};
use crate::latency::LatencyMonitor;
use crate::live::LiveTables;
use crate::reconnect::{ConnectionStatus, ReconnectionEngine, ReconnectionMetrics};
use crate::reference::{LoadOutcome, ReferenceDataCache};
use crate::registry::{ActiveSubscription, SubscriptionRegistry};
use crate::transport::{SubscriptionHandle, SubscriptionId, SubscriptionOps, TableEvent, Transport};

/// A resilient real-time database client.
///
/// Must be created inside a tokio runtime. Dropping the client disposes it.
pub struct Client {
    transport: Arc<dyn Transport>,
    ops: Arc<dyn SubscriptionOps>,
    registry: Arc<SubscriptionRegistry>,
    events: Arc<EventBus>,
    engine: ReconnectionEngine,
    reference: ReferenceDataCache,
    live: Arc<LiveTables>,
    latency: Arc<LatencyMonitor>,
    auto_load_reference_data: bool,
    feed_token: CancellationToken,
    feed: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl Client {
    /// Builds a client from validated configuration and starts watching
    /// the transport.
    pub fn new(
        transport: Arc<dyn Transport>,
        ops: Arc<dyn SubscriptionOps>,
        config: &ClientConfig,
    ) -> Result<Self> {
        let reconnect = config.reconnect_options()?;
        let reference_options = config.reference_options()?;
        let tables = config.reference_tables()?;
        let tracker = config.latency_tracker()?;

        let events = Arc::new(EventBus::new());
        let registry = Arc::new(SubscriptionRegistry::new());
        let engine = ReconnectionEngine::new(
            Arc::clone(&transport),
            Arc::clone(&ops),
            Arc::clone(&registry),
            Arc::clone(&events),
            reconnect,
        );
        let reference = ReferenceDataCache::new(
            Arc::clone(&transport),
            Arc::clone(&ops),
            Arc::clone(&events),
            tables.clone(),
            reference_options,
        );
        let live = Arc::new(LiveTables::new());
        let latency = Arc::new(LatencyMonitor::new(tracker, Arc::clone(&events)));

        let feed_token = CancellationToken::new();
        let feed = tokio::spawn(run_feed(
            ops.table_events(),
            tables,
            Arc::clone(&live),
            Arc::clone(&latency),
            feed_token.clone(),
        ));
        engine.start();

        Ok(Client {
            transport,
            ops,
            registry,
            events,
            engine,
            reference,
            live,
            latency,
            auto_load_reference_data: config.auto_load_reference_data,
            feed_token,
            feed: Mutex::new(Some(feed)),
            disposed: AtomicBool::new(false),
        })
    }

    /// Connects and, when configured, loads reference data.
    ///
    /// A failed reference load is logged but does not fail the connect.
    pub async fn connect(&self) -> Result<()> {
        self.ensure_live()?;
        self.engine.prepare_connect();
        self.transport.connect().await?;
        info!("Connected");

        if self.auto_load_reference_data {
            match self.reference.load().await {
                Ok(LoadOutcome::Loaded(metrics)) => {
                    debug!(tables = metrics.table_count, "Reference data ready");
                }
                Ok(LoadOutcome::Cached) => {}
                Err(e) => warn!("Failed to load reference data: {}", e),
            }
        }
        Ok(())
    }

    /// Disconnects on purpose: no reconnection follows.
    ///
    /// Every registered subscription is dropped and the live tables are
    /// cleared. Reference data stays cached.
    pub async fn disconnect(&self) -> Result<()> {
        self.ensure_live()?;
        self.engine.mark_manual_disconnect();
        for sub in self.registry.clear() {
            if let Err(e) = self.ops.unsubscribe(&sub.id).await {
                debug!(table = %sub.table, "Unsubscribe during disconnect failed: {}", e);
            }
        }
        self.live.clear();
        self.transport.disconnect().await?;
        info!("Disconnected");
        Ok(())
    }

    /// Subscribes to `table` and tracks the subscription for recovery.
    pub async fn subscribe(&self, table: &str, filter: TableQuery) -> Result<SubscriptionHandle> {
        self.ensure_live()?;
        let handle = self.ops.subscribe(table, &filter).await?;
        self.registry.register(&handle, filter);
        debug!(table, id = %handle.id, "Subscribed");
        Ok(handle)
    }

    /// Drops a subscription. It will not be recovered after a reconnect.
    pub async fn unsubscribe(&self, id: &SubscriptionId) -> Result<()> {
        self.ensure_live()?;
        self.registry.unregister(id);
        self.ops.unsubscribe(id).await?;
        Ok(())
    }

    /// Starts a fresh reconnection loop, e.g. after `Failed`.
    pub fn retry_connection(&self) -> Result<()> {
        self.ensure_live()?;
        self.engine.retry();
        Ok(())
    }

    /// Stops a running reconnection loop without changing the status.
    pub fn cancel_reconnection(&self) {
        self.engine.cancel();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.engine.status()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.engine.is_reconnecting()
    }

    pub fn metrics(&self) -> ReconnectionMetrics {
        self.engine.metrics()
    }

    /// A new observer of client events.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Subscriptions that will be restored after a reconnect.
    pub fn subscriptions(&self) -> Vec<ActiveSubscription> {
        self.registry.active()
    }

    pub fn reference(&self) -> &ReferenceDataCache {
        &self.reference
    }

    pub fn live(&self) -> &LiveTables {
        &self.live
    }

    pub fn latency(&self) -> &LatencyMonitor {
        &self.latency
    }

    pub fn engine(&self) -> &ReconnectionEngine {
        &self.engine
    }

    /// Stops every background task and closes the event stream.
    /// Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.feed_token.cancel();
        self.feed.lock().take();
        self.engine.dispose();
        debug!("Client disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Feeds table events into the live tables and the latency monitor.
///
/// Reference tables are served by the reference cache and skipped here.
async fn run_feed(
    mut rx: broadcast::Receiver<TableEvent>,
    reference_tables: ReferenceTables,
    live: Arc<LiveTables>,
    latency: Arc<LatencyMonitor>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = rx.recv() => event,
        };
        match event {
            Ok(event) => {
                if let Some(committed_at) = event.commit_timestamp {
                    latency.record_commit(committed_at, Utc::now(), &event.table);
                }
                if !reference_tables.contains(&event.table) {
                    live.apply(&event);
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!("Table event feed lagged by {} events", n);
            }
            Err(RecvError::Closed) => {
                debug!("Table event channel closed");
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
