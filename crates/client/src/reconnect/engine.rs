// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The reconnection engine.
//!
//! Owns the session status. A watcher task turns transport state changes
//! into status transitions; an unexpected drop spawns the reconnection loop,
//! which retries with jittered exponential backoff and hands successful
//! reconnects to subscription recovery.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sg_core::BackoffPolicy;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::metrics::{MetricsRecorder, ReconnectionMetrics};
use super::recovery::{recover_subscriptions, DEFAULT_RECOVERY_TIMEOUT};
use super::state::{ConnectionStatus, SharedState, Transition};
use crate::event::{ClientEvent, EventBus};
use crate::registry::{SubscriptionRegistry, SubscriptionSnapshot};
use crate::transport::{
    ConnectionChange, SubscriptionOps, Transport, TransportError, TransportState,
};

/// Default cap on loop iterations before giving up (0 = unlimited).
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Pause between detecting a drop and the first attempt.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Bound on a single connect attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reconnects slower than this are reported.
pub const DEFAULT_RECONNECT_BUDGET: Duration = Duration::from_secs(10);

const CONNECTION_LOST: &str = "Connection lost";
const MANUAL_DISCONNECT: &str = "Manual disconnect";

/// Tuning for a [`ReconnectionEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectOptions {
    pub auto_reconnect: bool,
    /// Attempts per loop before `Failed` (0 = unlimited).
    pub max_reconnect_attempts: u32,
    pub backoff: BackoffPolicy,
    pub settle_delay: Duration,
    pub attempt_timeout: Duration,
    pub recovery_timeout: Duration,
    pub reconnect_budget: Duration,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            backoff: BackoffPolicy::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            reconnect_budget: DEFAULT_RECONNECT_BUDGET,
        }
    }
}

/// Keeps a logical session alive across transport drops.
///
/// Dropping the engine disposes it.
pub struct ReconnectionEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    transport: Arc<dyn Transport>,
    ops: Arc<dyn SubscriptionOps>,
    registry: Arc<SubscriptionRegistry>,
    events: Arc<EventBus>,
    options: ReconnectOptions,
    state: SharedState,
    metrics: Mutex<MetricsRecorder>,
    /// Subscriptions captured at the last unexpected drop.
    snapshots: Mutex<Vec<SubscriptionSnapshot>>,
    /// When the current outage started.
    lost_at: Mutex<Option<Instant>>,
    /// Token of the running loop, if any.
    loop_token: Mutex<Option<CancellationToken>>,
    /// Parent of every running recovery. Only cancel, manual disconnect
    /// and dispose fire it; a new loss does not.
    recovery_root: Mutex<CancellationToken>,
    shutdown: CancellationToken,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ReconnectionEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        ops: Arc<dyn SubscriptionOps>,
        registry: Arc<SubscriptionRegistry>,
        events: Arc<EventBus>,
        options: ReconnectOptions,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let inner = EngineInner {
            transport,
            ops,
            registry,
            events,
            options,
            state: SharedState::new(),
            metrics: Mutex::new(MetricsRecorder::default()),
            snapshots: Mutex::new(Vec::new()),
            lost_at: Mutex::new(None),
            loop_token: Mutex::new(None),
            recovery_root: Mutex::new(shutdown.child_token()),
            shutdown,
            watcher: Mutex::new(None),
        };
        ReconnectionEngine { inner: Arc::new(inner) }
    }

    /// Starts watching the transport. Must be called from within a tokio
    /// runtime. Does nothing if already started or disposed.
    pub fn start(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        let mut watcher = self.inner.watcher.lock();
        if watcher.is_some() {
            return;
        }
        // Subscribe before spawning so no change is missed.
        let rx = self.inner.transport.state_changes();
        let inner = Arc::clone(&self.inner);
        *watcher = Some(tokio::spawn(watch_transport(inner, rx)));
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.status()
    }

    /// Attempt number of the running loop, 0 when idle.
    pub fn attempt(&self) -> u32 {
        self.inner.state.attempt()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.inner.state.is_reconnecting()
    }

    pub fn metrics(&self) -> ReconnectionMetrics {
        self.inner.metrics.lock().snapshot()
    }

    pub fn options(&self) -> &ReconnectOptions {
        &self.inner.options
    }

    /// Starts a fresh reconnection loop immediately.
    ///
    /// Clears the manual-disconnect flag, cancels any loop already running
    /// and moves `Failed` back to `Disconnected` without an event.
    pub fn retry(&self) {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return;
        }
        inner.state.set_manual_disconnect(false);
        inner.state.reset_attempt();
        if inner.state.status() == ConnectionStatus::Failed {
            inner.state.transition(ConnectionStatus::Disconnected);
        }
        inner.state.force_reconnect();
        *inner.lost_at.lock() = Some(Instant::now());
        info!("Manual reconnection requested");
        inner.spawn_loop(false);
    }

    /// Stops the running loop, if any. Status is left as is and no event is
    /// emitted.
    pub fn cancel(&self) {
        self.inner.cancel_loop();
    }

    /// Flags the next transport drop as intentional and stops any loop.
    pub fn mark_manual_disconnect(&self) {
        self.inner.state.set_manual_disconnect(true);
        self.inner.cancel_loop();
    }

    pub fn clear_manual_disconnect(&self) {
        self.inner.state.set_manual_disconnect(false);
    }

    pub fn is_manual_disconnect(&self) -> bool {
        self.inner.state.is_manual_disconnect()
    }

    /// Readies the engine for a caller-driven connect: clears the manual
    /// flag, stops any loop and resets `Failed` to `Disconnected`.
    pub fn prepare_connect(&self) {
        let inner = &self.inner;
        inner.state.set_manual_disconnect(false);
        inner.cancel_loop();
        if inner.state.status() == ConnectionStatus::Failed {
            inner.state.transition(ConnectionStatus::Disconnected);
        }
    }

    /// Stops the loop and the watcher and closes the event bus. Idempotent.
    pub fn dispose(&self) {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return;
        }
        inner.cancel_loop();
        inner.shutdown.cancel();
        inner.watcher.lock().take();
        inner.events.close();
        debug!("Reconnection engine disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl Drop for ReconnectionEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn watch_transport(inner: Arc<EngineInner>, mut rx: broadcast::Receiver<ConnectionChange>) {
    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            change = rx.recv() => match change {
                Ok(change) => inner.on_transport_change(change),
                Err(RecvError::Lagged(n)) => {
                    warn!("Connection watcher lagged by {} state changes", n);
                    // Reconcile with the current state.
                    inner.on_transport_change(ConnectionChange::new(inner.transport.state()));
                }
                Err(RecvError::Closed) => {
                    debug!("Transport state channel closed");
                    break;
                }
            }
        }
    }
}

impl EngineInner {
    fn on_transport_change(self: &Arc<Self>, change: ConnectionChange) {
        match change.state {
            TransportState::Disconnected => self.on_disconnected(change.error),
            // A running loop owns the status.
            _ if self.state.is_reconnecting() => {}
            TransportState::Connecting => self.set_status(ConnectionStatus::Connecting, None),
            TransportState::Connected => self.set_status(ConnectionStatus::Connected, None),
        }
    }

    fn on_disconnected(self: &Arc<Self>, error: Option<TransportError>) {
        if self.state.is_reconnecting() {
            debug!("Ignoring disconnect while a reconnection loop is running");
            return;
        }
        if self.transport.state() != TransportState::Disconnected {
            debug!("Ignoring stale disconnect notification");
            return;
        }
        // Only retry or a caller-driven connect leaves `Failed`.
        if self.state.status() == ConnectionStatus::Failed {
            return;
        }

        if self.state.is_manual_disconnect() {
            self.set_status(ConnectionStatus::Disconnected, Some(MANUAL_DISCONNECT.to_string()));
            return;
        }

        let reason = error.map_or_else(|| CONNECTION_LOST.to_string(), |e| e.to_string());
        let was_connected = self.state.status() == ConnectionStatus::Connected;
        if was_connected && self.options.auto_reconnect {
            self.handle_unexpected_loss(reason);
        } else {
            self.set_status(ConnectionStatus::Disconnected, Some(reason));
        }
    }

    fn handle_unexpected_loss(self: &Arc<Self>, reason: String) {
        if !self.state.begin_reconnect() {
            return;
        }
        self.state.reset_attempt();
        let snapshot = self.registry.snapshot();
        info!(subscriptions = snapshot.len(), "Connection lost: {}", reason);
        *self.snapshots.lock() = snapshot;
        *self.lost_at.lock() = Some(Instant::now());

        self.state.transition(ConnectionStatus::Disconnected);
        self.events.emit(ClientEvent::status_with_reason(ConnectionStatus::Disconnected, reason));
        self.spawn_loop(true);
    }

    /// Applies a transition and emits it if the status moved.
    fn set_status(&self, to: ConnectionStatus, reason: Option<String>) {
        match self.state.transition(to) {
            Transition::Moved(from) => {
                debug!("Connection status {} -> {}", from, to);
                let event = match reason {
                    Some(reason) => ClientEvent::status_with_reason(to, reason),
                    None => ClientEvent::status(to),
                };
                self.events.emit(event);
            }
            Transition::Unchanged => {}
            Transition::Rejected(from) => {
                debug!("Ignoring connection status {} -> {}", from, to);
            }
        }
    }

    fn spawn_loop(self: &Arc<Self>, settle: bool) {
        let token = self.shutdown.child_token();
        if let Some(previous) = self.loop_token.lock().replace(token.clone()) {
            previous.cancel();
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.run_loop(token, settle).await });
    }

    fn cancel_loop(&self) {
        if let Some(token) = self.loop_token.lock().take() {
            token.cancel();
        }
        std::mem::replace(&mut *self.recovery_root.lock(), self.shutdown.child_token()).cancel();
        self.state.end_reconnect();
        self.state.reset_attempt();
        *self.lost_at.lock() = None;
    }

    async fn run_loop(self: Arc<Self>, token: CancellationToken, settle: bool) {
        if settle {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(self.options.settle_delay) => {}
            }
        }

        let max_attempts = self.options.max_reconnect_attempts;
        loop {
            if token.is_cancelled() {
                return;
            }

            let attempt = self.state.next_attempt();
            if max_attempts > 0 && attempt > max_attempts {
                self.finish_failed(attempt - 1);
                return;
            }
            self.metrics.lock().record_attempt();

            let delay = self.options.backoff.delay(attempt - 1);
            self.state.transition(ConnectionStatus::Reconnecting);
            self.events.emit(ClientEvent::ConnectionChanged {
                status: ConnectionStatus::Reconnecting,
                reason: None,
                attempt: Some(attempt),
                next_delay: Some(delay),
            });
            debug!(attempt, "Reconnect attempt, backoff {}ms", delay.as_millis());

            if attempt > 1 {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = tokio::time::timeout(self.options.attempt_timeout, self.transport.connect()) => result,
            };

            let error = match result {
                Ok(Ok(())) => {
                    self.finish_connected(&token).await;
                    return;
                }
                Ok(Err(e)) => e,
                Err(_elapsed) => TransportError::Timeout(self.options.attempt_timeout),
            };
            warn!(attempt, "Reconnect attempt failed: {}", error);
            self.events.emit(ClientEvent::ReconnectAttemptFailed {
                attempt,
                error: error.to_string(),
            });
        }
    }

    fn finish_failed(&self, attempts: u32) {
        self.state.end_reconnect();
        self.state.reset_attempt();
        *self.lost_at.lock() = None;
        self.state.transition(ConnectionStatus::Failed);
        self.metrics.lock().record_failure();

        let reason = format!("Failed to reconnect after {attempts} attempts");
        warn!("{}", reason);
        self.events.emit(ClientEvent::status_with_reason(ConnectionStatus::Failed, reason));
    }

    async fn finish_connected(&self, token: &CancellationToken) {
        if token.is_cancelled() {
            return;
        }
        let lost_at = self.lost_at.lock().take();
        let recovery_token = self.recovery_root.lock().child_token();
        let attempt = self.state.attempt();
        self.state.end_reconnect();
        self.state.reset_attempt();
        self.state.transition(ConnectionStatus::Connected);
        self.events.emit(ClientEvent::status(ConnectionStatus::Connected));
        info!(attempt, "Reconnected");

        let snapshots = std::mem::take(&mut *self.snapshots.lock());
        let summary = recover_subscriptions(
            self.ops.as_ref(),
            &self.registry,
            &self.events,
            snapshots,
            self.options.recovery_timeout,
            &recovery_token,
        )
        .await;
        let Some(summary) = summary else {
            return;
        };
        debug!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            "Subscription recovery finished"
        );

        let duration = lost_at.map(|at| at.elapsed()).unwrap_or_default();
        self.metrics.lock().record_success(duration);
        let budget = self.options.reconnect_budget;
        if duration > budget {
            warn!(
                "Reconnection took {}ms, exceeding the {}ms budget",
                duration.as_millis(),
                budget.as_millis()
            );
            self.events.emit(ClientEvent::ReconnectBudgetExceeded { duration, threshold: budget });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
