// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription recovery after a reconnect.
//!
//! Every snapshotted subscription is re-issued in parallel. Each outcome is
//! reported as it lands; the batch as a whole is bounded by a timeout, after
//! which unfinished re-subscribes are dropped.

use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::event::{ClientEvent, EventBus};
use crate::registry::{SubscriptionRegistry, SubscriptionSnapshot};
use crate::transport::SubscriptionOps;

/// Default bound on a whole recovery batch.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one recovery batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoverySummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub recovery_time: Duration,
}

/// Re-subscribes `snapshots` and re-registers the new handles.
///
/// Returns `None` if `cancel` fires first; otherwise the summary, which
/// is also emitted as [`ClientEvent::SubscriptionsRecovered`].
pub(crate) async fn recover_subscriptions(
    ops: &dyn SubscriptionOps,
    registry: &SubscriptionRegistry,
    events: &EventBus,
    snapshots: Vec<SubscriptionSnapshot>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Option<RecoverySummary> {
    let total = snapshots.len();
    if total == 0 {
        let summary = RecoverySummary::default();
        events.emit(ClientEvent::SubscriptionsRecovered(summary));
        return Some(summary);
    }

    let started = Instant::now();
    let mut successful = 0;
    let mut failed = 0;

    let mut pending: FuturesUnordered<_> = snapshots
        .into_iter()
        .map(|snapshot| async move {
            let result = ops.subscribe(&snapshot.table, &snapshot.filter).await;
            (snapshot, result)
        })
        .collect();

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Subscription recovery cancelled with {} pending", pending.len());
                return None;
            }
            _ = &mut deadline => {
                let elapsed = started.elapsed();
                warn!(
                    pending = pending.len(),
                    "Subscription recovery timed out after {}ms",
                    elapsed.as_millis()
                );
                events.emit(ClientEvent::RecoveryTimedOut { elapsed, timeout });
                break;
            }
            next = pending.next() => match next {
                Some((snapshot, Ok(handle))) => {
                    registry.replace_table(&snapshot.table, &handle, snapshot.filter);
                    successful += 1;
                    events.emit(ClientEvent::SubscriptionRestored {
                        table: snapshot.table,
                        subscription_id: handle.id,
                    });
                }
                Some((snapshot, Err(e))) => {
                    failed += 1;
                    warn!("Failed to restore subscription to {}: {}", snapshot.table, e);
                    events.emit(ClientEvent::SubscriptionRestoreFailed {
                        table: snapshot.table,
                        error: e.to_string(),
                    });
                }
                None => break,
            }
        }
    }

    let summary = RecoverySummary { total, successful, failed, recovery_time: started.elapsed() };
    events.emit(ClientEvent::SubscriptionsRecovered(summary));
    Some(summary)
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
