// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_support::drain;
use chrono::TimeDelta;

fn monitor(threshold_ms: f64) -> (LatencyMonitor, tokio::sync::broadcast::Receiver<ClientEvent>) {
    let events = Arc::new(EventBus::new());
    let rx = events.subscribe();
    let tracker = PercentileTracker::with_window(10, threshold_ms).unwrap();
    (LatencyMonitor::new(tracker, events), rx)
}

#[test]
fn sample_above_threshold_emits_event() {
    let (monitor, mut rx) = monitor(100.0);

    assert!(!monitor.record(40.0, Some("player")));
    assert!(!monitor.record(100.0, Some("player")));
    assert!(monitor.record(250.5, Some("player")));

    let exceeded: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::LatencyThresholdExceeded { .. }))
        .collect();
    assert_eq!(
        exceeded,
        vec![ClientEvent::LatencyThresholdExceeded {
            latency_ms: 250.5,
            threshold_ms: 100.0,
            table: Some("player".into()),
        }]
    );
    assert_eq!(monitor.stats().count, 3);
}

fn updates(events: &[ClientEvent]) -> Vec<(f64, Option<String>)> {
    events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::LatencyUpdated { latency_ms, table, .. } => {
                Some((*latency_ms, table.clone()))
            }
            _ => None,
        })
        .collect()
}

#[test]
fn every_sample_emits_update() {
    let (monitor, mut rx) = monitor(100.0);
    let before = Utc::now();

    monitor.record(40.0, Some("player"));
    monitor.record(250.5, None);
    monitor.record(f64::NAN, Some("player"));

    let events = drain(&mut rx);
    assert_eq!(updates(&events), vec![(40.0, Some("player".into())), (250.5, None)]);
    let kinds: Vec<_> = events.iter().map(ClientEvent::kind).collect();
    assert_eq!(kinds, vec!["latency_updated", "latency_updated", "latency_threshold_exceeded"]);
    assert!(events.iter().all(|e| match e {
        ClientEvent::LatencyUpdated { recorded_at, .. } => *recorded_at >= before,
        _ => true,
    }));
    assert_eq!(monitor.stats().count, 2);
}

#[test]
fn commit_timestamp_becomes_sample() {
    let (monitor, mut rx) = monitor(500.0);
    let now = Utc::now();

    assert!(!monitor.record_commit(now - TimeDelta::milliseconds(120), now, "inventory"));
    assert!(monitor.record_commit(now - TimeDelta::milliseconds(750), now, "inventory"));
    // Clock skew.
    assert!(!monitor.record_commit(now + TimeDelta::seconds(3), now, "inventory"));

    let stats = monitor.stats();
    assert_eq!(stats.count, 3);
    assert_eq!(stats.p50, 120.0);
    let events = drain(&mut rx);
    assert_eq!(updates(&events).len(), 3);
    let exceeded =
        events.iter().filter(|e| matches!(e, ClientEvent::LatencyThresholdExceeded { .. })).count();
    assert_eq!(exceeded, 1);
}

#[test]
fn clear_resets_stats() {
    let (monitor, _rx) = monitor(500.0);
    monitor.record(10.0, None);
    monitor.clear();

    assert_eq!(monitor.stats(), LatencyStats::default());
    assert_eq!(monitor.threshold_ms(), 500.0);
}
