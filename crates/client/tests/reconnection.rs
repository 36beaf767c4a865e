// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnection scenarios driven through the public client API.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use common::{drain, init_tracing, row, wait_for_status, FakeServer};
use serde_json::json;
use sigil_client::{Client, ClientConfig, ClientEvent, ConnectionStatus, TableEvent, TableQuery};

fn config(max_attempts: u32) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.reconnect.max_reconnect_attempts = max_attempts;
    config.reconnect.jitter_percent = 0;
    config.reference.tables = Some(vec!["item_desc".into()]);
    config
}

fn reconnecting_attempts(events: &[ClientEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::ConnectionChanged {
                status: ConnectionStatus::Reconnecting,
                attempt: Some(a),
                ..
            } => Some(*a),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn dropped_session_restores_subscriptions() {
    init_tracing();
    let server = FakeServer::new();
    server.seed("player", vec![row(json!({"player_id": 1, "name": "ana"}))]);
    let client = Client::new(server.clone(), server.clone(), &config(10)).unwrap();
    let mut rx = client.events();

    client.connect().await.unwrap();
    wait_for_status(&mut rx, ConnectionStatus::Connected).await;
    client.subscribe("player", TableQuery::All).await.unwrap();
    client.subscribe("inventory", TableQuery::All).await.unwrap();

    server.kill_connection();
    let events = wait_for_status(&mut rx, ConnectionStatus::Connected).await;
    assert_eq!(reconnecting_attempts(&events), vec![1]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = drain(&mut rx);
    let restored: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::SubscriptionRestored { table, .. } => Some(table.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(restored.len(), 2);
    assert!(restored.contains(&"player".to_string()));
    assert!(restored.contains(&"inventory".to_string()));
    let summary = events.iter().find_map(|e| match e {
        ClientEvent::SubscriptionsRecovered(s) => Some(*s),
        _ => None,
    });
    let summary = summary.unwrap();
    assert_eq!((summary.total, summary.successful, summary.failed), (2, 2, 0));

    // The restored snapshot refilled the live table.
    assert!(client.live().get("player", 1).is_some());
}

#[tokio::test(start_paused = true)]
async fn unreachable_server_exhausts_attempts() {
    init_tracing();
    let server = FakeServer::new();
    let client = Client::new(server.clone(), server.clone(), &config(3)).unwrap();
    let mut rx = client.events();
    client.connect().await.unwrap();
    wait_for_status(&mut rx, ConnectionStatus::Connected).await;

    server.set_online(false);
    server.kill_connection();
    let events = wait_for_status(&mut rx, ConnectionStatus::Failed).await;

    assert_eq!(reconnecting_attempts(&events), vec![1, 2, 3]);
    let reason = events.iter().rev().find_map(|e| match e {
        ClientEvent::ConnectionChanged { status: ConnectionStatus::Failed, reason, .. } => {
            reason.clone()
        }
        _ => None,
    });
    assert!(reason.unwrap().contains("after 3 attempts"));
    assert_eq!(client.metrics().failed_reconnects, 1);

    server.set_online(true);
    client.retry_connection().unwrap();
    wait_for_status(&mut rx, ConnectionStatus::Connected).await;
    assert_eq!(client.status(), ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn manual_disconnect_does_not_reconnect() {
    init_tracing();
    let server = FakeServer::new();
    let client = Client::new(server.clone(), server.clone(), &config(10)).unwrap();
    let mut rx = client.events();
    client.connect().await.unwrap();
    wait_for_status(&mut rx, ConnectionStatus::Connected).await;

    client.disconnect().await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    let events = drain(&mut rx);
    assert!(reconnecting_attempts(&events).is_empty());
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn quick_successive_drops_run_one_loop() {
    init_tracing();
    let server = FakeServer::new();
    let client = Client::new(server.clone(), server.clone(), &config(10)).unwrap();
    let mut rx = client.events();
    client.connect().await.unwrap();
    wait_for_status(&mut rx, ConnectionStatus::Connected).await;

    server.set_online(false);
    server.kill_connection();
    tokio::time::sleep(Duration::from_millis(50)).await;
    server.kill_connection();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    server.set_online(true);

    let events = wait_for_status(&mut rx, ConnectionStatus::Connected).await;
    let attempts = reconnecting_attempts(&events);
    assert!(attempts.len() >= 2);
    assert!(attempts.windows(2).all(|w| w[1] == w[0] + 1), "{attempts:?}");
    assert_eq!(attempts[0], 1);
}

#[tokio::test(start_paused = true)]
async fn live_updates_flow_after_reconnect() {
    init_tracing();
    let server = FakeServer::new();
    let client = Client::new(server.clone(), server.clone(), &config(10)).unwrap();
    let mut rx = client.events();
    client.connect().await.unwrap();
    wait_for_status(&mut rx, ConnectionStatus::Connected).await;
    client.subscribe("player", TableQuery::All).await.unwrap();

    server.kill_connection();
    wait_for_status(&mut rx, ConnectionStatus::Connected).await;
    server.push(TableEvent::insert("player", row(json!({"player_id": 4, "name": "bo"}))));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let bo = client.live().get("player", 4).unwrap();
    assert_eq!(bo["name"], json!("bo"));
}
