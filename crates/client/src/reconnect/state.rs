// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection status shared between the engine, its loop task and callers.
//!
//! Uses atomic fields for lock-free reads.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Session status as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionStatus {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Reconnecting = 3,
    Failed = 4,
}

impl ConnectionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionStatus::Connecting,
            2 => ConnectionStatus::Connected,
            3 => ConnectionStatus::Reconnecting,
            4 => ConnectionStatus::Failed,
            _ => ConnectionStatus::Disconnected,
        }
    }

    /// Returns true if the state machine allows moving to `to`.
    pub fn can_transition_to(self, to: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, to),
            (Disconnected, Connecting | Connected | Reconnecting)
                | (Connecting, Connected | Reconnecting | Failed | Disconnected)
                | (Connected, Disconnected | Reconnecting)
                | (Reconnecting, Connected | Failed | Disconnected)
                | (Failed, Disconnected)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status moved from the contained value.
    Moved(ConnectionStatus),
    /// Already in the requested status.
    Unchanged,
    /// The move is not allowed from the contained status.
    Rejected(ConnectionStatus),
}

/// Status, attempt counter and loop flags for one engine.
pub struct SharedState {
    status: AtomicU8,
    attempt: AtomicU32,
    reconnecting: AtomicBool,
    manual_disconnect: AtomicBool,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(ConnectionStatus::Disconnected as u8),
            attempt: AtomicU32::new(0),
            reconnecting: AtomicBool::new(false),
            manual_disconnect: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Moves to `to` if the state machine allows it.
    pub fn transition(&self, to: ConnectionStatus) -> Transition {
        let result = self.status.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            let current = ConnectionStatus::from_u8(current);
            (current != to && current.can_transition_to(to)).then_some(to as u8)
        });
        match result {
            Ok(previous) => Transition::Moved(ConnectionStatus::from_u8(previous)),
            Err(current) if current == to as u8 => Transition::Unchanged,
            Err(current) => Transition::Rejected(ConnectionStatus::from_u8(current)),
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    /// Increments the attempt counter and returns the new value.
    pub fn next_attempt(&self) -> u32 {
        self.attempt.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    pub fn reset_attempt(&self) {
        self.attempt.store(0, Ordering::Release);
    }

    /// Claims the single reconnection loop slot. Returns false if a loop
    /// already holds it.
    pub fn begin_reconnect(&self) -> bool {
        self.reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claims the loop slot whether or not it is held.
    pub fn force_reconnect(&self) {
        self.reconnecting.store(true, Ordering::Release);
    }

    pub fn end_reconnect(&self) {
        self.reconnecting.store(false, Ordering::Release);
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::Acquire)
    }

    pub fn set_manual_disconnect(&self, manual: bool) {
        self.manual_disconnect.store(manual, Ordering::Release);
    }

    pub fn is_manual_disconnect(&self) -> bool {
        self.manual_disconnect.load(Ordering::Acquire)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
