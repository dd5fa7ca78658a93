//! Sync counters and status reporting

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::session::PeerSummary;
use crate::store::ChangeStats;

/// Monotonic counters for sync traffic. Shared freely across tasks;
/// relaxed ordering is fine for reporting-only numbers.
#[derive(Debug, Default)]
pub struct SyncCounters {
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub changes_sent: AtomicU64,
    pub changes_received: AtomicU64,
    pub sync_rounds: AtomicU64,
    pub errors: AtomicU64,
}

impl SyncCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, changes: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.changes_sent.fetch_add(changes, Ordering::Relaxed);
    }

    pub fn record_received(&self, changes: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.changes_received.fetch_add(changes, Ordering::Relaxed);
    }

    pub fn record_sync_round(&self) {
        self.sync_rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            changes_sent: self.changes_sent.load(Ordering::Relaxed),
            changes_received: self.changes_received.load(Ordering::Relaxed),
            sync_rounds: self.sync_rounds.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SyncCounters`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct CounterSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub changes_sent: u64,
    pub changes_received: u64,
    pub sync_rounds: u64,
    pub errors: u64,
}

/// Database portion of a status report
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStatus {
    pub version: u64,
    pub stats: ChangeStats,
}

/// Full node status, serializable for logs and diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub running: bool,
    pub device_id: String,
    pub site_id: String,
    pub relay_connected: bool,
    pub connections: Vec<PeerSummary>,
    pub database: DatabaseStatus,
    pub counters: CounterSnapshot,
}
