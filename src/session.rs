//! Peer session tracking
//!
//! One entry per device seen through the relay. Entries are created on
//! first contact, touched on every frame, and evicted when the peer goes
//! silent past the heartbeat timeout.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Transport a peer is reachable over. Only the relay exists today; the
/// variant keeps room for direct links without changing the session shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Relay,
}

/// Live state for one remote device
#[derive(Debug, Clone)]
pub struct PeerSession {
    pub device_id: String,
    pub transport: TransportKind,
    pub connected_at: Instant,
    pub last_activity: Instant,
}

impl PeerSession {
    fn new(device_id: String, transport: TransportKind) -> Self {
        let now = Instant::now();
        Self {
            device_id,
            transport,
            connected_at: now,
            last_activity: now,
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

/// Serializable view of a session, for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct PeerSummary {
    pub device_id: String,
    pub transport: TransportKind,
    pub idle_ms: u64,
}

/// All known peer sessions, keyed by device id
#[derive(Default)]
pub struct SessionMap {
    peers: HashMap<String, PeerSession>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record activity from a device, creating the session on first
    /// contact. Returns true when the device is new.
    pub fn touch(&mut self, device_id: &str, transport: TransportKind) -> bool {
        match self.peers.get_mut(device_id) {
            Some(peer) => {
                peer.last_activity = Instant::now();
                peer.transport = transport;
                false
            }
            None => {
                self.peers.insert(
                    device_id.to_string(),
                    PeerSession::new(device_id.to_string(), transport),
                );
                true
            }
        }
    }

    pub fn get(&self, device_id: &str) -> Option<&PeerSession> {
        self.peers.get(device_id)
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.peers.contains_key(device_id)
    }

    pub fn remove(&mut self, device_id: &str) -> Option<PeerSession> {
        self.peers.remove(device_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.peers.keys().cloned().collect()
    }

    /// Remove and return every peer idle longer than `timeout`
    pub fn evict_idle(&mut self, timeout: Duration) -> Vec<PeerSession> {
        let expired: Vec<String> = self
            .peers
            .values()
            .filter(|p| p.idle_for() > timeout)
            .map(|p| p.device_id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| self.peers.remove(id))
            .collect()
    }

    pub fn summaries(&self) -> Vec<PeerSummary> {
        let mut out: Vec<PeerSummary> = self
            .peers
            .values()
            .map(|p| PeerSummary {
                device_id: p.device_id.clone(),
                transport: p.transport,
                idle_ms: p.idle_for().as_millis() as u64,
            })
            .collect();
        out.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        out
    }

    pub fn clear(&mut self) {
        self.peers.clear();
    }
}
