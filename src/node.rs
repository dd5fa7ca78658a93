//! Sync node coordinator
//!
//! `NodeCore` holds all protocol state (peer sessions, per-peer cursors,
//! counters) and turns inbound frames and timer ticks into outbound frames.
//! It is synchronous and lock-free inside, so the whole protocol is
//! exercisable without a socket. `SyncNode` wraps it with the relay worker
//! and the heartbeat and sync timers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::identity::SiteIdentity;
use crate::manager::SyncManager;
use crate::protocol::{ChangeRecord, SyncMessage, SyncPayload};
use crate::relay::{RelayClient, RelayEvent};
use crate::session::{SessionMap, TransportKind};
use crate::stats::{DatabaseStatus, NodeStatus, SyncCounters};
use crate::store::ChangeLogStore;

/// Lifecycle of the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Where a peer stands in the sync conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerSyncState {
    /// Seen but no sync exchange yet
    Connected,
    /// We sent a sync-request and wait for the response
    AwaitingResponse,
    /// At least one response landed
    Synced,
}

#[derive(Debug, Clone, Copy)]
struct PeerCursor {
    /// Highest version confirmed received from this peer
    version: u64,
    state: PeerSyncState,
}

/// Protocol state machine, independent of any transport
pub struct NodeCore<S: ChangeLogStore> {
    identity: SiteIdentity,
    config: SyncConfig,
    manager: Arc<SyncManager<S>>,
    counters: Arc<SyncCounters>,
    sessions: SessionMap,
    cursors: HashMap<String, PeerCursor>,
    last_broadcast_version: u64,
}

impl<S: ChangeLogStore> NodeCore<S> {
    pub fn new(
        identity: SiteIdentity,
        config: SyncConfig,
        manager: Arc<SyncManager<S>>,
        counters: Arc<SyncCounters>,
    ) -> Self {
        Self {
            identity,
            config,
            manager,
            counters,
            sessions: SessionMap::new(),
            cursors: HashMap::new(),
            last_broadcast_version: 0,
        }
    }

    /// Cursor position for a peer, for diagnostics and tests
    pub fn peer_cursor(&self, device_id: &str) -> Option<u64> {
        self.cursors.get(device_id).map(|c| c.version)
    }

    pub fn peer_count(&self) -> usize {
        self.sessions.len()
    }

    /// Process one inbound frame, returning the frames to send back
    pub fn handle_frame(&mut self, message: SyncMessage) -> Vec<SyncMessage> {
        let from = message.from.clone();
        let mut out = Vec::new();

        if self.sessions.touch(&from, TransportKind::Relay) {
            info!("Peer {} connected", from);
            self.cursors.insert(
                from.clone(),
                PeerCursor {
                    version: 0,
                    state: PeerSyncState::Connected,
                },
            );
            // Greet every new peer with a full-history request; the replay
            // key makes re-sending everything safe.
            out.push(self.sync_request_for(&from));
        }

        let inbound_changes = match &message.payload {
            SyncPayload::SyncResponse { changes, .. } | SyncPayload::Changes { changes, .. } => {
                changes.len() as u64
            }
            _ => 0,
        };
        self.counters.record_received(inbound_changes);
        debug!("Received {} from {}", message.kind(), from);

        match message.payload.clone() {
            SyncPayload::SyncRequest {
                from_version,
                to_version,
                tables,
                ..
            } => {
                out.extend(self.answer_sync_request(&from, from_version, to_version, tables));
            }
            SyncPayload::SyncResponse {
                changes,
                to_version,
                ..
            } => {
                if let Some(cursor) = self.cursors.get_mut(&from) {
                    cursor.state = PeerSyncState::Synced;
                }
                out.extend(self.absorb_changes(&from, &changes, to_version, message.timestamp));
                self.counters.record_sync_round();
            }
            SyncPayload::Changes {
                changes, version, ..
            } => {
                out.extend(self.absorb_changes(&from, &changes, version, message.timestamp));
            }
            SyncPayload::Ack {
                message_id,
                success,
                error,
            } => {
                if success {
                    debug!("Ack from {} for {}", from, message_id);
                } else {
                    warn!(
                        "Nack from {} for {}: {}",
                        from,
                        message_id,
                        error.unwrap_or_default()
                    );
                }
            }
            SyncPayload::Ping { timestamp } => {
                let latency = now_millis().saturating_sub(timestamp);
                out.push(
                    SyncMessage::new(
                        SyncPayload::Pong {
                            timestamp,
                            latency: Some(latency),
                        },
                        &self.identity.device_id,
                    )
                    .to(&from),
                );
            }
            SyncPayload::Pong { timestamp, .. } => {
                let rtt = now_millis().saturating_sub(timestamp);
                debug!("Pong from {} ({} ms)", from, rtt);
            }
        }

        self.record_outbound(&out);
        out
    }

    /// Frames to send when the relay link comes up: a full-history request
    /// to every peer we already know about.
    pub fn on_link_up(&mut self) -> Vec<SyncMessage> {
        let mut devices = self.sessions.device_ids();
        devices.sort();

        let out: Vec<SyncMessage> = devices
            .iter()
            .map(|device| self.sync_request_for(device))
            .collect();

        if !out.is_empty() {
            info!("Relay up, re-requesting history from {} peers", out.len());
        }
        self.record_outbound(&out);
        out
    }

    /// Heartbeat tick: evict silent peers, ping the rest
    pub fn heartbeat_tick(&mut self) -> Vec<SyncMessage> {
        for peer in self.sessions.evict_idle(self.config.heartbeat_timeout) {
            info!(
                "Peer {} timed out after {:?} idle",
                peer.device_id,
                peer.idle_for()
            );
            self.cursors.remove(&peer.device_id);
        }

        let timestamp = now_millis();
        let out: Vec<SyncMessage> = self
            .sessions
            .device_ids()
            .into_iter()
            .map(|device| {
                SyncMessage::new(SyncPayload::Ping { timestamp }, &self.identity.device_id)
                    .to(device)
            })
            .collect();
        self.record_outbound(&out);
        out
    }

    /// Sync tick: broadcast local changes produced since the last tick
    pub fn sync_tick(&mut self) -> Vec<SyncMessage> {
        if self.sessions.is_empty() {
            return Vec::new();
        }

        let current = self.manager.current_version();
        if current <= self.last_broadcast_version {
            return Vec::new();
        }

        match self.manager.extract(self.last_broadcast_version, None) {
            Ok(changes) if !changes.is_empty() => {
                debug!(
                    "Broadcasting {} changes (version {} -> {})",
                    changes.len(),
                    self.last_broadcast_version,
                    current
                );
                self.last_broadcast_version = current;
                let out = vec![SyncMessage::new(
                    SyncPayload::Changes {
                        changes,
                        version: current,
                        site_id: self.identity.site_id.clone(),
                    },
                    &self.identity.device_id,
                )];
                self.record_outbound(&out);
                out
            }
            Ok(_) => {
                self.last_broadcast_version = current;
                Vec::new()
            }
            Err(e) => {
                warn!("Extraction for broadcast failed: {}", e);
                self.counters.record_error();
                Vec::new()
            }
        }
    }

    pub fn status(&self, running: bool, relay_connected: bool) -> NodeStatus {
        NodeStatus {
            running,
            device_id: self.identity.device_id.clone(),
            site_id: self.identity.site_id.to_hex(),
            relay_connected,
            connections: self.sessions.summaries(),
            database: DatabaseStatus {
                version: self.manager.current_version(),
                stats: self.manager.change_stats(),
            },
            counters: self.counters.snapshot(),
        }
    }

    fn sync_request_for(&mut self, device_id: &str) -> SyncMessage {
        if let Some(cursor) = self.cursors.get_mut(device_id) {
            cursor.state = PeerSyncState::AwaitingResponse;
        }
        // Always from version zero: re-pulling full history is cheap to
        // deduplicate and immune to cursor drift across restarts.
        SyncMessage::new(
            SyncPayload::SyncRequest {
                from_version: 0,
                site_id: self.identity.site_id.clone(),
                to_version: None,
                tables: None,
            },
            &self.identity.device_id,
        )
        .to(device_id)
    }

    fn answer_sync_request(
        &mut self,
        from: &str,
        from_version: u64,
        to_version: Option<u64>,
        tables: Option<Vec<String>>,
    ) -> Vec<SyncMessage> {
        let tables = tables.filter(|t| !t.is_empty());
        let extracted = match to_version {
            Some(to) => self.manager.extract_range(from_version, to, tables.as_deref()),
            None => self.manager.extract(from_version, tables.as_deref()),
        };

        match extracted {
            Ok(changes) => {
                let current = self.manager.current_version();
                debug!(
                    "Answering sync-request from {} with {} changes",
                    from,
                    changes.len()
                );
                vec![SyncMessage::new(
                    SyncPayload::SyncResponse {
                        from_version,
                        to_version: current,
                        changes,
                        has_more: false,
                        site_id: self.identity.site_id.clone(),
                    },
                    &self.identity.device_id,
                )
                .to(from)]
            }
            Err(e) => {
                warn!("Extraction for {} failed: {}", from, e);
                self.counters.record_error();
                Vec::new()
            }
        }
    }

    /// Apply a batch from a peer, advance its cursor, and ack when at
    /// least one record landed.
    fn absorb_changes(
        &mut self,
        from: &str,
        changes: &[ChangeRecord],
        peer_version: u64,
        frame_timestamp: u64,
    ) -> Vec<SyncMessage> {
        let applied = match self.manager.apply(changes) {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Apply from {} failed: {}", from, e);
                self.counters.record_error();
                return Vec::new();
            }
        };

        if let Some(cursor) = self.cursors.get_mut(from) {
            if peer_version > cursor.version {
                cursor.version = peer_version;
            }
        }

        if applied == 0 {
            return Vec::new();
        }

        info!("Applied {} changes from {}", applied, from);
        vec![SyncMessage::new(
            SyncPayload::Ack {
                message_id: frame_timestamp.to_string(),
                success: true,
                error: None,
            },
            &self.identity.device_id,
        )
        .to(from)]
    }

    fn record_outbound(&self, frames: &[SyncMessage]) {
        for frame in frames {
            let changes = match &frame.payload {
                SyncPayload::SyncResponse { changes, .. }
                | SyncPayload::Changes { changes, .. } => changes.len() as u64,
                _ => 0,
            };
            self.counters.record_sent(changes);
        }
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// A running sync node: protocol core plus relay transport and timers
pub struct SyncNode<S: ChangeLogStore> {
    config: SyncConfig,
    core: Arc<Mutex<NodeCore<S>>>,
    manager: Arc<SyncManager<S>>,
    state: Arc<RwLock<NodeState>>,
    relay: RwLock<Option<RelayClient>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: ChangeLogStore + 'static> SyncNode<S> {
    pub fn new(identity: SiteIdentity, config: SyncConfig, store: Arc<S>) -> Self {
        let manager = Arc::new(SyncManager::new(store));
        let counters = Arc::new(SyncCounters::new());
        let core = Arc::new(Mutex::new(NodeCore::new(
            identity,
            config.clone(),
            manager.clone(),
            counters,
        )));
        Self {
            config,
            core,
            manager,
            state: Arc::new(RwLock::new(NodeState::Stopped)),
            relay: RwLock::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Local change-log access, for producing writes while the node runs
    pub fn manager(&self) -> &Arc<SyncManager<S>> {
        &self.manager
    }

    pub fn node_state(&self) -> NodeState {
        *self.state.read()
    }

    pub fn status(&self) -> NodeStatus {
        let relay_connected = self
            .relay
            .read()
            .as_ref()
            .map(|r| r.is_connected())
            .unwrap_or(false);
        let running = self.node_state() == NodeState::Running;
        self.core.lock().status(running, relay_connected)
    }

    /// Connect to the relay and start the protocol loop
    pub async fn start(&self) -> SyncResult<()> {
        {
            let mut state = self.state.write();
            if *state != NodeState::Stopped {
                return Err(SyncError::Validation(format!(
                    "node already started ({:?})",
                    *state
                )));
            }
            *state = NodeState::Starting;
        }

        let device_id = { self.core.lock().identity.device_id.clone() };
        let (relay, mut events, _relay_handle) =
            RelayClient::spawn(self.config.clone(), device_id);
        *self.relay.write() = Some(relay.clone());

        let core = self.core.clone();
        let config = self.config.clone();
        let state = self.state.clone();
        let worker = tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
            heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut sync_timer = tokio::time::interval(config.sync_interval);
            sync_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Both intervals fire immediately; swallow the first ticks so
            // startup does not ping an empty peer set.
            heartbeat.tick().await;
            sync_timer.tick().await;

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(RelayEvent::Up) => {
                            let frames = { core.lock().on_link_up() };
                            send_all(&relay, frames).await;
                        }
                        Some(RelayEvent::Down { reason }) => {
                            debug!("Relay down: {}", reason);
                        }
                        Some(RelayEvent::Frame(message)) => {
                            let frames = { core.lock().handle_frame(message) };
                            send_all(&relay, frames).await;
                        }
                        None => break,
                    },

                    _ = heartbeat.tick() => {
                        let frames = { core.lock().heartbeat_tick() };
                        send_all(&relay, frames).await;
                    }

                    _ = sync_timer.tick() => {
                        if relay.is_connected() {
                            let frames = { core.lock().sync_tick() };
                            send_all(&relay, frames).await;
                        }
                    }
                }
            }

            *state.write() = NodeState::Stopped;
            debug!("Node worker stopped");
        });
        *self.worker.lock() = Some(worker);

        *self.state.write() = NodeState::Running;
        info!("Sync node started");
        Ok(())
    }

    /// Disconnect and stop the protocol loop
    pub async fn stop(&self) {
        {
            let mut state = self.state.write();
            if *state != NodeState::Running {
                return;
            }
            *state = NodeState::Stopping;
        }

        let relay = self.relay.write().take();
        if let Some(relay) = relay {
            relay.shutdown().await;
        }

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }

        *self.state.write() = NodeState::Stopped;
        info!("Sync node stopped");
    }
}

async fn send_all(relay: &RelayClient, frames: Vec<SyncMessage>) {
    for frame in frames {
        if let Err(e) = relay.send(frame).await {
            warn!("Relay send failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PrimaryKey, SiteId};
    use crate::store::MemoryChangeLog;

    fn core_with_writes(count: usize) -> NodeCore<MemoryChangeLog> {
        let identity = SiteIdentity::new("local-device", SiteId::new([1u8; 16]));
        let log = MemoryChangeLog::new(identity.site_id.clone());
        for i in 0..count {
            log.write(
                "notes",
                PrimaryKey::from_text(&format!("k{}", i)),
                "body",
                Some(serde_json::json!(i)),
            );
        }
        NodeCore::new(
            identity,
            SyncConfig::default(),
            Arc::new(SyncManager::new(Arc::new(log))),
            Arc::new(SyncCounters::new()),
        )
    }

    fn remote_changes(count: usize, site: u8) -> Vec<ChangeRecord> {
        (1..=count as u64)
            .map(|v| {
                ChangeRecord::new(
                    "notes",
                    PrimaryKey::from_text(&format!("r{}", v)),
                    "body",
                    None,
                    1,
                    v,
                    SiteId::new([site; 16]),
                    1,
                    0,
                )
            })
            .collect()
    }

    fn request_from(device: &str) -> SyncMessage {
        SyncMessage::new(
            SyncPayload::SyncRequest {
                from_version: 0,
                site_id: SiteId::new([7u8; 16]),
                to_version: None,
                tables: None,
            },
            device,
        )
        .to("local-device")
    }

    fn kinds(frames: &[SyncMessage]) -> Vec<&'static str> {
        frames.iter().map(|f| f.kind()).collect()
    }

    #[test]
    fn test_sync_request_answered_with_full_history() {
        let mut core = core_with_writes(10);

        let out = core.handle_frame(request_from("peer-1"));

        // New peer: a greeting request plus the response
        assert_eq!(kinds(&out), vec!["sync-request", "sync-response"]);
        match &out[1].payload {
            SyncPayload::SyncResponse {
                changes,
                to_version,
                has_more,
                ..
            } => {
                assert_eq!(changes.len(), 10);
                assert_eq!(*to_version, 10);
                assert!(!has_more);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(out[1].to.as_deref(), Some("peer-1"));
    }

    #[test]
    fn test_sync_request_at_counter_ceiling_gets_empty_response() {
        let mut core = core_with_writes(3);

        let msg = SyncMessage::new(
            SyncPayload::SyncRequest {
                from_version: u64::MAX,
                site_id: SiteId::new([7u8; 16]),
                to_version: None,
                tables: None,
            },
            "peer-1",
        )
        .to("local-device");

        let out = core.handle_frame(msg);
        let response = out
            .iter()
            .find(|f| f.kind() == "sync-response")
            .expect("expected a sync-response");
        match &response.payload {
            SyncPayload::SyncResponse { changes, .. } => assert!(changes.is_empty()),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_changes_applied_and_acked() {
        let mut core = core_with_writes(0);

        let msg = SyncMessage::new(
            SyncPayload::Changes {
                changes: remote_changes(5, 9),
                version: 5,
                site_id: SiteId::new([9u8; 16]),
            },
            "peer-1",
        )
        .to("local-device");
        let frame_ts = msg.timestamp;

        let out = core.handle_frame(msg);
        let ack = out
            .iter()
            .find(|f| f.kind() == "ack")
            .expect("expected an ack");
        match &ack.payload {
            SyncPayload::Ack {
                message_id,
                success,
                ..
            } => {
                assert!(success);
                assert_eq!(message_id, &frame_ts.to_string());
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(core.peer_cursor("peer-1"), Some(5));
    }

    #[test]
    fn test_duplicate_changes_not_acked() {
        let mut core = core_with_writes(0);
        let changes = remote_changes(3, 9);

        let first = SyncMessage::new(
            SyncPayload::Changes {
                changes: changes.clone(),
                version: 3,
                site_id: SiteId::new([9u8; 16]),
            },
            "peer-1",
        );
        let out = core.handle_frame(first);
        assert!(out.iter().any(|f| f.kind() == "ack"));

        // Same batch again: applied count is zero, so no ack goes out
        let replay = SyncMessage::new(
            SyncPayload::Changes {
                changes,
                version: 3,
                site_id: SiteId::new([9u8; 16]),
            },
            "peer-1",
        );
        let out = core.handle_frame(replay);
        assert!(!out.iter().any(|f| f.kind() == "ack"));
    }

    #[test]
    fn test_malformed_site_id_skipped() {
        let mut core = core_with_writes(0);
        let mut changes = remote_changes(5, 9);
        changes[1].site_id = SiteId::new(vec![1, 2, 3]);

        let msg = SyncMessage::new(
            SyncPayload::Changes {
                changes,
                version: 5,
                site_id: SiteId::new([9u8; 16]),
            },
            "peer-1",
        );
        let out = core.handle_frame(msg);

        // Four valid records land; the batch is still acked
        assert!(out.iter().any(|f| f.kind() == "ack"));
        assert_eq!(core.manager.change_stats().total_records, 4);
    }

    #[test]
    fn test_sync_response_advances_cursor() {
        let mut core = core_with_writes(0);
        core.handle_frame(request_from("peer-1"));

        let response = SyncMessage::new(
            SyncPayload::SyncResponse {
                from_version: 0,
                to_version: 7,
                changes: remote_changes(7, 9),
                has_more: false,
                site_id: SiteId::new([9u8; 16]),
            },
            "peer-1",
        );
        let out = core.handle_frame(response);

        assert!(out.iter().any(|f| f.kind() == "ack"));
        assert_eq!(core.peer_cursor("peer-1"), Some(7));
    }

    #[test]
    fn test_ping_answered_with_pong_echo() {
        let mut core = core_with_writes(0);

        let out = core.handle_frame(SyncMessage::new(
            SyncPayload::Ping { timestamp: 12345 },
            "peer-1",
        ));

        let pong = out
            .iter()
            .find(|f| f.kind() == "pong")
            .expect("expected a pong");
        match &pong.payload {
            SyncPayload::Pong { timestamp, latency } => {
                assert_eq!(*timestamp, 12345);
                assert!(latency.is_some());
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(pong.to.as_deref(), Some("peer-1"));
    }

    #[test]
    fn test_link_up_rerequests_every_known_peer() {
        let mut core = core_with_writes(0);
        core.handle_frame(SyncMessage::new(SyncPayload::Ping { timestamp: 1 }, "peer-a"));
        core.handle_frame(SyncMessage::new(SyncPayload::Ping { timestamp: 2 }, "peer-b"));

        let out = core.on_link_up();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|f| f.kind() == "sync-request"));
        assert!(out.iter().all(|f| match &f.payload {
            SyncPayload::SyncRequest { from_version, .. } => *from_version == 0,
            _ => false,
        }));
        let targets: Vec<&str> = out.iter().filter_map(|f| f.to.as_deref()).collect();
        assert_eq!(targets, vec!["peer-a", "peer-b"]);
    }

    #[test]
    fn test_heartbeat_pings_active_peers() {
        let mut core = core_with_writes(0);
        core.handle_frame(SyncMessage::new(SyncPayload::Ping { timestamp: 1 }, "peer-a"));

        let out = core.heartbeat_tick();
        assert_eq!(kinds(&out), vec!["ping"]);
        assert_eq!(out[0].to.as_deref(), Some("peer-a"));
    }

    #[test]
    fn test_sync_tick_broadcasts_once() {
        let mut core = core_with_writes(3);
        core.handle_frame(SyncMessage::new(SyncPayload::Ping { timestamp: 1 }, "peer-a"));

        let out = core.sync_tick();
        assert_eq!(out.len(), 1);
        match &out[0].payload {
            SyncPayload::Changes { changes, version, .. } => {
                assert_eq!(changes.len(), 3);
                assert_eq!(*version, 3);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert!(out[0].to.is_none());

        // Nothing new: the next tick stays quiet
        assert!(core.sync_tick().is_empty());
    }

    #[test]
    fn test_sync_tick_quiet_without_peers() {
        let mut core = core_with_writes(3);
        assert!(core.sync_tick().is_empty());
    }

    #[test]
    fn test_status_snapshot() {
        let mut core = core_with_writes(2);
        core.handle_frame(request_from("peer-1"));

        let status = core.status(true, false);
        assert!(status.running);
        assert!(!status.relay_connected);
        assert_eq!(status.device_id, "local-device");
        assert_eq!(status.site_id, "01".repeat(16));
        assert_eq!(status.connections.len(), 1);
        assert_eq!(status.database.version, 2);
        assert!(status.counters.messages_received >= 1);
    }

    #[tokio::test]
    async fn test_node_lifecycle_guard() {
        let identity = SiteIdentity::new("local-device", SiteId::new([1u8; 16]));
        let store = Arc::new(MemoryChangeLog::new(identity.site_id.clone()));
        let config = SyncConfig::new("ws://127.0.0.1:9/relay", "ws-test");
        let node = SyncNode::new(identity, config, store);

        assert_eq!(node.node_state(), NodeState::Stopped);
        node.start().await.unwrap();
        assert_eq!(node.node_state(), NodeState::Running);
        assert!(node.start().await.is_err());

        node.stop().await;
        assert_eq!(node.node_state(), NodeState::Stopped);
    }
}
