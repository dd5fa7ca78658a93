//! Configuration for the sync node
//!
//! Defaults mirror the reference deployment: 30s sync/heartbeat cadence,
//! 90s peer timeout, 5s relay reconnect delay, 1 KiB compression threshold.

use std::time::Duration;

/// Configuration for the relay transport and sync protocol
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// WebSocket relay endpoint (e.g. `wss://relay.example.com/sync`)
    pub relay_url: String,
    /// Workspace scope announced to the relay at connect time
    pub workspace_id: String,
    /// How often to check for and push local updates
    pub sync_interval: Duration,
    /// Batch size for change extraction (reserved for pagination)
    pub batch_size: usize,
    /// Heartbeat ping cadence
    pub heartbeat_interval: Duration,
    /// Inactivity window after which a peer is dropped
    pub heartbeat_timeout: Duration,
    /// Delay before a relay reconnect attempt
    pub reconnect_delay: Duration,
    /// Whether to compress large outbound frames
    pub enable_compression: bool,
    /// Serialized frame size at which compression kicks in (bytes)
    pub compression_threshold: usize,
}

impl SyncConfig {
    pub fn new(relay_url: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            workspace_id: workspace_id.into(),
            sync_interval: Duration::from_secs(30),
            batch_size: 1000,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
            reconnect_delay: Duration::from_secs(5),
            enable_compression: true,
            compression_threshold: 1024,
        }
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_compression(mut self, enabled: bool, threshold: usize) -> Self {
        self.enable_compression = enabled;
        self.compression_threshold = threshold;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("ws://127.0.0.1:9400/relay", "default-workspace")
    }
}
