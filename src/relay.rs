//! Relay transport
//!
//! Owns the single WebSocket connection to the relay server. A background
//! worker drives an explicit link state machine: connect, run the session,
//! and on loss wait out one reconnect delay before trying again. Commands
//! arrive over an mpsc channel; decoded frames and link transitions flow
//! back to the node as events.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::SyncMessage;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// State of the relay link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Command to the relay worker
pub enum RelayCommand {
    /// Encode and send one frame. Routing is the frame's own `to` field;
    /// a frame without one is a workspace broadcast.
    Send(SyncMessage),
    /// Close the socket and stop the worker
    Shutdown,
}

/// Event from the relay worker
#[derive(Debug)]
pub enum RelayEvent {
    /// Link established (first connect and every reconnect)
    Up,
    /// Link lost; the worker retries on its own
    Down { reason: String },
    /// Decoded inbound frame
    Frame(SyncMessage),
}

/// Build the relay endpoint URL with identity query parameters
pub fn relay_endpoint(relay_url: &str, device_id: &str, workspace_id: &str) -> SyncResult<Url> {
    let mut url = Url::parse(relay_url)
        .map_err(|e| SyncError::Connection(format!("invalid relay url {}: {}", relay_url, e)))?;
    url.query_pairs_mut()
        .append_pair("deviceId", device_id)
        .append_pair("workspaceId", workspace_id);
    Ok(url)
}

/// Handle to the relay worker task
#[derive(Clone)]
pub struct RelayClient {
    command_tx: mpsc::Sender<RelayCommand>,
    state: Arc<RwLock<LinkState>>,
}

impl RelayClient {
    /// Spawn the worker and return the handle plus the event stream
    pub fn spawn(
        config: SyncConfig,
        device_id: String,
    ) -> (Self, mpsc::Receiver<RelayEvent>, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);
        let state = Arc::new(RwLock::new(LinkState::Disconnected));

        let worker = RelayWorker {
            config,
            device_id,
            command_rx,
            event_tx,
            state: state.clone(),
        };
        let handle = tokio::spawn(worker.run());

        (Self { command_tx, state }, event_rx, handle)
    }

    pub fn link_state(&self) -> LinkState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.link_state() == LinkState::Connected
    }

    /// Queue a frame for sending. Fails only when the worker is gone.
    pub async fn send(&self, message: SyncMessage) -> SyncResult<()> {
        self.command_tx
            .send(RelayCommand::Send(message))
            .await
            .map_err(|_| SyncError::Shutdown)
    }

    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(RelayCommand::Shutdown).await;
    }
}

enum SessionEnd {
    /// Socket failed or closed; reconnect
    Lost(String),
    /// Shutdown requested or node dropped its channels; stop
    Stopped,
}

struct RelayWorker {
    config: SyncConfig,
    device_id: String,
    command_rx: mpsc::Receiver<RelayCommand>,
    event_tx: mpsc::Sender<RelayEvent>,
    state: Arc<RwLock<LinkState>>,
}

impl RelayWorker {
    async fn run(mut self) {
        let url = match relay_endpoint(
            &self.config.relay_url,
            &self.device_id,
            &self.config.workspace_id,
        ) {
            Ok(url) => url,
            Err(e) => {
                warn!("Relay worker not starting: {}", e);
                self.set_state(LinkState::Disconnected);
                return;
            }
        };

        let mut first_attempt = true;
        loop {
            self.set_state(if first_attempt {
                LinkState::Connecting
            } else {
                LinkState::Reconnecting
            });
            first_attempt = false;

            match connect_async(url.as_str()).await {
                Ok((ws, _)) => {
                    info!("Connected to relay {}", self.config.relay_url);
                    self.set_state(LinkState::Connected);
                    if self.event_tx.send(RelayEvent::Up).await.is_err() {
                        break;
                    }

                    match self.session(ws).await {
                        SessionEnd::Stopped => break,
                        SessionEnd::Lost(reason) => {
                            warn!("Relay link lost: {}", reason);
                            if self
                                .event_tx
                                .send(RelayEvent::Down { reason })
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("Relay connect failed: {}", e);
                }
            }

            if !self.wait_reconnect().await {
                break;
            }
        }

        self.set_state(LinkState::Disconnected);
        debug!("Relay worker stopped");
    }

    /// Pump one live socket until it drops or shutdown arrives
    async fn session(&mut self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(RelayCommand::Send(message)) => {
                        let threshold = self
                            .config
                            .enable_compression
                            .then_some(self.config.compression_threshold);
                        match message.encode(threshold) {
                            Ok(text) => {
                                if let Err(e) = sink.send(Message::Text(text.into())).await {
                                    return SessionEnd::Lost(e.to_string());
                                }
                            }
                            Err(e) => {
                                warn!("Dropping unencodable frame: {}", e);
                            }
                        }
                    }
                    Some(RelayCommand::Shutdown) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::Stopped;
                    }
                },

                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => match SyncMessage::decode(&text) {
                        Ok(message) => {
                            if self.event_tx.send(RelayEvent::Frame(message)).await.is_err() {
                                return SessionEnd::Stopped;
                            }
                        }
                        Err(e) => {
                            warn!("Dropping undecodable frame: {}", e);
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            return SessionEnd::Lost(e.to_string());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return SessionEnd::Lost("relay closed the connection".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return SessionEnd::Lost(e.to_string());
                    }
                },
            }
        }
    }

    /// One reconnect delay, cancelable by shutdown. Frames queued while
    /// the link is down are dropped with a warning, never buffered.
    async fn wait_reconnect(&mut self) -> bool {
        let delay = tokio::time::sleep(self.config.reconnect_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = &mut delay => return true,
                cmd = self.command_rx.recv() => match cmd {
                    Some(RelayCommand::Send(message)) => {
                        warn!("Relay down, dropping outbound {} frame", message.payload.kind());
                    }
                    Some(RelayCommand::Shutdown) | None => return false,
                },
            }
        }
    }

    fn set_state(&self, next: LinkState) {
        let mut state = self.state.write();
        if *state != next {
            debug!("Relay link {:?} -> {:?}", *state, next);
            *state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_carries_identity() {
        let url = relay_endpoint("ws://relay.test/sync", "device-1", "ws-42").unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.path(), "/sync");

        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(query.contains(&("deviceId".to_string(), "device-1".to_string())));
        assert!(query.contains(&("workspaceId".to_string(), "ws-42".to_string())));
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!(relay_endpoint("not a url", "d", "w").is_err());
    }

    #[tokio::test]
    async fn test_client_starts_disconnected() {
        // Nothing listens on the discard port, so the worker sits in its
        // retry loop and the handle reports a not-connected link.
        let config = SyncConfig::new("ws://127.0.0.1:9/relay", "ws-test");
        let (client, _events, handle) = RelayClient::spawn(config, "device-1".to_string());

        assert!(!client.is_connected());
        client.shutdown().await;
        let _ = handle.await;
        assert_eq!(client.link_state(), LinkState::Disconnected);
    }
}
