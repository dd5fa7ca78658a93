//! Wire messages exchanged through the relay
//!
//! One JSON object per frame: `{type, from, to?, timestamp, compressed?,
//! data}`. The payload is an exhaustive sum type over the six message
//! kinds, so every handler has to account for all of them. Frames at or
//! above the compression threshold get their `data` field gzipped and
//! base64-encoded; decoding reverses this before anything else sees the
//! message, so compression stays invisible above this layer.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use super::change::{ChangeRecord, SiteId};
use crate::error::{SyncError, SyncResult};

/// Kind-specific payload of a sync message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum SyncPayload {
    /// Ask a peer for its changes above `from_version`
    SyncRequest {
        #[serde(rename = "fromVersion")]
        from_version: u64,
        #[serde(rename = "siteId")]
        site_id: SiteId,
        #[serde(rename = "toVersion", skip_serializing_if = "Option::is_none", default)]
        to_version: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        tables: Option<Vec<String>>,
    },
    /// Answer to a sync-request
    SyncResponse {
        #[serde(rename = "fromVersion")]
        from_version: u64,
        #[serde(rename = "toVersion")]
        to_version: u64,
        changes: Vec<ChangeRecord>,
        #[serde(rename = "hasMore")]
        has_more: bool,
        #[serde(rename = "siteId")]
        site_id: SiteId,
    },
    /// Unsolicited push of newly produced changes
    Changes {
        changes: Vec<ChangeRecord>,
        version: u64,
        #[serde(rename = "siteId")]
        site_id: SiteId,
    },
    /// Confirms processing of a prior message
    Ack {
        #[serde(rename = "messageId")]
        message_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<String>,
    },
    /// Liveness probe
    Ping { timestamp: u64 },
    /// Probe reply; echoes the ping timestamp so the sender can compute latency
    Pong {
        timestamp: u64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        latency: Option<u64>,
    },
}

impl SyncPayload {
    /// Wire name of the message kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            SyncPayload::SyncRequest { .. } => "sync-request",
            SyncPayload::SyncResponse { .. } => "sync-response",
            SyncPayload::Changes { .. } => "changes",
            SyncPayload::Ack { .. } => "ack",
            SyncPayload::Ping { .. } => "ping",
            SyncPayload::Pong { .. } => "pong",
        }
    }
}

/// A complete frame: routing envelope plus payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(flatten)]
    pub payload: SyncPayload,
    /// Sender device id
    pub from: String,
    /// Receiver device id; absent means broadcast
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub to: Option<String>,
    /// Sender wall-clock time in milliseconds
    pub timestamp: u64,
}

impl SyncMessage {
    pub fn new(payload: SyncPayload, from: impl Into<String>) -> Self {
        Self {
            payload,
            from: from.into(),
            to: None,
            timestamp: now_millis(),
        }
    }

    pub fn to(mut self, device_id: impl Into<String>) -> Self {
        self.to = Some(device_id.into());
        self
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    /// Serialize to a wire frame, compressing `data` when the plain frame
    /// reaches `threshold` bytes. `None` disables compression entirely.
    pub fn encode(&self, threshold: Option<usize>) -> SyncResult<String> {
        let value = serde_json::to_value(self)?;
        let plain = value.to_string();

        match threshold {
            Some(t) if plain.len() >= t => {}
            _ => return Ok(plain),
        }

        let mut frame = value;
        let obj = frame
            .as_object_mut()
            .ok_or_else(|| SyncError::Protocol("frame is not a JSON object".into()))?;
        let data = obj
            .remove("data")
            .unwrap_or(serde_json::Value::Null);
        obj.insert(
            "data".to_string(),
            serde_json::Value::String(compress_value(&data)?),
        );
        obj.insert("compressed".to_string(), serde_json::Value::Bool(true));
        Ok(frame.to_string())
    }

    /// Parse a wire frame, transparently decompressing when marked
    pub fn decode(text: &str) -> SyncResult<Self> {
        let mut frame: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| SyncError::Protocol(format!("undecodable frame: {}", e)))?;

        let obj = frame
            .as_object_mut()
            .ok_or_else(|| SyncError::Protocol("frame is not a JSON object".into()))?;

        let compressed = obj
            .remove("compressed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if compressed {
            let packed = obj
                .get("data")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    SyncError::Protocol("compressed frame without string data".into())
                })?;
            obj.insert("data".to_string(), decompress_value(&packed)?);
        }

        // Tracking fields the reference protocol allows but this layer ignores
        obj.remove("messageId");
        obj.remove("checksum");

        serde_json::from_value(frame)
            .map_err(|e| SyncError::Protocol(format!("malformed message: {}", e)))
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

fn compress_value(value: &serde_json::Value) -> SyncResult<String> {
    let json = serde_json::to_vec(value)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| SyncError::Compression(e.to_string()))?;
    let packed = encoder
        .finish()
        .map_err(|e| SyncError::Compression(e.to_string()))?;
    Ok(BASE64.encode(packed))
}

fn decompress_value(text: &str) -> SyncResult<serde_json::Value> {
    let packed = BASE64
        .decode(text.as_bytes())
        .map_err(|e| SyncError::Compression(format!("invalid base64: {}", e)))?;
    let mut json = Vec::new();
    GzDecoder::new(packed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| SyncError::Compression(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| SyncError::Compression(e.to_string()))
}
