//! Sync wire protocol
//!
//! This module provides:
//! - `ChangeRecord` and the binary-safe `SiteId` / `PrimaryKey` newtypes
//! - `SyncMessage` frames over the six-kind `SyncPayload` sum type
//! - JSON encoding with threshold-gated gzip+base64 compression

pub mod change;
pub mod message;

pub use change::{ChangeRecord, PrimaryKey, SiteId};
pub use message::{SyncMessage, SyncPayload};
