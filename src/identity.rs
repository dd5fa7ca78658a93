//! Site identity
//!
//! An explicit value built once at bootstrap and handed to the node; there
//! is no process-wide identity singleton.

use crate::protocol::SiteId;

/// Identity of the local replica: relay-facing device id plus the store's
/// site id.
#[derive(Debug, Clone)]
pub struct SiteIdentity {
    /// Device id announced to the relay and stamped on outbound frames
    pub device_id: String,
    /// Site id the change-log store writes into local records
    pub site_id: SiteId,
}

impl SiteIdentity {
    pub fn new(device_id: impl Into<String>, site_id: SiteId) -> Self {
        Self {
            device_id: device_id.into(),
            site_id,
        }
    }

    /// Fresh random identity (new device id, new site id)
    pub fn generate() -> Self {
        Self {
            device_id: uuid::Uuid::new_v4().to_string(),
            site_id: SiteId::random(),
        }
    }

    /// Short device-id prefix for log lines
    pub fn short_device_id(&self) -> String {
        self.device_id.chars().take(8).collect()
    }
}
