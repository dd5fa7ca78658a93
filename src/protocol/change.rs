//! Change records shipped between sites
//!
//! A `ChangeRecord` describes one cell-level mutation together with the
//! version metadata the replicated-log store needs to merge it. Primary
//! keys and site ids are binary-safe: they travel as base64 strings on the
//! wire and are never re-derived from runtime shape.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-length identifier of the site (replica) that originated a change
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiteId(Vec<u8>);

impl SiteId {
    /// Expected identifier length in bytes
    pub const LEN: usize = 16;

    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Generate a fresh random site id
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// A site id is valid only at the fixed length; anything else is a
    /// validation skip at apply time, never a batch failure.
    pub fn is_valid(&self) -> bool {
        self.0.len() == Self::LEN
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Short prefix for log lines
    pub fn short(&self) -> String {
        let full = self.to_hex();
        full.chars().take(8).collect()
    }
}

impl std::fmt::Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for SiteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for SiteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = BASE64
            .decode(text.as_bytes())
            .map_err(|e| D::Error::custom(format!("invalid base64 site id: {}", e)))?;
        Ok(Self(bytes))
    }
}

/// Binary-safe primary key material
///
/// The store hands keys over as raw bytes; text keys are just their UTF-8
/// bytes. There is exactly one wire encoding (base64), so a key survives
/// any number of hops byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimaryKey(Vec<u8>);

impl PrimaryKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_text(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Borrow as text when the key happens to be valid UTF-8
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "{}", text),
            None => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl Serialize for PrimaryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for PrimaryKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = BASE64
            .decode(text.as_bytes())
            .map_err(|e| D::Error::custom(format!("invalid base64 primary key: {}", e)))?;
        Ok(Self(bytes))
    }
}

/// One logged mutation of a single cell
///
/// Wire field names match the change-log store's column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Logical table name
    pub table: String,
    /// Primary key of the mutated row
    pub pk: PrimaryKey,
    /// Mutated column identifier
    pub cid: String,
    /// New value; absent means null
    #[serde(default)]
    pub val: Option<serde_json::Value>,
    /// Per-cell counter used by the store for conflict resolution
    pub col_version: u64,
    /// Per-origin-site counter; total order of the origin's log
    pub db_version: u64,
    /// Origin site
    pub site_id: SiteId,
    /// Causal length, consumed only by the store's merge algorithm
    pub cl: u64,
    /// Tie-breaker within the same db_version
    pub seq: u64,
}

impl ChangeRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        table: impl Into<String>,
        pk: PrimaryKey,
        cid: impl Into<String>,
        val: Option<serde_json::Value>,
        col_version: u64,
        db_version: u64,
        site_id: SiteId,
        cl: u64,
        seq: u64,
    ) -> Self {
        Self {
            table: table.into(),
            pk,
            cid: cid.into(),
            val,
            col_version,
            db_version,
            site_id,
            cl,
            seq,
        }
    }

    /// Idempotence key: `(site_id, db_version, seq)` uniquely identifies a
    /// record across any number of replays.
    pub fn replay_key(&self) -> (SiteId, u64, u64) {
        (self.site_id.clone(), self.db_version, self.seq)
    }
}
