//! Change-log store boundary
//!
//! The node never merges data itself; it consumes this contract. A real
//! deployment plugs in the CRDT-merging replicated-log store; tests and
//! demos use the in-memory implementation.

mod memory;

pub use memory::MemoryChangeLog;

use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::protocol::ChangeRecord;

/// Outcome of applying one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Record accepted and merged
    Applied,
    /// Record declined (duplicate, stale, or outside causal order);
    /// never an error at the batch level
    Rejected,
}

/// Per-table change count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    pub count: u64,
}

/// Snapshot of the change log's contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeStats {
    pub total_records: u64,
    pub oldest_version: u64,
    pub newest_version: u64,
    pub tables: Vec<TableCount>,
}

/// Contract of the external replicated-log store
///
/// Implementations must keep extraction ordered by `(db_version asc,
/// seq asc)` and treat re-application of an already-seen record as a
/// per-record rejection, not a failure.
pub trait ChangeLogStore: Send + Sync {
    /// Current local log version
    fn current_version(&self) -> SyncResult<u64>;

    /// All records with `db_version > version`, optionally filtered by table
    fn changes_since(&self, version: u64, tables: Option<&[String]>)
        -> SyncResult<Vec<ChangeRecord>>;

    /// Records with `from_version < db_version <= to_version`
    fn changes_in_range(
        &self,
        from_version: u64,
        to_version: u64,
        tables: Option<&[String]>,
    ) -> SyncResult<Vec<ChangeRecord>>;

    /// Apply a batch atomically; per-record rejections are reported in the
    /// outcome vector, one entry per input record, in order.
    fn apply_batch(&self, records: &[ChangeRecord]) -> SyncResult<Vec<ApplyOutcome>>;

    /// Permanently remove records with `db_version < before_version`.
    /// Irreversible; space reclamation only.
    fn compact(&self, before_version: u64) -> SyncResult<u64>;

    /// Contents snapshot
    fn stats(&self) -> SyncResult<ChangeStats>;

    /// Drop every record. Dangerous; test/reset tooling only.
    fn clear(&self) -> SyncResult<u64>;
}
