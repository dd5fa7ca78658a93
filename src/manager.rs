//! Sync manager: validated bridge between the change-log store and the wire
//!
//! Extraction hands records out in store order; application validates each
//! record, skips the broken ones with a warning, and submits the rest as a
//! single atomic batch. Store unavailability degrades (version zero) and
//! never takes the node down.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::protocol::{ChangeRecord, SiteId};
use crate::store::{ApplyOutcome, ChangeLogStore, ChangeStats};

pub struct SyncManager<S: ChangeLogStore> {
    store: Arc<S>,
}

impl<S: ChangeLogStore> SyncManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Current local log version; zero (with a warning) when the store
    /// cannot answer.
    pub fn current_version(&self) -> u64 {
        match self.store.current_version() {
            Ok(version) => version,
            Err(e) => {
                warn!("Change log store unavailable, reporting version 0: {}", e);
                0
            }
        }
    }

    /// All changes above `since_version`, in `(db_version, seq)` order.
    /// An empty log yields an empty batch, not an error.
    pub fn extract(
        &self,
        since_version: u64,
        tables: Option<&[String]>,
    ) -> SyncResult<Vec<ChangeRecord>> {
        let changes = self.store.changes_since(since_version, tables)?;
        debug!(
            "Extracted {} changes since version {}",
            changes.len(),
            since_version
        );
        Ok(changes)
    }

    /// Changes bounded above by `to_version`
    pub fn extract_range(
        &self,
        from_version: u64,
        to_version: u64,
        tables: Option<&[String]>,
    ) -> SyncResult<Vec<ChangeRecord>> {
        let changes = self
            .store
            .changes_in_range(from_version, to_version, tables)?;
        debug!(
            "Extracted {} changes in range {}..={}",
            changes.len(),
            from_version,
            to_version
        );
        Ok(changes)
    }

    /// Apply a batch of remote changes.
    ///
    /// Records missing required fields are skipped with a warning before
    /// reaching the store; the rest go down in one atomic `apply_batch`.
    /// Returns the count the store actually accepted, which may be lower
    /// than the input length (duplicates and stale records are rejected
    /// silently at the record level).
    pub fn apply(&self, records: &[ChangeRecord]) -> SyncResult<usize> {
        if records.is_empty() {
            debug!("No changes to apply");
            return Ok(0);
        }

        let mut valid = Vec::with_capacity(records.len());
        for record in records {
            match validate(record) {
                Ok(()) => valid.push(record.clone()),
                Err(reason) => {
                    warn!(
                        "Skipping invalid change for {}.{}: {}",
                        record.table, record.cid, reason
                    );
                }
            }
        }

        if valid.is_empty() {
            return Ok(0);
        }

        let outcomes = self.store.apply_batch(&valid)?;
        let applied = outcomes
            .iter()
            .filter(|o| **o == ApplyOutcome::Applied)
            .count();
        let rejected = valid.len() - applied;
        if rejected > 0 {
            debug!("Store declined {} duplicate/stale records", rejected);
        }
        debug!("Applied {}/{} changes", applied, records.len());
        Ok(applied)
    }

    /// Remove records below `before_version` from the log
    pub fn compact(&self, before_version: u64) -> SyncResult<u64> {
        let removed = self.store.compact(before_version)?;
        debug!(
            "Compacted {} changes before version {}",
            removed, before_version
        );
        Ok(removed)
    }

    /// True when at least one record exists above `since_version`
    pub fn has_pending(&self, since_version: u64) -> SyncResult<bool> {
        Ok(!self.store.changes_since(since_version, None)?.is_empty())
    }

    /// Store contents snapshot; zero-valued when the store cannot answer
    pub fn change_stats(&self) -> ChangeStats {
        match self.store.stats() {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Change log store unavailable, reporting empty stats: {}", e);
                ChangeStats::default()
            }
        }
    }
}

fn validate(record: &ChangeRecord) -> Result<(), String> {
    if record.table.is_empty() {
        return Err("missing table".to_string());
    }
    if record.pk.is_empty() {
        return Err("missing primary key".to_string());
    }
    if record.cid.is_empty() {
        return Err("missing column id".to_string());
    }
    if !record.site_id.is_valid() {
        return Err(format!(
            "malformed site id ({} bytes, expected {})",
            record.site_id.as_bytes().len(),
            SiteId::LEN
        ));
    }
    Ok(())
}
