//! In-memory change log
//!
//! Reference implementation of the store contract: ordered extraction,
//! replay-key idempotence, per-table stats. Conflict resolution beyond
//! duplicate/stale rejection is intentionally out of scope here.

use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::RwLock;

use super::{ApplyOutcome, ChangeLogStore, ChangeStats, TableCount};
use crate::error::SyncResult;
use crate::protocol::{ChangeRecord, PrimaryKey, SiteId};

/// Extraction-order key: `(db_version, seq)` first, site id to break ties
/// between concurrent origins.
type OrderKey = (u64, u64, Vec<u8>);

#[derive(Default)]
struct LogState {
    records: BTreeMap<OrderKey, ChangeRecord>,
    seen: HashSet<(Vec<u8>, u64, u64)>,
    cell_versions: HashMap<(String, Vec<u8>, String), u64>,
    version: u64,
}

/// In-memory implementation of [`ChangeLogStore`]
pub struct MemoryChangeLog {
    site_id: SiteId,
    state: RwLock<LogState>,
}

impl MemoryChangeLog {
    pub fn new(site_id: SiteId) -> Self {
        Self {
            site_id,
            state: RwLock::new(LogState::default()),
        }
    }

    /// Site id stamped on local writes
    pub fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    /// Record a local cell mutation, advancing the local version
    pub fn write(
        &self,
        table: impl Into<String>,
        pk: PrimaryKey,
        column: impl Into<String>,
        value: Option<serde_json::Value>,
    ) -> ChangeRecord {
        let table = table.into();
        let column = column.into();
        let mut state = self.state.write();

        state.version += 1;
        let db_version = state.version;

        let cell = (table.clone(), pk.as_bytes().to_vec(), column.clone());
        let col_version = state
            .cell_versions
            .get(&cell)
            .copied()
            .unwrap_or(0)
            + 1;
        state.cell_versions.insert(cell, col_version);

        let record = ChangeRecord::new(
            table,
            pk,
            column,
            value,
            col_version,
            db_version,
            self.site_id.clone(),
            1,
            0,
        );

        Self::insert(&mut state, record.clone());
        record
    }

    fn insert(state: &mut LogState, record: ChangeRecord) {
        let replay = (
            record.site_id.as_bytes().to_vec(),
            record.db_version,
            record.seq,
        );
        state.seen.insert(replay);
        let key = (
            record.db_version,
            record.seq,
            record.site_id.as_bytes().to_vec(),
        );
        state.records.insert(key, record);
    }

    fn matches_tables(record: &ChangeRecord, tables: Option<&[String]>) -> bool {
        match tables {
            Some(names) if !names.is_empty() => names.iter().any(|t| t == &record.table),
            _ => true,
        }
    }
}

impl ChangeLogStore for MemoryChangeLog {
    fn current_version(&self) -> SyncResult<u64> {
        Ok(self.state.read().version)
    }

    fn changes_since(
        &self,
        version: u64,
        tables: Option<&[String]>,
    ) -> SyncResult<Vec<ChangeRecord>> {
        // A cursor at the counter's ceiling has nothing above it
        let Some(start) = version.checked_add(1) else {
            return Ok(Vec::new());
        };
        let state = self.state.read();
        Ok(state
            .records
            .range((start, 0, Vec::new())..)
            .map(|(_, r)| r)
            .filter(|r| Self::matches_tables(r, tables))
            .cloned()
            .collect())
    }

    fn changes_in_range(
        &self,
        from_version: u64,
        to_version: u64,
        tables: Option<&[String]>,
    ) -> SyncResult<Vec<ChangeRecord>> {
        let Some(start) = from_version.checked_add(1) else {
            return Ok(Vec::new());
        };
        let state = self.state.read();
        Ok(state
            .records
            .range((start, 0, Vec::new())..)
            .map(|(_, r)| r)
            .take_while(|r| r.db_version <= to_version)
            .filter(|r| Self::matches_tables(r, tables))
            .cloned()
            .collect())
    }

    fn apply_batch(&self, records: &[ChangeRecord]) -> SyncResult<Vec<ApplyOutcome>> {
        let mut state = self.state.write();
        let mut outcomes = Vec::with_capacity(records.len());

        for record in records {
            let replay = (
                record.site_id.as_bytes().to_vec(),
                record.db_version,
                record.seq,
            );
            if state.seen.contains(&replay) {
                outcomes.push(ApplyOutcome::Rejected);
                continue;
            }

            // Applying remote changes advances the local log version too,
            // so a later extraction includes them.
            if record.db_version > state.version {
                state.version = record.db_version;
            }

            Self::insert(&mut state, record.clone());
            outcomes.push(ApplyOutcome::Applied);
        }

        Ok(outcomes)
    }

    fn compact(&self, before_version: u64) -> SyncResult<u64> {
        let mut state = self.state.write();
        let keep: BTreeMap<OrderKey, ChangeRecord> = state
            .records
            .iter()
            .filter(|((version, _, _), _)| *version >= before_version)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let removed = (state.records.len() - keep.len()) as u64;
        state.records = keep;
        Ok(removed)
    }

    fn stats(&self) -> SyncResult<ChangeStats> {
        let state = self.state.read();

        let mut per_table: HashMap<String, u64> = HashMap::new();
        for record in state.records.values() {
            *per_table.entry(record.table.clone()).or_insert(0) += 1;
        }
        let mut tables: Vec<TableCount> = per_table
            .into_iter()
            .map(|(table, count)| TableCount { table, count })
            .collect();
        tables.sort_by(|a, b| b.count.cmp(&a.count).then(a.table.cmp(&b.table)));

        Ok(ChangeStats {
            total_records: state.records.len() as u64,
            oldest_version: state
                .records
                .keys()
                .next()
                .map(|(v, _, _)| *v)
                .unwrap_or(0),
            newest_version: state
                .records
                .keys()
                .next_back()
                .map(|(v, _, _)| *v)
                .unwrap_or(0),
            tables,
        })
    }

    fn clear(&self) -> SyncResult<u64> {
        let mut state = self.state.write();
        let removed = state.records.len() as u64;
        // Full reset: version and per-cell counters restart too, so a
        // cleared log is indistinguishable from a fresh one.
        *state = LogState::default();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryChangeLog {
        MemoryChangeLog::new(SiteId::new([1u8; 16]))
    }

    #[test]
    fn test_local_writes_advance_version() {
        let log = store();
        assert_eq!(log.current_version().unwrap(), 0);

        log.write("notes", PrimaryKey::from_text("a"), "title", None);
        log.write("notes", PrimaryKey::from_text("a"), "body", None);
        assert_eq!(log.current_version().unwrap(), 2);
    }

    #[test]
    fn test_column_versions_per_cell() {
        let log = store();
        let first = log.write("notes", PrimaryKey::from_text("a"), "title", None);
        let second = log.write("notes", PrimaryKey::from_text("a"), "title", None);
        let other = log.write("notes", PrimaryKey::from_text("b"), "title", None);

        assert_eq!(first.col_version, 1);
        assert_eq!(second.col_version, 2);
        assert_eq!(other.col_version, 1);
    }

    #[test]
    fn test_changes_since_ordering() {
        let log = store();
        for i in 0..5 {
            log.write("notes", PrimaryKey::from_text(&format!("k{}", i)), "v", None);
        }

        let all = log.changes_since(0, None).unwrap();
        assert_eq!(all.len(), 5);
        let versions: Vec<u64> = all.iter().map(|r| r.db_version).collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5]);

        let tail = log.changes_since(3, None).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].db_version, 4);
    }

    #[test]
    fn test_changes_since_is_superset_of_later_cursor() {
        let log = store();
        for i in 0..8 {
            log.write("notes", PrimaryKey::from_text(&format!("k{}", i)), "v", None);
        }

        let from_two = log.changes_since(2, None).unwrap();
        let from_five = log.changes_since(5, None).unwrap();

        // changes_since(2) ends with exactly changes_since(5)
        assert_eq!(&from_two[from_two.len() - from_five.len()..], &from_five[..]);
    }

    #[test]
    fn test_changes_in_range() {
        let log = store();
        for i in 0..6 {
            log.write("notes", PrimaryKey::from_text(&format!("k{}", i)), "v", None);
        }

        let slice = log.changes_in_range(2, 4, None).unwrap();
        let versions: Vec<u64> = slice.iter().map(|r| r.db_version).collect();
        assert_eq!(versions, vec![3, 4]);
    }

    #[test]
    fn test_table_filter() {
        let log = store();
        log.write("notes", PrimaryKey::from_text("a"), "v", None);
        log.write("tags", PrimaryKey::from_text("b"), "v", None);
        log.write("notes", PrimaryKey::from_text("c"), "v", None);

        let filter = vec!["notes".to_string()];
        let notes = log.changes_since(0, Some(&filter)).unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|r| r.table == "notes"));
    }

    #[test]
    fn test_apply_batch_idempotent() {
        let origin = MemoryChangeLog::new(SiteId::new([2u8; 16]));
        for i in 0..3 {
            origin.write("notes", PrimaryKey::from_text(&format!("k{}", i)), "v", None);
        }
        let batch = origin.changes_since(0, None).unwrap();

        let replica = store();
        let first = replica.apply_batch(&batch).unwrap();
        assert!(first.iter().all(|o| *o == ApplyOutcome::Applied));
        let stats_once = replica.stats().unwrap();

        // Second application is a complete no-op
        let second = replica.apply_batch(&batch).unwrap();
        assert!(second.iter().all(|o| *o == ApplyOutcome::Rejected));
        let stats_twice = replica.stats().unwrap();
        assert_eq!(stats_once.total_records, stats_twice.total_records);
        assert_eq!(stats_once.newest_version, stats_twice.newest_version);
    }

    #[test]
    fn test_apply_advances_version() {
        let origin = MemoryChangeLog::new(SiteId::new([2u8; 16]));
        for _ in 0..4 {
            origin.write("notes", PrimaryKey::from_text("k"), "v", None);
        }
        let batch = origin.changes_since(0, None).unwrap();

        let replica = store();
        replica.apply_batch(&batch).unwrap();
        assert_eq!(replica.current_version().unwrap(), 4);
    }

    #[test]
    fn test_compact() {
        let log = store();
        for i in 0..5 {
            log.write("notes", PrimaryKey::from_text(&format!("k{}", i)), "v", None);
        }

        let removed = log.compact(3).unwrap();
        assert_eq!(removed, 2);

        let stats = log.stats().unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.oldest_version, 3);
        assert_eq!(stats.newest_version, 5);
    }

    #[test]
    fn test_stats_per_table() {
        let log = store();
        log.write("notes", PrimaryKey::from_text("a"), "v", None);
        log.write("notes", PrimaryKey::from_text("b"), "v", None);
        log.write("tags", PrimaryKey::from_text("c"), "v", None);

        let stats = log.stats().unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.tables[0].table, "notes");
        assert_eq!(stats.tables[0].count, 2);
        assert_eq!(stats.tables[1].table, "tags");
    }

    #[test]
    fn test_clear_resets_everything() {
        let log = store();
        log.write("notes", PrimaryKey::from_text("a"), "v", None);
        log.write("notes", PrimaryKey::from_text("a"), "v", None);
        assert_eq!(log.clear().unwrap(), 2);
        assert_eq!(log.stats().unwrap().total_records, 0);
        assert_eq!(log.current_version().unwrap(), 0);

        // Counters restart from scratch after a clear
        let fresh = log.write("notes", PrimaryKey::from_text("a"), "v", None);
        assert_eq!(fresh.db_version, 1);
        assert_eq!(fresh.col_version, 1);
    }

    #[test]
    fn test_cursor_at_counter_ceiling() {
        let log = store();
        for i in 0..3 {
            log.write("notes", PrimaryKey::from_text(&format!("k{}", i)), "v", None);
        }

        assert!(log.changes_since(u64::MAX, None).unwrap().is_empty());
        assert!(log
            .changes_in_range(u64::MAX, u64::MAX, None)
            .unwrap()
            .is_empty());
    }
}
