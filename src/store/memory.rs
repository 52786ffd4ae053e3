//! In-process [`StrategyStore`]
//!
//! One mutex guards all tables, so transactions are fully serialized. Writes are staged in the
//! transaction and applied only after the closure returns `Ok` and the commit succeeds.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{StoreError, StoreTxn, StrategyStore};
use crate::records::{ActiveRecord, CumulativeRecord, HistoryEntry, StrategyKey};
use crate::{Pattern, RunId};

#[derive(Debug, Default)]
struct Tables {
    cumulative: HashMap<StrategyKey, CumulativeRecord>,
    active: HashMap<StrategyKey, ActiveRecord>,
    history: HashMap<StrategyKey, Vec<HistoryEntry>>,
    applied: HashMap<RunId, HashSet<StrategyKey>>,
}

#[derive(Debug, Default)]
struct Staged {
    cumulative: HashMap<StrategyKey, CumulativeRecord>,
    active: HashMap<StrategyKey, ActiveRecord>,
    history: HashMap<StrategyKey, Vec<HistoryEntry>>,
    applied: HashMap<RunId, HashSet<StrategyKey>>,
}

impl Staged {
    fn is_empty(&self) -> bool {
        self.cumulative.is_empty()
            && self.active.is_empty()
            && self.history.is_empty()
            && self.applied.is_empty()
    }

    fn apply(self, tables: &mut Tables) {
        tables.cumulative.extend(self.cumulative);
        tables.active.extend(self.active);
        for (key, entries) in self.history {
            tables.history.entry(key).or_default().extend(entries);
        }
        for (run_id, keys) in self.applied {
            tables.applied.entry(run_id).or_default().extend(keys);
        }
    }
}

struct MemoryTxn<'a> {
    tables: &'a Tables,
    staged: Staged,
}

impl StoreTxn for MemoryTxn<'_> {
    fn cumulative(&self, key: &StrategyKey) -> Result<Option<CumulativeRecord>, StoreError> {
        Ok(self
            .staged
            .cumulative
            .get(key)
            .or_else(|| self.tables.cumulative.get(key))
            .cloned())
    }

    fn put_cumulative(&mut self, record: CumulativeRecord) -> Result<(), StoreError> {
        self.staged.cumulative.insert(record.key.clone(), record);
        Ok(())
    }

    fn active(&self, key: &StrategyKey) -> Result<Option<ActiveRecord>, StoreError> {
        Ok(self
            .staged
            .active
            .get(key)
            .or_else(|| self.tables.active.get(key))
            .cloned())
    }

    fn put_active(&mut self, record: ActiveRecord) -> Result<(), StoreError> {
        self.staged.active.insert(record.key.clone(), record);
        Ok(())
    }

    fn history(&self, key: &StrategyKey) -> Result<Vec<HistoryEntry>, StoreError> {
        let committed = self.tables.history.get(key).into_iter().flatten();
        let staged = self.staged.history.get(key).into_iter().flatten();
        Ok(committed.chain(staged).cloned().collect())
    }

    fn append_history(&mut self, key: &StrategyKey, entry: HistoryEntry) -> Result<(), StoreError> {
        self.staged
            .history
            .entry(key.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    fn is_applied(&self, run_id: &RunId, key: &StrategyKey) -> Result<bool, StoreError> {
        let hit = |applied: &HashMap<RunId, HashSet<StrategyKey>>| {
            applied.get(run_id).is_some_and(|keys| keys.contains(key))
        };
        Ok(hit(&self.staged.applied) || hit(&self.tables.applied))
    }

    fn mark_applied(&mut self, run_id: &RunId, key: &StrategyKey) -> Result<(), StoreError> {
        self.staged
            .applied
            .entry(run_id.clone())
            .or_default()
            .insert(key.clone());
        Ok(())
    }
}

/// Mutex-guarded in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing_commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writing commits fail with [`StoreError::Unavailable`].
    ///
    /// Read-only transactions are unaffected.
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Number of cumulative records
    pub fn len(&self) -> usize {
        self.tables.lock().cumulative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all cumulative records, ordered by key
    pub fn cumulative_records(&self) -> Vec<CumulativeRecord> {
        let mut records: Vec<_> = self.tables.lock().cumulative.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    /// Snapshot of all active records, ordered by key
    pub fn active_records(&self) -> Vec<ActiveRecord> {
        let mut records: Vec<_> = self.tables.lock().active.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }
}

impl StrategyStore for MemoryStore {
    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn StoreTxn) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut tables = self.tables.lock();

        let (result, staged) = {
            let mut txn = MemoryTxn {
                tables: &tables,
                staged: Staged::default(),
            };
            let result = f(&mut txn)?;
            (result, txn.staged)
        };

        if staged.is_empty() {
            return Ok(result);
        }
        if self.take_injected_failure() {
            return Err(StoreError::Unavailable("injected commit failure".to_string()).into());
        }

        staged.apply(&mut tables);
        Ok(result)
    }

    fn master_history(
        &self,
        instrument: &str,
        pattern: &Pattern,
        timeframe: Option<&str>,
    ) -> Result<Vec<CumulativeRecord>, StoreError> {
        let tables = self.tables.lock();
        let mut records: Vec<CumulativeRecord> = tables
            .cumulative
            .values()
            .filter(|r| r.key.instrument == instrument && &r.key.pattern == pattern)
            .filter(|r| timeframe.map_or(true, |tf| r.key.timeframe == tf))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}
