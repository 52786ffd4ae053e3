//! Storage boundary for cumulative, active and history records
//!
//! The concrete row store is an external collaborator. What the accumulator needs from it is
//! captured by two traits:
//!
//! - [`StoreTxn`]: keyed reads and staged writes inside one transaction
//! - [`StrategyStore`]: runs a closure as a single all-or-nothing transaction, plus point reads
//!
//! [`MemoryStore`] is the in-process implementation.

pub mod memory;

pub use memory::MemoryStore;

use std::sync::Arc;

use crate::records::{ActiveRecord, CumulativeRecord, HistoryEntry, StrategyKey};
use crate::{Pattern, RunId};

/// Storage-layer failures; the only hard errors the core propagates
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("write conflict on {0}")]
    Conflict(String),

    #[error("corrupt record for {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl StoreError {
    /// Unavailable and conflicting writes may succeed on retry; corruption will not
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Conflict(_))
    }
}

/// Operations available inside a transaction.
///
/// Reads observe writes staged earlier in the same transaction.
pub trait StoreTxn {
    fn cumulative(&self, key: &StrategyKey) -> Result<Option<CumulativeRecord>, StoreError>;
    fn put_cumulative(&mut self, record: CumulativeRecord) -> Result<(), StoreError>;

    fn active(&self, key: &StrategyKey) -> Result<Option<ActiveRecord>, StoreError>;
    /// Overwrites any previous snapshot for the key
    fn put_active(&mut self, record: ActiveRecord) -> Result<(), StoreError>;

    /// Applied batches for a key, oldest first
    fn history(&self, key: &StrategyKey) -> Result<Vec<HistoryEntry>, StoreError>;
    fn append_history(&mut self, key: &StrategyKey, entry: HistoryEntry) -> Result<(), StoreError>;

    /// Whether `run_id` has already been applied to `key`
    fn is_applied(&self, run_id: &RunId, key: &StrategyKey) -> Result<bool, StoreError>;
    fn mark_applied(&mut self, run_id: &RunId, key: &StrategyKey) -> Result<(), StoreError>;
}

/// Keyed store with atomic read-modify-write.
///
/// Implementations must serialize transactions touching the same key; there is no version field
/// to detect lost updates.
pub trait StrategyStore: Send + Sync {
    /// Run `f` as one transaction: commit everything it staged if it returns `Ok`, nothing
    /// otherwise. A failed commit is reported as a [`StoreError`] and leaves no partial state.
    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn StoreTxn) -> Result<R, E>,
        E: From<StoreError>;

    /// Cumulative records for an instrument and pattern, optionally narrowed to one timeframe
    fn master_history(
        &self,
        instrument: &str,
        pattern: &Pattern,
        timeframe: Option<&str>,
    ) -> Result<Vec<CumulativeRecord>, StoreError>;

    fn cumulative(&self, key: &StrategyKey) -> Result<Option<CumulativeRecord>, StoreError> {
        self.transaction(|txn| txn.cumulative(key))
    }

    fn active(&self, key: &StrategyKey) -> Result<Option<ActiveRecord>, StoreError> {
        self.transaction(|txn| txn.active(key))
    }

    fn history(&self, key: &StrategyKey) -> Result<Vec<HistoryEntry>, StoreError> {
        self.transaction(|txn| txn.history(key))
    }
}

impl<S: StrategyStore> StrategyStore for Arc<S> {
    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn StoreTxn) -> Result<R, E>,
        E: From<StoreError>,
    {
        (**self).transaction(f)
    }

    fn master_history(
        &self,
        instrument: &str,
        pattern: &Pattern,
        timeframe: Option<&str>,
    ) -> Result<Vec<CumulativeRecord>, StoreError> {
        (**self).master_history(instrument, pattern, timeframe)
    }
}
