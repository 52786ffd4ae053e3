//! Cumulative accumulation of per-run strategies
//!
//! A key is either absent or has a [`CumulativeRecord`]. The first qualifying strategy creates the
//! record with its own counts; every later one is merged additively and the derived fields are
//! recomputed from the merged totals. The same transaction overwrites the key's [`ActiveRecord`]
//! with the batch's own numbers and appends a [`HistoryEntry`].
//!
//! The merge is **not idempotent**: applying the same batch twice double-counts it, and nothing in
//! the record can reveal that. Callers deliver each batch at most once per key (see
//! [`RunOrchestrator`](crate::orchestrator::RunOrchestrator)); [`Accumulator::reconcile`] rebuilds a
//! record from its history when that contract was broken.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::analysis::QualityScorer;
use crate::records::{
    ActiveRecord, BatchStats, CumulativeRecord, HistoryEntry, ScoredStrategy, StrategyKey,
};
use crate::store::{StoreTxn, StrategyStore};
use crate::{DiscoveryError, Result, RunId};

/// What a single accumulation did to the cumulative record
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Key was absent; record created from the batch
    Created(CumulativeRecord),
    /// Batch merged into an existing record
    Merged {
        previous: CumulativeRecord,
        current: CumulativeRecord,
    },
}

impl MergeOutcome {
    /// The record as written
    pub fn record(&self) -> &CumulativeRecord {
        match self {
            MergeOutcome::Created(record) => record,
            MergeOutcome::Merged { current, .. } => current,
        }
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        matches!(self, MergeOutcome::Created(_))
    }
}

/// Merges scored strategies into a [`StrategyStore`]
#[derive(Debug, Clone)]
pub struct Accumulator<S> {
    store: S,
    scorer: QualityScorer,
}

impl<S: StrategyStore> Accumulator<S> {
    /// The scorer must be the one discovery used, or merged scores drift from fresh ones
    pub fn new(store: S, scorer: QualityScorer) -> Self {
        Self { store, scorer }
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[inline]
    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    /// Create-or-merge one strategy in its own transaction.
    ///
    /// Calling this twice with the same batch counts it twice.
    pub fn accumulate(&self, run_id: &RunId, strategy: &ScoredStrategy) -> Result<MergeOutcome> {
        let now = Utc::now();
        self.store
            .transaction(|txn| self.accumulate_in(txn, run_id, strategy, now))
    }

    /// Create-or-merge one strategy inside a caller-owned transaction.
    ///
    /// Only the strategy's counts are trusted; effectiveness and score are always derived from
    /// them with this accumulator's scorer.
    pub fn accumulate_in(
        &self,
        txn: &mut dyn StoreTxn,
        run_id: &RunId,
        strategy: &ScoredStrategy,
        now: DateTime<Utc>,
    ) -> Result<MergeOutcome> {
        let key = strategy.key();
        let batch = BatchStats::from_strategy(strategy)?;

        let outcome = match txn.cumulative(&key)? {
            None => MergeOutcome::Created(CumulativeRecord::from_totals(
                key.clone(),
                batch,
                &self.scorer,
                now,
                now,
            )),
            Some(previous) => {
                if !previous.is_consistent() {
                    tracing::warn!(key = %key, "merging into inconsistent cumulative record");
                }
                let current = previous.merged(batch, &self.scorer, now);
                MergeOutcome::Merged { previous, current }
            }
        };

        txn.put_cumulative(outcome.record().clone())?;
        txn.put_active(ActiveRecord::from_batch(key.clone(), batch, &self.scorer, now))?;
        txn.append_history(
            &key,
            HistoryEntry {
                run_id: run_id.clone(),
                stats: batch,
                recorded_at: now,
            },
        )?;

        match &outcome {
            MergeOutcome::Created(record) => tracing::info!(
                key = %key,
                run_id = %run_id,
                occurrences = record.occurrences,
                effectiveness = record.effectiveness,
                "strategy created"
            ),
            MergeOutcome::Merged { previous, current } => tracing::info!(
                key = %key,
                run_id = %run_id,
                before = previous.occurrences,
                after = current.occurrences,
                effectiveness = current.effectiveness,
                score = current.score,
                "strategy merged"
            ),
        }
        Ok(outcome)
    }

    /// Rebuild the cumulative record for `key` from its history, counting each run once.
    ///
    /// Idempotent. Returns `None` when the key has no history. The rebuilt record keeps the
    /// original `created_at`, so this is the one path on which `occurrences` may shrink.
    pub fn reconcile(&self, key: &StrategyKey) -> Result<Option<CumulativeRecord>> {
        let now = Utc::now();
        self.store.transaction(|txn| {
            let history = txn.history(key)?;
            if history.is_empty() {
                return Ok(None);
            }

            let mut seen = HashSet::new();
            let mut totals = BatchStats::default();
            let mut duplicates = 0usize;
            for entry in &history {
                if !seen.insert(&entry.run_id) {
                    duplicates += 1;
                    continue;
                }
                entry.stats.check(key)?;
                totals = totals + entry.stats;
            }

            let created_at = match txn.cumulative(key)? {
                Some(existing) => existing.created_at,
                None => history
                    .iter()
                    .map(|e| e.recorded_at)
                    .min()
                    .unwrap_or(now),
            };

            let record = CumulativeRecord::from_totals(key.clone(), totals, &self.scorer, created_at, now);
            if duplicates > 0 {
                tracing::warn!(
                    key = %key,
                    duplicates,
                    occurrences = record.occurrences,
                    "duplicate batches dropped while reconciling"
                );
            }
            txn.put_cumulative(record.clone())?;
            Ok::<_, DiscoveryError>(Some(record))
        })
    }

    /// Recompute derived fields of a record with this accumulator's scorer
    pub fn recompute(&self, record: &CumulativeRecord) -> CumulativeRecord {
        let mut record = record.clone();
        record.recompute(&self.scorer);
        record
    }
}
