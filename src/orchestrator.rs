//! One discovery run from candles to persisted records
//!
//! Each `(run, key)` pair is applied at most once: the applied marker is checked and written in
//! the same transaction as the merge. A run that fails halfway can be retried with the same
//! [`RunId`]; keys that already committed are skipped and only the rest are merged.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::accumulator::{Accumulator, MergeOutcome};
use crate::records::ScoredStrategy;
use crate::store::StrategyStore;
use crate::{DiscoveryEngine, DiscoveryError, Result, RunId, OHLC};

/// Summary of one processed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub instrument: String,
    pub timeframe: String,
    /// Qualifying strategies found in the batch
    pub discovered: usize,
    pub created: usize,
    pub merged: usize,
    /// Keys this run had already been applied to
    pub skipped: usize,
    /// Discovery output, best score first
    pub strategies: Vec<ScoredStrategy>,
}

enum Applied {
    Done(MergeOutcome),
    Skipped,
}

/// Wires a [`DiscoveryEngine`] to an [`Accumulator`] with an at-most-once guard per key
#[derive(Debug, Clone)]
pub struct RunOrchestrator<S> {
    engine: DiscoveryEngine,
    accumulator: Accumulator<S>,
}

impl<S: StrategyStore> RunOrchestrator<S> {
    /// Accumulation scores with the engine's own scorer
    pub fn new(engine: DiscoveryEngine, store: S) -> Self {
        let scorer = engine.scorer().clone();
        Self {
            engine,
            accumulator: Accumulator::new(store, scorer),
        }
    }

    #[inline]
    pub fn engine(&self) -> &DiscoveryEngine {
        &self.engine
    }

    #[inline]
    pub fn accumulator(&self) -> &Accumulator<S> {
        &self.accumulator
    }

    #[inline]
    pub fn store(&self) -> &S {
        self.accumulator.store()
    }

    /// Discover strategies in `candles` and accumulate each one
    pub fn process<T: OHLC>(
        &self,
        run_id: &RunId,
        instrument: &str,
        timeframe: &str,
        candles: &[T],
    ) -> Result<RunReport> {
        let strategies = self.engine.discover(instrument, timeframe, candles);
        let mut report = RunReport {
            run_id: run_id.clone(),
            instrument: instrument.to_string(),
            timeframe: timeframe.to_string(),
            discovered: strategies.len(),
            created: 0,
            merged: 0,
            skipped: 0,
            strategies: Vec::new(),
        };

        self.apply_into(&mut report, &strategies)?;
        report.strategies = strategies;

        tracing::info!(
            run_id = %run_id,
            instrument,
            timeframe,
            candles = candles.len(),
            discovered = report.discovered,
            created = report.created,
            merged = report.merged,
            skipped = report.skipped,
            "run processed"
        );
        Ok(report)
    }

    /// Accumulate already-discovered strategies of one `(instrument, timeframe)` batch under
    /// `run_id`.
    ///
    /// A slice spanning several instruments or timeframes is rejected before anything is written.
    pub fn apply(&self, run_id: &RunId, strategies: &[ScoredStrategy]) -> Result<RunReport> {
        let (instrument, timeframe) = strategies
            .first()
            .map(|s| (s.observation.instrument.clone(), s.observation.timeframe.clone()))
            .unwrap_or_default();
        if let Some(stray) = strategies.iter().find(|s| {
            s.observation.instrument != instrument || s.observation.timeframe != timeframe
        }) {
            return Err(DiscoveryError::InvalidBatch {
                key: stray.key().to_string(),
                reason: "strategies span more than one instrument/timeframe",
            });
        }
        let mut report = RunReport {
            run_id: run_id.clone(),
            instrument,
            timeframe,
            discovered: strategies.len(),
            created: 0,
            merged: 0,
            skipped: 0,
            strategies: strategies.to_vec(),
        };
        self.apply_into(&mut report, strategies)?;
        Ok(report)
    }

    fn apply_into(&self, report: &mut RunReport, strategies: &[ScoredStrategy]) -> Result<()> {
        let run_id = report.run_id.clone();
        for strategy in strategies {
            match self.apply_one(&run_id, strategy)? {
                Applied::Done(MergeOutcome::Created(_)) => report.created += 1,
                Applied::Done(MergeOutcome::Merged { .. }) => report.merged += 1,
                Applied::Skipped => report.skipped += 1,
            }
        }
        Ok(())
    }

    fn apply_one(&self, run_id: &RunId, strategy: &ScoredStrategy) -> Result<Applied> {
        let key = strategy.key();
        let now = Utc::now();
        let result = self.store().transaction(|txn| {
            if txn.is_applied(run_id, &key)? {
                return Ok::<_, DiscoveryError>(Applied::Skipped);
            }
            let outcome = self.accumulator.accumulate_in(txn, run_id, strategy, now)?;
            txn.mark_applied(run_id, &key)?;
            Ok(Applied::Done(outcome))
        });

        match &result {
            Ok(Applied::Skipped) => {
                tracing::info!(run_id = %run_id, key = %key, "batch already applied, skipping")
            }
            Err(e) => tracing::error!(
                run_id = %run_id,
                key = %key,
                retryable = e.is_retryable(),
                error = %e,
                "accumulation failed"
            ),
            Ok(Applied::Done(_)) => {}
        }
        result
    }
}
