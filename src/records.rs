//! Record shapes flowing between the analysis stages and storage
//!
//! Ephemeral, one run: [`OutcomeTally`] → [`PatternObservation`] → [`ScoredStrategy`].
//! Persistent: [`CumulativeRecord`] (all-time, merged), [`ActiveRecord`] (latest run, overwritten)
//! and [`HistoryEntry`] (per-run log the cumulative record can be rebuilt from).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{helpers, QualityScorer};
use crate::{Category, Direction, DiscoveryError, Pattern, Result, RunId};

// ============================================================
// SCANNER / EVALUATOR OUTPUT
// ============================================================

/// Outcomes observed right after every occurrence of one pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeTally {
    pub pattern: Pattern,
    pub up: u64,
    pub down: u64,
}

impl OutcomeTally {
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            up: 0,
            down: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, outcome: Category) {
        match outcome {
            Category::Up => self.up += 1,
            Category::Down => self.down += 1,
        }
    }

    /// Occurrences that had a following candle
    #[inline]
    pub fn total(&self) -> u64 {
        self.up + self.down
    }

    #[inline]
    pub fn count(&self, outcome: Category) -> u64 {
        match outcome {
            Category::Up => self.up,
            Category::Down => self.down,
        }
    }
}

/// A pattern with a better-than-chance bias, for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternObservation {
    pub instrument: String,
    pub timeframe: String,
    pub pattern: Pattern,
    pub predicted: Category,
    pub occurrences: u64,
    pub correct: u64,
}

impl PatternObservation {
    pub fn new(
        instrument: impl Into<String>,
        timeframe: impl Into<String>,
        pattern: Pattern,
        predicted: Category,
        occurrences: u64,
        correct: u64,
    ) -> Result<Self> {
        if correct > occurrences {
            return Err(DiscoveryError::InvalidValue(
                "correct must not exceed occurrences",
            ));
        }
        Ok(Self {
            instrument: instrument.into(),
            timeframe: timeframe.into(),
            pattern,
            predicted,
            occurrences,
            correct,
        })
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.predicted.direction()
    }

    #[inline]
    pub fn wins(&self) -> u64 {
        self.correct
    }

    /// Zero when `correct` exceeds `occurrences`; [`BatchStats::from_strategy`] rejects that case
    #[inline]
    pub fn losses(&self) -> u64 {
        self.occurrences.saturating_sub(self.correct)
    }

    /// `correct / occurrences * 100`, or 0 with no occurrences
    pub fn effectiveness(&self) -> f64 {
        helpers::effectiveness(self.correct, self.occurrences)
    }
}

/// A qualifying observation with its score; the discovery result for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredStrategy {
    pub observation: PatternObservation,
    pub direction: Direction,
    /// Percentage in `(50, 100]`
    pub effectiveness: f64,
    /// Composite score in `[40, 85]`
    pub score: f64,
    /// Estimated payout tier
    pub avg_profit: f64,
    pub trigger_condition: String,
}

impl ScoredStrategy {
    #[inline]
    pub fn pattern(&self) -> &Pattern {
        &self.observation.pattern
    }

    #[inline]
    pub fn occurrences(&self) -> u64 {
        self.observation.occurrences
    }

    #[inline]
    pub fn wins(&self) -> u64 {
        self.observation.wins()
    }

    #[inline]
    pub fn losses(&self) -> u64 {
        self.observation.losses()
    }

    pub fn key(&self) -> StrategyKey {
        StrategyKey::new(
            self.observation.instrument.clone(),
            self.observation.timeframe.clone(),
            self.observation.pattern.clone(),
            self.direction,
        )
    }
}

// ============================================================
// PERSISTENT RECORDS
// ============================================================

/// Unique key of a persisted strategy
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrategyKey {
    pub instrument: String,
    pub timeframe: String,
    pub pattern: Pattern,
    pub direction: Direction,
}

impl StrategyKey {
    pub fn new(
        instrument: impl Into<String>,
        timeframe: impl Into<String>,
        pattern: Pattern,
        direction: Direction,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe: timeframe.into(),
            pattern,
            direction,
        }
    }
}

impl fmt::Display for StrategyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.instrument, self.timeframe, self.pattern, self.direction
        )
    }
}

/// Counts carried by one run's batch for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub occurrences: u64,
    pub wins: u64,
    pub losses: u64,
}

impl BatchStats {
    pub fn new(occurrences: u64, wins: u64, losses: u64) -> Self {
        Self {
            occurrences,
            wins,
            losses,
        }
    }

    /// Counts of a strategy, rejecting ones that cannot have come from discovery
    pub fn from_strategy(strategy: &ScoredStrategy) -> Result<Self> {
        let key = strategy.key();
        if strategy.wins() > strategy.occurrences() {
            return Err(DiscoveryError::InvalidBatch {
                key: key.to_string(),
                reason: "correct exceeds occurrences",
            });
        }
        if strategy.direction != strategy.observation.direction() {
            return Err(DiscoveryError::InvalidBatch {
                key: key.to_string(),
                reason: "direction does not match predicted category",
            });
        }
        let stats = Self::new(strategy.occurrences(), strategy.wins(), strategy.losses());
        stats.check(&key)?;
        Ok(stats)
    }

    /// `occurrences == wins + losses`
    pub fn check(&self, key: &StrategyKey) -> Result<()> {
        if self.wins.checked_add(self.losses) != Some(self.occurrences) {
            return Err(DiscoveryError::InvalidBatch {
                key: key.to_string(),
                reason: "occurrences != wins + losses",
            });
        }
        Ok(())
    }

    pub fn effectiveness(&self) -> f64 {
        helpers::effectiveness(self.wins, self.occurrences)
    }
}

impl std::ops::Add for BatchStats {
    type Output = BatchStats;

    fn add(self, rhs: BatchStats) -> BatchStats {
        BatchStats {
            occurrences: self.occurrences + rhs.occurrences,
            wins: self.wins + rhs.wins,
            losses: self.losses + rhs.losses,
        }
    }
}

/// All-time merged statistics for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeRecord {
    pub key: StrategyKey,
    pub occurrences: u64,
    pub wins: u64,
    pub losses: u64,
    pub effectiveness: f64,
    pub score: f64,
    pub avg_profit: f64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl CumulativeRecord {
    /// Build from raw totals, deriving effectiveness and score
    pub fn from_totals(
        key: StrategyKey,
        totals: BatchStats,
        scorer: &QualityScorer,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            key,
            occurrences: totals.occurrences,
            wins: totals.wins,
            losses: totals.losses,
            effectiveness: 0.0,
            score: 0.0,
            avg_profit: 0.0,
            created_at,
            last_updated: now,
        };
        record.recompute(scorer);
        record
    }

    #[inline]
    pub fn totals(&self) -> BatchStats {
        BatchStats::new(self.occurrences, self.wins, self.losses)
    }

    /// Additive merge; derived fields are recomputed from the merged totals
    pub fn merged(&self, batch: BatchStats, scorer: &QualityScorer, now: DateTime<Utc>) -> Self {
        Self::from_totals(
            self.key.clone(),
            self.totals() + batch,
            scorer,
            self.created_at,
            now,
        )
    }

    /// Recompute effectiveness, score and payout tier from the counts. Idempotent.
    pub fn recompute(&mut self, scorer: &QualityScorer) {
        self.effectiveness = helpers::effectiveness(self.wins, self.occurrences);
        self.score = scorer.score(
            self.effectiveness,
            self.occurrences,
            &self.key.instrument,
            &self.key.timeframe,
        );
        self.avg_profit = helpers::payout_tier(self.effectiveness);
    }

    /// Whether the count and effectiveness invariants hold
    pub fn is_consistent(&self) -> bool {
        self.wins.checked_add(self.losses) == Some(self.occurrences)
            && (self.effectiveness - helpers::effectiveness(self.wins, self.occurrences)).abs()
                < helpers::EFFECTIVENESS_TOLERANCE
    }
}

/// Latest-run snapshot for one key, overwritten each run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRecord {
    pub key: StrategyKey,
    pub occurrences: u64,
    pub wins: u64,
    pub losses: u64,
    pub effectiveness: f64,
    pub score: f64,
    pub avg_profit: f64,
    pub trigger_condition: String,
    pub analyzed_at: DateTime<Utc>,
}

impl ActiveRecord {
    /// Snapshot of one batch; derived fields come from the counts, not the caller
    pub fn from_batch(
        key: StrategyKey,
        batch: BatchStats,
        scorer: &QualityScorer,
        now: DateTime<Utc>,
    ) -> Self {
        let effectiveness = batch.effectiveness();
        Self {
            score: scorer.score(effectiveness, batch.occurrences, &key.instrument, &key.timeframe),
            trigger_condition: key.pattern.trigger_condition(),
            occurrences: batch.occurrences,
            wins: batch.wins,
            losses: batch.losses,
            effectiveness,
            avg_profit: helpers::payout_tier(effectiveness),
            analyzed_at: now,
            key,
        }
    }
}

/// One applied batch, kept so the cumulative record can be rebuilt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub run_id: RunId,
    pub stats: BatchStats,
    pub recorded_at: DateTime<Utc>,
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn key() -> StrategyKey {
        StrategyKey::new("GBPJPY", "15m", Pattern::parse("UUU").unwrap(), Direction::Put)
    }

    #[test]
    fn test_tally() {
        let mut tally = OutcomeTally::new(Pattern::parse("U").unwrap());
        tally.record(Category::Up);
        tally.record(Category::Down);
        tally.record(Category::Down);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.count(Category::Down), 2);
    }

    #[test]
    fn test_observation_rejects_correct_over_occurrences() {
        let p = Pattern::parse("UU").unwrap();
        assert!(PatternObservation::new("EURUSD", "1h", p.clone(), Category::Up, 5, 6).is_err());
        let obs = PatternObservation::new("EURUSD", "1h", p, Category::Up, 5, 4).unwrap();
        assert_eq!(obs.losses(), 1);
        assert_eq!(obs.direction(), Direction::Call);
        assert!((obs.effectiveness() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(key().to_string(), "GBPJPY/15m/UUU/PUT");
    }

    #[test]
    fn test_batch_check() {
        assert!(BatchStats::new(10, 7, 3).check(&key()).is_ok());
        assert!(matches!(
            BatchStats::new(10, 7, 2).check(&key()),
            Err(DiscoveryError::InvalidBatch { .. })
        ));
    }

    fn scored(occurrences: u64, correct: u64) -> ScoredStrategy {
        let obs = PatternObservation::new(
            "GBPJPY",
            "15m",
            Pattern::parse("UUU").unwrap(),
            Category::Down,
            occurrences,
            correct,
        )
        .unwrap();
        QualityScorer::default().apply(obs)
    }

    #[test]
    fn test_batch_rejects_correct_over_occurrences() {
        let mut strategy = scored(3, 3);
        strategy.observation.correct = 5;
        assert_eq!(strategy.losses(), 0);
        assert!(matches!(
            BatchStats::from_strategy(&strategy),
            Err(DiscoveryError::InvalidBatch {
                reason: "correct exceeds occurrences",
                ..
            })
        ));
    }

    #[test]
    fn test_batch_rejects_direction_mismatch() {
        let mut strategy = scored(12, 11);
        strategy.direction = Direction::Call;
        assert!(matches!(
            BatchStats::from_strategy(&strategy),
            Err(DiscoveryError::InvalidBatch { .. })
        ));
    }

    #[test]
    fn test_active_from_batch_derives_fields() {
        let scorer = QualityScorer::default();
        let strategy = scored(12, 11);
        let active = ActiveRecord::from_batch(key(), BatchStats::new(12, 11, 1), &scorer, t0());
        assert_eq!(active.effectiveness, strategy.effectiveness);
        assert_eq!(active.score, strategy.score);
        assert_eq!(active.avg_profit, strategy.avg_profit);
        assert_eq!(active.trigger_condition, strategy.trigger_condition);
    }

    #[test]
    fn test_merge_recomputes_derived_fields() {
        let scorer = QualityScorer::default();
        let record =
            CumulativeRecord::from_totals(key(), BatchStats::new(12, 11, 1), &scorer, t0(), t0());
        let merged = record.merged(BatchStats::new(37, 25, 12), &scorer, t0());
        assert_eq!(merged.totals(), BatchStats::new(49, 36, 13));
        assert!((merged.effectiveness - 73.4693877).abs() < 1e-6);
        assert!((merged.score - 61.12).abs() < 1e-9);
        assert_eq!(merged.avg_profit, 75.0);
        assert_eq!(merged.created_at, record.created_at);
        assert!(merged.is_consistent());
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let scorer = QualityScorer::default();
        let mut record =
            CumulativeRecord::from_totals(key(), BatchStats::new(60, 40, 20), &scorer, t0(), t0());
        let once = record.clone();
        record.recompute(&scorer);
        assert_eq!(record, once);
    }

    #[test]
    fn test_inconsistent_record_detected() {
        let scorer = QualityScorer::default();
        let mut record =
            CumulativeRecord::from_totals(key(), BatchStats::new(20, 15, 5), &scorer, t0(), t0());
        record.effectiveness = 99.6;
        assert!(!record.is_consistent());
    }
}
