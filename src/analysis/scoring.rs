//! Quality scoring
//!
//! A bare effectiveness percentage rewards small, noisy samples. The score starts from a linear
//! map of effectiveness (50% → 40, 100% → 85) and applies small multiplicative adjustments:
//!
//! 1. overfit penalty: effectiveness above 95% → ×0.8
//! 2. sample size: ≥100 → ×1.10, ≥50 → ×1.05, <20 → ×0.90
//! 3. major instrument → ×1.03
//! 4. timeframe reliability → configured multiplier (`1h` ×1.02, `4h`/`1d` ×1.05 by default)
//!
//! The result is clamped to `[40, 85]` and rounded to 2 decimals. Scoring is pure: it runs at
//! discovery time and again on every merge, and must agree with itself.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::DiscoveryConfig;
use crate::records::{PatternObservation, ScoredStrategy};

use super::helpers::{
    self, CHANCE_LEVEL, LARGE_SAMPLE, LARGE_SAMPLE_FACTOR, MAJOR_INSTRUMENT_FACTOR, MEDIUM_SAMPLE,
    MEDIUM_SAMPLE_FACTOR, OVERFIT_PENALTY, OVERFIT_THRESHOLD, SCORE_MAX, SCORE_MIN, SCORE_SLOPE,
    SMALL_SAMPLE, SMALL_SAMPLE_FACTOR,
};

/// Linear base score before any adjustment
#[inline]
pub fn base_score(effectiveness: f64) -> f64 {
    SCORE_MIN + (effectiveness - CHANCE_LEVEL) * SCORE_SLOPE
}

#[inline]
fn sample_factor(occurrences: u64) -> f64 {
    if occurrences >= LARGE_SAMPLE {
        LARGE_SAMPLE_FACTOR
    } else if occurrences >= MEDIUM_SAMPLE {
        MEDIUM_SAMPLE_FACTOR
    } else if occurrences < SMALL_SAMPLE {
        SMALL_SAMPLE_FACTOR
    } else {
        1.0
    }
}

/// Converts effectiveness and supporting evidence into a comparable score
#[derive(Debug, Clone, PartialEq)]
pub struct QualityScorer {
    major_instruments: BTreeSet<String>,
    timeframe_bonuses: BTreeMap<String, f64>,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::from_config(&DiscoveryConfig::default())
    }
}

impl QualityScorer {
    pub fn new(major_instruments: BTreeSet<String>, timeframe_bonuses: BTreeMap<String, f64>) -> Self {
        Self {
            major_instruments,
            timeframe_bonuses,
        }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(
            config.major_instruments.clone(),
            config.reliable_timeframes.clone(),
        )
    }

    #[inline]
    pub fn is_major(&self, instrument: &str) -> bool {
        self.major_instruments.contains(instrument)
    }

    #[inline]
    pub fn timeframe_factor(&self, timeframe: &str) -> f64 {
        self.timeframe_bonuses.get(timeframe).copied().unwrap_or(1.0)
    }

    /// Score in `[40, 85]`, rounded to 2 decimals
    pub fn score(&self, effectiveness: f64, occurrences: u64, instrument: &str, timeframe: &str) -> f64 {
        let mut score = base_score(effectiveness);

        if effectiveness > OVERFIT_THRESHOLD {
            tracing::warn!(
                effectiveness,
                occurrences,
                instrument,
                timeframe,
                "suspiciously high effectiveness, applying overfit penalty"
            );
            score *= OVERFIT_PENALTY;
        }

        score *= sample_factor(occurrences);

        if self.is_major(instrument) {
            score *= MAJOR_INSTRUMENT_FACTOR;
        }

        score *= self.timeframe_factor(timeframe);

        helpers::round2(score.clamp(SCORE_MIN, SCORE_MAX))
    }

    /// Attach score, direction, payout tier and trigger text to an observation
    pub fn apply(&self, observation: PatternObservation) -> ScoredStrategy {
        let effectiveness = observation.effectiveness();
        let score = self.score(
            effectiveness,
            observation.occurrences,
            &observation.instrument,
            &observation.timeframe,
        );
        ScoredStrategy {
            direction: observation.direction(),
            effectiveness,
            score,
            avg_profit: helpers::payout_tier(effectiveness),
            trigger_condition: observation.pattern.trigger_condition(),
            observation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Direction, Pattern};

    #[test]
    fn test_base_score_endpoints() {
        assert!((base_score(50.0) - 40.0).abs() < 1e-9);
        assert!((base_score(100.0) - 85.0).abs() < 1e-9);
    }

    #[test]
    fn test_plain_score() {
        let scorer = QualityScorer::default();
        // 75% -> 62.5, no adjustments at 30 occurrences on a minor pair and timeframe
        assert_eq!(scorer.score(75.0, 30, "GBPJPY", "15m"), 62.5);
    }

    #[test]
    fn test_sample_size_factors() {
        let scorer = QualityScorer::default();
        assert_eq!(scorer.score(75.0, 100, "GBPJPY", "15m"), 68.75);
        assert_eq!(scorer.score(75.0, 50, "GBPJPY", "15m"), 65.63);
        assert_eq!(scorer.score(75.0, 19, "GBPJPY", "15m"), 56.25);
        assert_eq!(scorer.score(75.0, 20, "GBPJPY", "15m"), 62.5);
    }

    #[test]
    fn test_instrument_and_timeframe_bonus() {
        let scorer = QualityScorer::default();
        assert_eq!(scorer.score(75.0, 30, "EURUSD", "15m"), 64.38);
        assert_eq!(scorer.score(75.0, 30, "GBPJPY", "1h"), 63.75);
        assert_eq!(scorer.score(75.0, 30, "GBPJPY", "4h"), 65.63);
        assert_eq!(scorer.score(75.0, 30, "GBPJPY", "1d"), 65.63);
    }

    #[test]
    fn test_overfit_penalty() {
        let scorer = QualityScorer::default();
        let at_95 = scorer.score(95.0, 30, "GBPJPY", "15m");
        let at_96 = scorer.score(96.0, 30, "GBPJPY", "15m");
        assert_eq!(at_95, 80.5);
        assert!(at_96 < at_95);
    }

    #[test]
    fn test_clamped() {
        let scorer = QualityScorer::default();
        assert_eq!(scorer.score(50.5, 5, "GBPJPY", "15m"), 40.0);
        assert_eq!(scorer.score(95.0, 500, "EURUSD", "1d"), 85.0);
    }

    #[test]
    fn test_apply() {
        let scorer = QualityScorer::default();
        let obs = PatternObservation::new(
            "EURUSD",
            "1h",
            Pattern::parse("UUU").unwrap(),
            Category::Down,
            3,
            3,
        )
        .unwrap();
        let strategy = scorer.apply(obs);
        assert_eq!(strategy.direction, Direction::Put);
        assert_eq!(strategy.effectiveness, 100.0);
        // 85 * 0.8 * 0.9 * 1.03 * 1.02
        assert!((strategy.score - 64.3).abs() < 1e-9);
        assert_eq!(strategy.avg_profit, 85.0);
        assert_eq!(strategy.trigger_condition, "After 3 consecutive UUU candles");
    }
}
