//! Effectiveness evaluation: does a pattern carry a tradable bias, and which way?

use std::collections::BTreeMap;

use crate::config::{DiscoveryConfig, DEFAULT_MIN_OCCURRENCES};
use crate::records::{OutcomeTally, PatternObservation};
use crate::Category;

use super::helpers::{self, CHANCE_LEVEL};

/// Applies the sample-size and better-than-chance gates to an outcome tally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivenessEvaluator {
    pub min_occurrences: usize,
    pub timeframe_min_occurrences: BTreeMap<String, usize>,
}

impl Default for EffectivenessEvaluator {
    fn default() -> Self {
        Self {
            min_occurrences: DEFAULT_MIN_OCCURRENCES,
            timeframe_min_occurrences: BTreeMap::new(),
        }
    }
}

impl EffectivenessEvaluator {
    pub fn new(min_occurrences: usize) -> Self {
        Self {
            min_occurrences,
            timeframe_min_occurrences: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self {
            min_occurrences: config.min_occurrences,
            timeframe_min_occurrences: config.timeframe_min_occurrences.clone(),
        }
    }

    #[inline]
    pub fn min_occurrences_for(&self, timeframe: &str) -> usize {
        self.timeframe_min_occurrences
            .get(timeframe)
            .copied()
            .unwrap_or(self.min_occurrences)
    }

    /// Qualifying observation for the better of the two outcomes, or `None`.
    ///
    /// Rejected when the sample is smaller than the minimum or the best outcome is at or
    /// below chance. Ties favour `Up` but are always at chance, hence always rejected.
    pub fn evaluate(
        &self,
        instrument: &str,
        timeframe: &str,
        tally: &OutcomeTally,
    ) -> Option<PatternObservation> {
        let total = tally.total();
        if total < self.min_occurrences_for(timeframe) as u64 {
            return None;
        }

        let predicted = if tally.up >= tally.down {
            Category::Up
        } else {
            Category::Down
        };
        let correct = tally.count(predicted);

        if helpers::effectiveness(correct, total) <= CHANCE_LEVEL {
            return None;
        }

        Some(PatternObservation {
            instrument: instrument.to_string(),
            timeframe: timeframe.to_string(),
            pattern: tally.pattern.clone(),
            predicted,
            occurrences: total,
            correct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, Pattern};

    fn tally(up: u64, down: u64) -> OutcomeTally {
        OutcomeTally {
            pattern: Pattern::parse("UUU").unwrap(),
            up,
            down,
        }
    }

    #[test]
    fn test_below_min_occurrences_rejected() {
        let eval = EffectivenessEvaluator::new(10);
        assert!(eval.evaluate("EURUSD", "1h", &tally(0, 9)).is_none());
        assert!(eval.evaluate("EURUSD", "1h", &tally(0, 10)).is_some());
    }

    #[test]
    fn test_chance_rejected() {
        let eval = EffectivenessEvaluator::new(2);
        assert!(eval.evaluate("EURUSD", "1h", &tally(5, 5)).is_none());
        assert!(eval.evaluate("EURUSD", "1h", &tally(6, 5)).is_some());
    }

    #[test]
    fn test_picks_better_outcome() {
        let eval = EffectivenessEvaluator::new(2);
        let obs = eval.evaluate("EURUSD", "1h", &tally(3, 9)).unwrap();
        assert_eq!(obs.predicted, Category::Down);
        assert_eq!(obs.direction(), Direction::Put);
        assert_eq!(obs.occurrences, 12);
        assert_eq!(obs.correct, 9);
        assert!((obs.effectiveness() - 75.0).abs() < 1e-9);

        let obs = eval.evaluate("EURUSD", "1h", &tally(8, 2)).unwrap();
        assert_eq!(obs.direction(), Direction::Call);
        assert_eq!(obs.correct, 8);
    }

    #[test]
    fn test_correct_matches_rounded_percentage() {
        let eval = EffectivenessEvaluator::new(1);
        let obs = eval.evaluate("EURUSD", "1h", &tally(11, 1)).unwrap();
        let rounded = (obs.occurrences as f64 * obs.effectiveness() / 100.0).round() as u64;
        assert_eq!(obs.correct, rounded);
    }

    #[test]
    fn test_timeframe_override() {
        let mut eval = EffectivenessEvaluator::new(10);
        eval.timeframe_min_occurrences.insert("1d".into(), 3);
        assert!(eval.evaluate("EURUSD", "1d", &tally(0, 4)).is_some());
        assert!(eval.evaluate("EURUSD", "1h", &tally(0, 4)).is_none());
    }
}
