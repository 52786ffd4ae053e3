//! Discovery configuration
//!
//! All tunables are injected through [`DiscoveryConfig`]; nothing lives in process-wide state.
//! Configurations are usually loaded from JSON, with every field optional:
//!
//! ```rust
//! use seqbias::config::DiscoveryConfig;
//!
//! let cfg = DiscoveryConfig::from_json_str(r#"{ "min_occurrences": 15, "max_pattern_length": 4 }"#)
//!     .unwrap();
//! assert_eq!(cfg.min_occurrences, 15);
//! assert!(cfg.major_instruments.contains("EURUSD"));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DiscoveryError, Pattern, Result};

// ============================================================
// DEFAULTS
// ============================================================

pub const DEFAULT_MIN_OCCURRENCES: usize = 10;
pub const DEFAULT_MAX_PATTERN_LENGTH: usize = 5;

/// Most liquid pairs; these earn the liquidity bonus
pub const DEFAULT_MAJOR_INSTRUMENTS: [&str; 7] =
    ["EURUSD", "GBPUSD", "USDJPY", "USDCHF", "AUDUSD", "USDCAD", "NZDUSD"];

pub const DEFAULT_TIMEFRAME_BONUSES: [(&str, f64); 3] = [("1h", 1.02), ("4h", 1.05), ("1d", 1.05)];

pub const DEFAULT_MIXED_MOTIFS: [&str; 6] = ["UD", "DU", "UDU", "DUD", "UDUD", "DUDU"];

// Accepted range for reliability multipliers
const MIN_TIMEFRAME_BONUS: f64 = 0.5;
const MAX_TIMEFRAME_BONUS: f64 = 1.5;

// ============================================================
// CONFIG
// ============================================================

/// Recognized options for discovery and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Minimum number of matched occurrences for a pattern to qualify
    pub min_occurrences: usize,
    /// Longest homogeneous run searched; motifs longer than this are skipped
    pub max_pattern_length: usize,
    /// Instruments earning the liquidity bonus
    pub major_instruments: BTreeSet<String>,
    /// Timeframes earning a reliability bonus, with their multiplier
    pub reliable_timeframes: BTreeMap<String, f64>,
    /// Fixed alternating motifs searched in addition to homogeneous runs
    pub mixed_motifs: Vec<String>,
    /// Per-timeframe override of `min_occurrences`
    pub timeframe_min_occurrences: BTreeMap<String, usize>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_occurrences: DEFAULT_MIN_OCCURRENCES,
            max_pattern_length: DEFAULT_MAX_PATTERN_LENGTH,
            major_instruments: DEFAULT_MAJOR_INSTRUMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reliable_timeframes: DEFAULT_TIMEFRAME_BONUSES
                .iter()
                .map(|(tf, f)| (tf.to_string(), *f))
                .collect(),
            mixed_motifs: DEFAULT_MIXED_MOTIFS.iter().map(|s| s.to_string()).collect(),
            timeframe_min_occurrences: BTreeMap::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Parse from a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DiscoveryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DiscoveryError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| DiscoveryError::InvalidConfig(e.to_string()))
    }

    /// Effective minimum sample size for a timeframe
    pub fn min_occurrences_for(&self, timeframe: &str) -> usize {
        self.timeframe_min_occurrences
            .get(timeframe)
            .copied()
            .unwrap_or(self.min_occurrences)
    }

    /// Parsed motifs that fit within `max_pattern_length`
    pub fn motifs(&self) -> Result<Vec<Pattern>> {
        let mut motifs = Vec::with_capacity(self.mixed_motifs.len());
        for raw in &self.mixed_motifs {
            let pattern = Pattern::parse(raw)?;
            if pattern.len() <= self.max_pattern_length {
                motifs.push(pattern);
            }
        }
        Ok(motifs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_occurrences == 0 {
            return Err(DiscoveryError::InvalidConfig(
                "min_occurrences must be > 0".to_string(),
            ));
        }
        if self.max_pattern_length == 0 {
            return Err(DiscoveryError::InvalidConfig(
                "max_pattern_length must be > 0".to_string(),
            ));
        }
        if let Some((tf, _)) = self.timeframe_min_occurrences.iter().find(|(_, n)| **n == 0) {
            return Err(DiscoveryError::InvalidConfig(format!(
                "timeframe_min_occurrences[{tf}] must be > 0"
            )));
        }
        for factor in self.reliable_timeframes.values() {
            if !factor.is_finite() || *factor < MIN_TIMEFRAME_BONUS || *factor > MAX_TIMEFRAME_BONUS
            {
                return Err(DiscoveryError::OutOfRange {
                    field: "reliable_timeframes",
                    value: *factor,
                    min: MIN_TIMEFRAME_BONUS,
                    max: MAX_TIMEFRAME_BONUS,
                });
            }
        }
        self.motifs()?;
        Ok(())
    }
}

// ============================================================
// TESTS
// ============================================================
