//! Pattern scanner over a categorical sequence
//!
//! The catalogue is small and fixed: homogeneous runs `D`, `U`, `DD`, `UU`, ... up to
//! `max_pattern_length`, followed by the configured alternating motifs. Searching every substring
//! would explode combinatorially and overfit.
//!
//! Occurrences are counted with a stride-1 sliding window, so overlapping matches all count:
//! `UUUU` contains `UU` three times.

use crate::config::DiscoveryConfig;
use crate::records::OutcomeTally;
use crate::{Category, Pattern, Result};

use super::CategoricalSequence;

/// Scans a sequence for a fixed pattern catalogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternScanner {
    catalogue: Vec<Pattern>,
}

impl PatternScanner {
    /// Scanner over an explicit catalogue; duplicates are dropped, order is kept
    pub fn new(patterns: impl IntoIterator<Item = Pattern>) -> Self {
        let mut catalogue: Vec<Pattern> = Vec::new();
        for p in patterns {
            if !catalogue.contains(&p) {
                catalogue.push(p);
            }
        }
        Self { catalogue }
    }

    /// Runs of length `1..=max_pattern_length` for each category, then the fitting motifs
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self> {
        let mut patterns = Vec::with_capacity(config.max_pattern_length * 2 + config.mixed_motifs.len());
        for len in 1..=config.max_pattern_length {
            for category in [Category::Down, Category::Up] {
                patterns.push(Pattern::run(category, len)?);
            }
        }
        patterns.extend(config.motifs()?);
        Ok(Self::new(patterns))
    }

    #[inline]
    pub fn patterns(&self) -> &[Pattern] {
        &self.catalogue
    }

    /// Tally the next-candle outcome after every occurrence of `pattern`.
    ///
    /// A sequence shorter than `pattern.len() + 1` yields an empty tally.
    pub fn tally(sequence: &CategoricalSequence, pattern: &Pattern) -> OutcomeTally {
        let mut tally = OutcomeTally::new(pattern.clone());
        let seq = sequence.as_slice();
        let p = pattern.categories();

        if seq.len() <= p.len() {
            return tally;
        }

        // windows(p+1): the match plus the candle that follows it
        for window in seq.windows(p.len() + 1) {
            if &window[..p.len()] == p {
                tally.record(window[p.len()]);
            }
        }
        tally
    }

    /// Tallies for every catalogue pattern with at least one occurrence
    pub fn scan(&self, sequence: &CategoricalSequence) -> Vec<OutcomeTally> {
        self.catalogue
            .iter()
            .map(|pattern| Self::tally(sequence, pattern))
            .inspect(|tally| {
                tracing::debug!(
                    pattern = %tally.pattern,
                    up = tally.up,
                    down = tally.down,
                    "pattern tally"
                )
            })
            .filter(|tally| tally.total() > 0)
            .collect()
    }
}
