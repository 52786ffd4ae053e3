//! # seqbias
//!
//! Antecedent candle-sequence pattern discovery with a durable, cumulative statistical record
//! per `(instrument, timeframe, pattern, direction)`.
//!
//! A candle batch is reduced to a sequence of `U`/`D` categories, a small fixed catalogue of
//! antecedent patterns is searched for a bias in the candle that follows, qualifying patterns are
//! scored, and each run's observations are merged into a persistent record.
//!
//! ## Quick Start
//!
//! ```rust
//! use seqbias::prelude::*;
//! use chrono::{TimeZone, Utc};
//!
//! let engine = EngineBuilder::new()
//!     .min_occurrences(2)
//!     .build()
//!     .unwrap();
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let candles: Vec<Candle> = (0..30)
//!     .map(|i| {
//!         let o = 1.10 + i as f64 * 0.001;
//!         let c = if i % 3 == 2 { o - 0.002 } else { o + 0.002 };
//!         Candle::new(t0 + chrono::Duration::hours(i), o, o.max(c) + 0.001, o.min(c) - 0.001, c)
//!     })
//!     .collect();
//!
//! let strategies = engine.discover("EURUSD", "1h", &candles);
//! for s in &strategies {
//!     println!("{} -> {}: {:.1}% (score {})", s.pattern(), s.direction, s.effectiveness, s.score);
//! }
//! ```

pub mod accumulator;
pub mod analysis;
pub mod config;
pub mod orchestrator;
pub mod records;
pub mod store;

pub mod prelude {
    pub use crate::{
        // Accumulation
        accumulator::{Accumulator, MergeOutcome},
        // Analysis stages
        analysis::{
            base_score, classify, classify_series, CategoricalSequence,
            EffectivenessEvaluator, PatternScanner, QualityScorer,
        },
        // Configuration
        config::DiscoveryConfig,
        // Parallel
        discover_parallel,
        // Orchestration
        orchestrator::{RunOrchestrator, RunReport},
        // Records
        records::{
            ActiveRecord, BatchStats, CumulativeRecord, HistoryEntry, OutcomeTally,
            PatternObservation, ScoredStrategy, StrategyKey,
        },
        // Storage
        store::{MemoryStore, StoreError, StoreTxn, StrategyStore},
        // Core types
        Candle,
        Category,
        DiscoveryEngine,
        // Errors
        DiscoveryError,
        DiscoveryResult,
        Direction,
        EngineBuilder,
        OHLCExt,
        Pattern,
        Result,
        RunId,
        OHLC,
    };
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::store::StoreError;

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors surfaced by discovery, configuration and accumulation.
///
/// Insufficient data and below-chance patterns are not errors: they simply produce no output.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid pattern {0:?}: expected a non-empty string of 'U' and 'D'")]
    InvalidPattern(String),

    #[error("Invalid batch for {key}: {reason}")]
    InvalidBatch { key: String, reason: &'static str },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DiscoveryError {
    /// Whether the orchestrator may retry the failed operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DiscoveryError::Store(e) if e.is_retryable())
    }
}

// ============================================================
// CATEGORIES AND DIRECTIONS
// ============================================================

/// Binary candle category
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum Category {
    Up,
    Down,
}

impl Category {
    /// Single-character symbol used in pattern strings
    #[inline]
    pub const fn symbol(self) -> char {
        match self {
            Category::Up => 'U',
            Category::Down => 'D',
        }
    }

    #[inline]
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            'U' => Some(Category::Up),
            'D' => Some(Category::Down),
            _ => None,
        }
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Category::Up => Category::Down,
            Category::Down => Category::Up,
        }
    }

    /// Trading direction implied by predicting this category next
    #[inline]
    pub fn direction(self) -> Direction {
        Direction::from(self)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Trading direction of a strategy.
///
/// Fixed convention: a predicted `Up` candle is a `CALL`, a predicted `Down` candle a `PUT`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Call,
    Put,
}

impl Direction {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Call => "CALL",
            Direction::Put => "PUT",
        }
    }

    /// The candle category this direction bets on
    #[inline]
    pub fn predicted_category(self) -> Category {
        match self {
            Direction::Call => Category::Up,
            Direction::Put => Category::Down,
        }
    }
}

impl From<Category> for Direction {
    fn from(category: Category) -> Self {
        match category {
            Category::Up => Direction::Call,
            Category::Down => Direction::Put,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Antecedent pattern: a non-empty run of categories, written as e.g. `"UUD"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pattern(Vec<Category>);

impl Pattern {
    /// Parse a pattern string made of `U` and `D`
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(DiscoveryError::InvalidPattern(s.to_string()));
        }
        s.chars()
            .map(Category::from_symbol)
            .collect::<Option<Vec<_>>>()
            .map(Self)
            .ok_or_else(|| DiscoveryError::InvalidPattern(s.to_string()))
    }

    /// Homogeneous run of `len` candles of one category
    pub fn run(category: Category, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(DiscoveryError::InvalidValue("Pattern length must be > 0"));
        }
        Ok(Self(vec![category; len]))
    }

    pub fn from_categories(categories: Vec<Category>) -> Result<Self> {
        if categories.is_empty() {
            return Err(DiscoveryError::InvalidValue("Pattern must not be empty"));
        }
        Ok(Self(categories))
    }

    #[inline]
    pub fn categories(&self) -> &[Category] {
        &self.0
    }

    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Human-readable trigger description stored alongside each strategy
    pub fn trigger_condition(&self) -> String {
        format!("After {} consecutive {} candles", self.len(), self)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.0 {
            write!(f, "{}", c.symbol())?;
        }
        Ok(())
    }
}

impl FromStr for Pattern {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        Pattern::parse(s)
    }
}

impl serde::Serialize for Pattern {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Pattern {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(d)?;
        Pattern::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// Idempotency key for one orchestrated run.
///
/// A batch is applied to a given key at most once per `RunId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(String);

impl RunId {
    /// Fresh random run identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Use an identifier supplied by the scheduler (e.g. a job id or candle-range hash)
    pub fn from_external(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DiscoveryError::InvalidValue("RunId must not be empty"));
        }
        Ok(Self(id))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for RunId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for RunId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(d)?;
        RunId::from_external(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLC TRAITS
// ============================================================

/// Core OHLC data trait
pub trait OHLC {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        None
    }
}

impl<T: OHLC + ?Sized> OHLC for &T {
    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        (**self).timestamp()
    }
}

/// Extension trait with computed properties for OHLC data
pub trait OHLCExt: OHLC {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// `close >= open`; a flat candle counts as up
    #[inline]
    fn is_up(&self) -> bool {
        self.close() >= self.open()
    }

    /// Describes the first consistency problem found, if any.
    ///
    /// Upstream feeds are occasionally noisy, so this is advisory: callers warn and carry on.
    fn anomaly(&self) -> Option<&'static str> {
        let (o, h, l, c) = (self.open(), self.high(), self.low(), self.close());
        if o.is_nan() || h.is_nan() || l.is_nan() || c.is_nan() {
            return Some("NaN in OHLC");
        }
        if o.is_infinite() || h.is_infinite() || l.is_infinite() || c.is_infinite() {
            return Some("Infinite value in OHLC");
        }
        if h < l {
            return Some("high < low");
        }
        if h < o.max(c) {
            return Some("high below body");
        }
        if l > o.min(c) {
            return Some("low above body");
        }
        None
    }
}

impl<T: OHLC + ?Sized> OHLCExt for T {}

/// Plain candle as delivered by a collector
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }
}

impl OHLC for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.timestamp)
    }
}

// ============================================================
// DISCOVERY ENGINE
// ============================================================

use analysis::{
    classify_series, CategoricalSequence, EffectivenessEvaluator, PatternScanner, QualityScorer,
};
use config::DiscoveryConfig;
use records::{OutcomeTally, ScoredStrategy};

/// Runs classify → scan → evaluate → score over one candle batch
#[derive(Debug, Clone)]
pub struct DiscoveryEngine {
    scanner: PatternScanner,
    evaluator: EffectivenessEvaluator,
    scorer: QualityScorer,
}

impl DiscoveryEngine {
    pub fn new(
        scanner: PatternScanner,
        evaluator: EffectivenessEvaluator,
        scorer: QualityScorer,
    ) -> Self {
        Self {
            scanner,
            evaluator,
            scorer,
        }
    }

    /// Build an engine straight from a validated configuration
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scanner: PatternScanner::from_config(config)?,
            evaluator: EffectivenessEvaluator::from_config(config),
            scorer: QualityScorer::from_config(config),
        })
    }

    #[inline]
    pub fn scanner(&self) -> &PatternScanner {
        &self.scanner
    }

    #[inline]
    pub fn evaluator(&self) -> &EffectivenessEvaluator {
        &self.evaluator
    }

    #[inline]
    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    /// Categorical sequence for a batch, same length and order as the input
    #[inline]
    pub fn classify<T: OHLC>(&self, candles: &[T]) -> CategoricalSequence {
        classify_series(candles)
    }

    /// Outcome tallies for every catalogue pattern that occurred
    #[inline]
    pub fn scan(&self, sequence: &CategoricalSequence) -> Vec<OutcomeTally> {
        self.scanner.scan(sequence)
    }

    /// Batches shorter than this cannot carry a qualifying run of the longest catalogue pattern
    pub fn min_batch_len(&self, timeframe: &str) -> usize {
        let longest = self.scanner.patterns().iter().map(Pattern::len).max().unwrap_or(0);
        self.evaluator.min_occurrences_for(timeframe) + longest
    }

    /// Qualifying, scored strategies for one `(instrument, timeframe)` batch, best score first.
    ///
    /// An empty result is the normal outcome for short or unbiased batches.
    pub fn discover<T: OHLC>(
        &self,
        instrument: &str,
        timeframe: &str,
        candles: &[T],
    ) -> Vec<ScoredStrategy> {
        let min_len = self.min_batch_len(timeframe);
        if candles.len() < min_len {
            tracing::warn!(
                instrument,
                timeframe,
                candles = candles.len(),
                min_len,
                "short candle batch, long patterns cannot qualify"
            );
        }

        let sequence = self.classify(candles);
        let mut strategies: Vec<ScoredStrategy> = self
            .scan(&sequence)
            .iter()
            .filter_map(|tally| self.evaluator.evaluate(instrument, timeframe, tally))
            .map(|observation| self.scorer.apply(observation))
            .collect();

        strategies.sort_by(|a, b| b.score.total_cmp(&a.score));

        tracing::debug!(
            instrument,
            timeframe,
            candles = candles.len(),
            qualifying = strategies.len(),
            "discovery finished"
        );
        strategies
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating DiscoveryEngine instances
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: DiscoveryConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: DiscoveryConfig::default(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DiscoveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Minimum sample size for a pattern to qualify
    pub fn min_occurrences(mut self, n: usize) -> Self {
        self.config.min_occurrences = n;
        self
    }

    /// Longest homogeneous run (and motif) searched
    pub fn max_pattern_length(mut self, n: usize) -> Self {
        self.config.max_pattern_length = n;
        self
    }

    /// Add an instrument to the major (liquidity bonus) set
    pub fn major_instrument(mut self, instrument: impl Into<String>) -> Self {
        self.config.major_instruments.insert(instrument.into());
        self
    }

    /// Set the reliability multiplier for a timeframe
    pub fn timeframe_bonus(mut self, timeframe: impl Into<String>, factor: f64) -> Self {
        self.config.reliable_timeframes.insert(timeframe.into(), factor);
        self
    }

    /// Override `min_occurrences` for one timeframe
    pub fn timeframe_min_occurrences(mut self, timeframe: impl Into<String>, n: usize) -> Self {
        self.config.timeframe_min_occurrences.insert(timeframe.into(), n);
        self
    }

    /// Replace the alternating-motif catalogue
    pub fn motifs<I, S>(mut self, motifs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.mixed_motifs = motifs.into_iter().map(Into::into).collect();
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<DiscoveryEngine> {
        DiscoveryEngine::from_config(&self.config)
    }
}

// ============================================================
// PARALLEL DISCOVERY
// ============================================================

use rayon::prelude::*;

/// Strategies found for one `(instrument, timeframe)` batch
#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    pub instrument: String,
    pub timeframe: String,
    pub strategies: Vec<ScoredStrategy>,
}

/// Parallel discovery over independent `(instrument, timeframe, candles)` batches
pub fn discover_parallel<'a, T, I>(engine: &DiscoveryEngine, batches: I) -> Vec<DiscoveryResult>
where
    T: OHLC + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a str, &'a [T])>,
{
    batches
        .into_par_iter()
        .map(|(instrument, timeframe, candles)| DiscoveryResult {
            instrument: instrument.to_string(),
            timeframe: timeframe.to_string(),
            strategies: engine.discover(instrument, timeframe, candles),
        })
        .collect()
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Test OHLC bar
    #[derive(Debug, Clone)]
    struct Bar {
        o: f64,
        h: f64,
        l: f64,
        c: f64,
    }

    impl Bar {
        fn new(o: f64, h: f64, l: f64, c: f64) -> Self {
            Self { o, h, l, c }
        }
    }

    impl OHLC for Bar {
        fn open(&self) -> f64 {
            self.o
        }

        fn high(&self) -> f64 {
            self.h
        }

        fn low(&self) -> f64 {
            self.l
        }

        fn close(&self) -> f64 {
            self.c
        }
    }

    fn bars_from(symbols: &str) -> Vec<Bar> {
        symbols
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|s| match s {
                'U' => Bar::new(1.0, 1.2, 0.9, 1.1),
                _ => Bar::new(1.1, 1.2, 0.9, 1.0),
            })
            .collect()
    }

    #[test]
    fn test_pattern_parse() {
        assert_eq!(Pattern::parse("UUD").unwrap().to_string(), "UUD");
        assert_eq!(Pattern::parse("D").unwrap().len(), 1);
        assert!(Pattern::parse("").is_err());
        assert!(Pattern::parse("UXD").is_err());
        assert!(Pattern::parse("uu").is_err());
        assert!(Pattern::run(Category::Up, 0).is_err());
        assert_eq!(Pattern::run(Category::Down, 3).unwrap().to_string(), "DDD");
    }

    #[test]
    fn test_pattern_serde() {
        let p: Pattern = serde_json::from_str("\"UDU\"").unwrap();
        assert_eq!(p, Pattern::parse("UDU").unwrap());
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"UDU\"");
        assert!(serde_json::from_str::<Pattern>("\"UXU\"").is_err());
    }

    #[test]
    fn test_trigger_condition() {
        let p = Pattern::parse("DDD").unwrap();
        assert_eq!(p.trigger_condition(), "After 3 consecutive DDD candles");
    }

    #[test]
    fn test_direction_mapping() {
        assert_eq!(Direction::from(Category::Up), Direction::Call);
        assert_eq!(Direction::from(Category::Down), Direction::Put);
        assert_eq!(Direction::Put.predicted_category(), Category::Down);
        assert_eq!(serde_json::to_string(&Direction::Call).unwrap(), "\"CALL\"");
    }

    #[test]
    fn test_run_id() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
        assert!(RunId::from_external("  ").is_err());
        assert_eq!(RunId::from_external("job-7").unwrap().as_str(), "job-7");
    }

    #[test]
    fn test_ohlc_ext() {
        let bar = Bar::new(100.0, 110.0, 90.0, 105.0);
        assert_eq!(bar.body(), 5.0);
        assert_eq!(bar.range(), 20.0);
        assert!(bar.is_up());
        assert!(bar.anomaly().is_none());
        assert!(Bar::new(1.0, 1.0, 1.0, 1.0).is_up());
    }

    #[test]
    fn test_anomalies() {
        assert_eq!(Bar::new(1.0, 0.5, 0.9, 1.1).anomaly(), Some("high < low"));
        assert_eq!(Bar::new(1.0, 1.05, 0.9, 1.1).anomaly(), Some("high below body"));
        assert_eq!(Bar::new(1.0, 1.2, 1.01, 1.1).anomaly(), Some("low above body"));
        assert_eq!(Bar::new(f64::NAN, 1.2, 0.9, 1.1).anomaly(), Some("NaN in OHLC"));
        assert_eq!(
            Bar::new(1.0, f64::INFINITY, 0.9, 1.1).anomaly(),
            Some("Infinite value in OHLC")
        );
    }

    #[test]
    fn test_candle_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let candle = Candle::new(ts, 1.0, 1.1, 0.9, 1.05);
        assert_eq!(OHLC::timestamp(&candle), Some(ts));
        assert!(Bar::new(1.0, 1.1, 0.9, 1.0).timestamp().is_none());
    }

    #[test]
    fn test_engine_builder() {
        assert!(EngineBuilder::new().build().is_ok());
        assert!(EngineBuilder::new().min_occurrences(0).build().is_err());
        assert!(EngineBuilder::new().max_pattern_length(0).build().is_err());
        assert!(EngineBuilder::new().motifs(["UXU"]).build().is_err());
    }

    #[test]
    fn test_min_batch_len() {
        let engine = EngineBuilder::new()
            .min_occurrences(10)
            .timeframe_min_occurrences("1d", 3)
            .build()
            .unwrap();
        assert_eq!(engine.min_batch_len("1h"), 15);
        assert_eq!(engine.min_batch_len("1d"), 8);

        let short = EngineBuilder::new().max_pattern_length(2).motifs(["UD"]).build().unwrap();
        assert_eq!(short.min_batch_len("1h"), 12);
    }

    #[test]
    fn test_empty_discover() {
        let engine = EngineBuilder::new().build().unwrap();
        let bars: Vec<Bar> = vec![];
        assert!(engine.discover("EURUSD", "1h", &bars).is_empty());
    }

    #[test]
    fn test_discover_sorted_by_score() {
        let engine = EngineBuilder::new().min_occurrences(2).build().unwrap();
        let bars = bars_from("UUUDUUUDDDUUDDDDUUUD UUUDUDUDDUUD");
        let strategies = engine.discover("EURUSD", "1h", &bars);
        assert!(!strategies.is_empty());
        for pair in strategies.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_discover_respects_min_occurrences() {
        let bars = bars_from("UUUDUUUDDDUUDDDDUUUD");
        let strict = EngineBuilder::new().min_occurrences(50).build().unwrap();
        assert!(strict.discover("EURUSD", "1h", &bars).is_empty());
    }

    #[test]
    fn test_timeframe_override() {
        let bars = bars_from("UUUDUUUDDDUUDDDDUUUD");
        let engine = EngineBuilder::new()
            .min_occurrences(2)
            .timeframe_min_occurrences("1d", 50)
            .build()
            .unwrap();
        assert!(!engine.discover("EURUSD", "1h", &bars).is_empty());
        assert!(engine.discover("EURUSD", "1d", &bars).is_empty());
    }

    #[test]
    fn test_parallel_discover() {
        let engine = EngineBuilder::new().min_occurrences(2).build().unwrap();

        let bars1 = bars_from("UUUDUUUDDDUUDDDDUUUD");
        let bars2 = bars_from("DDDUDDDUUUDDUUUUDDDU");

        let batches: Vec<(&str, &str, &[Bar])> =
            vec![("EURUSD", "1h", bars1.as_slice()), ("GBPUSD", "4h", bars2.as_slice())];

        let results = discover_parallel(&engine, batches);
        assert_eq!(results.len(), 2);
        for r in &results {
            assert!(!r.strategies.is_empty());
            assert!(r
                .strategies
                .iter()
                .all(|s| s.observation.instrument == r.instrument));
        }
    }

    #[test]
    fn test_retryable_classification() {
        let err = DiscoveryError::from(StoreError::Unavailable("timeout".into()));
        assert!(err.is_retryable());
        let err = DiscoveryError::from(StoreError::Corrupt {
            key: "k".into(),
            reason: "bad".into(),
        });
        assert!(!err.is_retryable());
        assert!(!DiscoveryError::InvalidConfig("x".into()).is_retryable());
    }
}
