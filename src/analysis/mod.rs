//! Analysis stages, leaf-first
//!
//! - **classifier**: candle → `Up`/`Down`
//! - **scanner**: categorical sequence → outcome tallies per catalogue pattern
//! - **evaluator**: tally → qualifying observation (sample size and better-than-chance gates)
//! - **scoring**: observation → bounded composite score
//!
//! Every stage is pure and in-memory; only the accumulator touches storage.

pub mod helpers;

pub mod classifier;
pub mod evaluator;
pub mod scanner;
pub mod scoring;

pub use classifier::{classify, classify_series, CategoricalSequence};
pub use evaluator::EffectivenessEvaluator;
pub use scanner::PatternScanner;
pub use scoring::{base_score, QualityScorer};
