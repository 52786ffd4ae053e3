//! Shared constants and arithmetic for evaluation and scoring

// ============================================================
// THRESHOLDS
// ============================================================

/// Effectiveness at or below this is no better than a coin flip
pub const CHANCE_LEVEL: f64 = 50.0;

/// Lower bound of the composite score (effectiveness 50%)
pub const SCORE_MIN: f64 = 40.0;
/// Upper bound of the composite score (effectiveness 100%)
pub const SCORE_MAX: f64 = 85.0;
/// Score points per effectiveness point above chance: 45 / 50
pub const SCORE_SLOPE: f64 = 0.9;

/// Effectiveness above this is treated as a likely overfit
pub const OVERFIT_THRESHOLD: f64 = 95.0;
pub const OVERFIT_PENALTY: f64 = 0.8;

pub const LARGE_SAMPLE: u64 = 100;
pub const LARGE_SAMPLE_FACTOR: f64 = 1.10;
pub const MEDIUM_SAMPLE: u64 = 50;
pub const MEDIUM_SAMPLE_FACTOR: f64 = 1.05;
pub const SMALL_SAMPLE: u64 = 20;
pub const SMALL_SAMPLE_FACTOR: f64 = 0.90;

pub const MAJOR_INSTRUMENT_FACTOR: f64 = 1.03;

/// Allowed drift between stored effectiveness and `wins / occurrences * 100`
pub const EFFECTIVENESS_TOLERANCE: f64 = 1e-6;

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// `wins / occurrences * 100`; zero occurrences yields 0
#[inline]
pub fn effectiveness(wins: u64, occurrences: u64) -> f64 {
    if occurrences == 0 {
        return 0.0;
    }
    wins as f64 / occurrences as f64 * 100.0
}

/// Round half away from zero to 2 decimals
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Expected payout percentage tier for a given effectiveness
#[inline]
pub fn payout_tier(effectiveness: f64) -> f64 {
    match effectiveness {
        e if e >= 80.0 => 85.0,
        e if e >= 70.0 => 75.0,
        e if e >= 60.0 => 65.0,
        _ => 55.0,
    }
}
