//! Candle classification into `Up`/`Down`

use std::fmt;

use crate::{Category, OHLCExt, OHLC};

/// `close >= open` is `Up`, anything else `Down`. Uses only open and close.
#[inline]
pub fn classify<T: OHLC + ?Sized>(candle: &T) -> Category {
    if candle.is_up() {
        Category::Up
    } else {
        Category::Down
    }
}

/// Classify a batch, preserving length and order.
///
/// Malformed candles are still classified; each one is reported with a warning.
pub fn classify_series<T: OHLC>(candles: &[T]) -> CategoricalSequence {
    let categories = candles
        .iter()
        .enumerate()
        .map(|(index, candle)| {
            if let Some(reason) = candle.anomaly() {
                tracing::warn!(index, reason, "malformed candle, classifying from open/close");
            }
            classify(candle)
        })
        .collect();
    CategoricalSequence(categories)
}

/// Ordered categories, one per candle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoricalSequence(Vec<Category>);

impl CategoricalSequence {
    #[inline]
    pub fn as_slice(&self) -> &[Category] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Category>> for CategoricalSequence {
    fn from(categories: Vec<Category>) -> Self {
        Self(categories)
    }
}

impl FromIterator<Category> for CategoricalSequence {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CategoricalSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.0 {
            write!(f, "{}", c.symbol())?;
        }
        Ok(())
    }
}
