//! Window statistics shared across the detection stages

use crate::OHLCV;

/// |left - right| / mean(left, right). Infinite when the mean is not positive.
#[inline]
pub fn rim_asymmetry(left: f64, right: f64) -> f64 {
    let mean = (left + right) / 2.0;
    if mean > 0.0 {
        (left - right).abs() / mean
    } else {
        f64::INFINITY
    }
}

/// Highest high of a window (-inf when empty)
#[inline]
pub fn window_high<T: OHLCV>(bars: &[T]) -> f64 {
    bars.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max)
}

/// Lowest low of a window (+inf when empty)
#[inline]
pub fn window_low<T: OHLCV>(bars: &[T]) -> f64 {
    bars.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min)
}

/// Position and value of the first minimum
#[inline]
pub fn argmin(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
}
