//! Volatility indicators attached to every candle before scanning
//!
//! ATR follows the TA-Lib convention: the first true range needs a previous close, the
//! seed is the mean of the first `period` true ranges and sits at index `period`, and
//! every later value uses Wilder smoothing `(prev * (period - 1) + tr) / period`.

use crate::{OHLCVExt, OHLCV};

/// Default ATR lookback
pub const ATR_PERIOD: usize = 14;

/// True range: max(high - low, |high - prev_close|, |low - prev_close|)
#[inline]
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    let hl = high - low;
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Average True Range (Wilder). `None` for the first `period` bars.
pub fn atr<T: OHLCV>(bars: &[T], period: usize) -> Vec<Option<f64>> {
    let len = bars.len();
    let mut result = vec![None; len];

    if period == 0 || len <= period {
        return result;
    }

    let tr = |i: usize| true_range(bars[i].high(), bars[i].low(), bars[i - 1].close());

    let seed = (1..=period).map(tr).sum::<f64>() / period as f64;
    result[period] = Some(seed);

    let mut prev = seed;
    for (i, slot) in result.iter_mut().enumerate().skip(period + 1) {
        prev = (prev * (period - 1) as f64 + tr(i)) / period as f64;
        *slot = Some(prev);
    }

    result
}

/// Mean candle size (high - low) over the whole series; 0.0 when empty.
///
/// One global scalar, not a rolling value: every depth comparison in a scan uses it.
pub fn avg_candle_size<T: OHLCV>(bars: &[T]) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    bars.iter().map(|b| OHLCVExt::range(b)).sum::<f64>() / bars.len() as f64
}
