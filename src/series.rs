//! Candle series with derived indicator columns
//!
//! [`CandleSeries`] is the read-only view every scan works on. It is built once from any
//! [`OHLCV`] slice: the input is validated (finite prices, `high >= low`, strictly increasing
//! timestamps), then ATR and the global average candle size are attached to every candle.

use std::ops::{Index, Range};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{indicators, OHLCVExt, PatternError, Result, OHLCV};

/// Raw OHLCV row, as loaded from CSV or produced by the synthetic generator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(rename = "open_time")]
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OHLCV for Bar {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

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

    fn volume(&self) -> f64 {
        self.volume
    }
}

/// A candle with its derived fields. Immutable once the series is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// `None` during the ATR warm-up
    pub atr: Option<f64>,
    pub avg_candle_size: f64,
}

impl OHLCV for Candle {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

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

    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Validated, preprocessed candle series
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
    closes: Vec<f64>,
    avg_candle_size: f64,
}

impl CandleSeries {
    /// Validate `bars` and attach ATR(`atr_period`) and the average candle size
    pub fn from_bars<T: OHLCV>(bars: &[T], atr_period: usize) -> Result<Self> {
        validate_bars(bars)?;

        let atr = indicators::atr(bars, atr_period);
        let avg_candle_size = indicators::avg_candle_size(bars);

        let candles: Vec<Candle> = bars
            .iter()
            .zip(atr)
            .map(|(bar, atr)| Candle {
                timestamp: bar.timestamp(),
                open: bar.open(),
                high: bar.high(),
                low: bar.low(),
                close: bar.close(),
                volume: bar.volume(),
                atr,
                avg_candle_size,
            })
            .collect();
        let closes = candles.iter().map(|c| c.close).collect();

        tracing::debug!(
            candles = candles.len(),
            avg_candle_size,
            atr_period,
            "series prepared"
        );

        Ok(Self {
            candles,
            closes,
            avg_candle_size,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    #[inline]
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    /// Close prices of `range`, for curve fitting
    #[inline]
    pub fn closes(&self, range: Range<usize>) -> &[f64] {
        &self.closes[range]
    }

    #[inline]
    pub fn avg_candle_size(&self) -> f64 {
        self.avg_candle_size
    }

    /// First index whose timestamp is at or after `timestamp` (`len()` if none)
    pub fn position_at_or_after(&self, timestamp: DateTime<Utc>) -> usize {
        self.candles.partition_point(|c| c.timestamp < timestamp)
    }
}

impl Index<usize> for CandleSeries {
    type Output = Candle;

    fn index(&self, index: usize) -> &Candle {
        &self.candles[index]
    }
}

fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        if let Some(reason) = bar.defect() {
            return Err(PatternError::InvalidOHLCV { index: i, reason });
        }
    }

    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, current) = (pair[0].timestamp(), pair[1].timestamp());
        if current == prev {
            return Err(PatternError::DuplicateTimestamp { index: i + 1 });
        }
        if current < prev {
            return Err(PatternError::UnorderedTimestamps { index: i + 1 });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bars(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Bar {
                    timestamp: start + Duration::minutes(i as i64),
                    open: c,
                    high: c + 1.0,
                    low: c - 1.0,
                    close: c,
                    volume: 10.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_derived_fields_attached() {
        let series = CandleSeries::from_bars(&bars(20), 14).unwrap();

        assert_eq!(series.len(), 20);
        assert!((series.avg_candle_size() - 2.0).abs() < 1e-12);
        assert!(series.candles().iter().all(|c| c.avg_candle_size == series.avg_candle_size()));
        assert!(series[13].atr.is_none());
        assert!(series[14].atr.is_some());
        assert_eq!(series.closes(2..4), &[102.0, 103.0]);
    }

    #[test]
    fn test_empty_series() {
        let series = CandleSeries::from_bars::<Bar>(&[], 14).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.avg_candle_size(), 0.0);
    }

    #[test]
    fn test_duplicate_timestamp_rejected() {
        let mut input = bars(10);
        input[6].timestamp = input[5].timestamp;
        assert_eq!(
            CandleSeries::from_bars(&input, 14),
            Err(PatternError::DuplicateTimestamp { index: 6 })
        );
    }

    #[test]
    fn test_non_finite_price_reports_index() {
        let mut input = bars(10);
        input[3].close = f64::INFINITY;
        assert!(matches!(
            CandleSeries::from_bars(&input, 14),
            Err(PatternError::InvalidOHLCV { index: 3, .. })
        ));
    }

    #[test]
    fn test_position_at_or_after() {
        let input = bars(10);
        let series = CandleSeries::from_bars(&input, 14).unwrap();

        assert_eq!(series.position_at_or_after(input[4].timestamp), 4);
        assert_eq!(
            series.position_at_or_after(input[4].timestamp + Duration::seconds(1)),
            5
        );
        assert_eq!(
            series.position_at_or_after(input[9].timestamp + Duration::days(1)),
            10
        );
    }
}
