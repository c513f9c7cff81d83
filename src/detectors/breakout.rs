//! Breakout confirmer
//!
//! Looks at up to `breakout_window` candles after the handle. The first candle with a defined
//! ATR whose close clears the handle high by `breakout_atr_multiplier` ATRs confirms the pattern.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::handle::HandleCandidate;
use crate::{config::DetectorConfig, series::CandleSeries};

/// The candle that confirmed a pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakout {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    /// Close of the breakout candle
    pub price: f64,
    /// Resistance being broken: the handle high
    pub threshold: f64,
    /// ATR of the breakout candle
    pub atr: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakoutConfirmer<'a> {
    series: &'a CandleSeries,
    config: &'a DetectorConfig,
}

impl<'a> BreakoutConfirmer<'a> {
    pub fn new(series: &'a CandleSeries, config: &'a DetectorConfig) -> Self {
        Self { series, config }
    }

    /// Candle indices searched after `handle`, clipped to the series end
    pub fn window(&self, handle: &HandleCandidate) -> Range<usize> {
        let n = self.series.len();
        let start = (handle.end_idx + 1).min(n);
        start..start.saturating_add(self.config.breakout_window.get()).min(n)
    }

    /// First candle in the window closing above `handle.high + multiplier * ATR`
    pub fn confirm(&self, handle: &HandleCandidate) -> Option<Breakout> {
        let multiplier = self.config.breakout_atr_multiplier;
        self.window(handle).find_map(|index| {
            let candle = self.series.get(index)?;
            let atr = candle.atr?;
            (candle.close > handle.high + multiplier * atr).then_some(Breakout {
                index,
                timestamp: candle.timestamp,
                price: candle.close,
                threshold: handle.high,
                atr,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Bar;
    use crate::Period;
    use chrono::{Duration, TimeZone};

    fn series(closes: &[f64]) -> CandleSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: start + Duration::minutes(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1.0,
            })
            .collect();
        CandleSeries::from_bars(&bars, 14).unwrap()
    }

    fn handle(end_idx: usize) -> HandleCandidate {
        HandleCandidate {
            start_idx: end_idx - 5,
            end_idx,
            high: 101.0,
            low: 99.0,
            retrace_amount: 0.0,
        }
    }

    #[test]
    fn test_window_is_clipped() {
        let s = series(&[100.0; 40]);
        let config = DetectorConfig::default();
        let confirmer = BreakoutConfirmer::new(&s, &config);

        assert_eq!(confirmer.window(&handle(20)), 21..31);
        assert_eq!(confirmer.window(&handle(37)), 38..40);
        assert_eq!(confirmer.window(&handle(39)), 40..40);
    }

    #[test]
    fn test_unbounded_window_stops_at_series_end() {
        let s = series(&[100.0; 40]);
        let config = DetectorConfig {
            breakout_window: Period::new(usize::MAX).unwrap(),
            ..DetectorConfig::default()
        };
        let confirmer = BreakoutConfirmer::new(&s, &config);

        assert_eq!(confirmer.window(&handle(20)), 21..40);
        assert_eq!(confirmer.window(&handle(39)), 40..40);
    }

    #[test]
    fn test_first_qualifying_candle_wins() {
        let mut closes = vec![100.0; 40];
        closes[22] = 103.0;
        closes[23] = 105.0;
        closes[24] = 110.0;
        let s = series(&closes);
        let config = DetectorConfig::default();

        let breakout = BreakoutConfirmer::new(&s, &config)
            .confirm(&handle(20))
            .unwrap();
        assert_eq!(breakout.index, 23);
        assert_eq!(breakout.price, 105.0);
        assert_eq!(breakout.threshold, 101.0);
        assert!(breakout.price > breakout.threshold + 1.5 * breakout.atr);
        assert_eq!(breakout.timestamp, s[23].timestamp);
    }

    #[test]
    fn test_no_breakout_outside_window() {
        let mut closes = vec![100.0; 40];
        closes[31] = 120.0;
        let s = series(&closes);
        let config = DetectorConfig::default();

        assert_eq!(BreakoutConfirmer::new(&s, &config).confirm(&handle(20)), None);
    }

    #[test]
    fn test_undefined_atr_never_confirms() {
        let mut closes = vec![100.0; 14];
        closes[8] = 150.0;
        let s = series(&closes);
        let config = DetectorConfig::default();

        assert_eq!(BreakoutConfirmer::new(&s, &config).confirm(&handle(6)), None);
    }
}
