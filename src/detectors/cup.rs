//! Cup candidate scanner
//!
//! For a right boundary `end`, left boundaries are tried from `end - min_cup_duration` down to
//! `max(floor, end - max_cup_duration)`, so the shortest cup wins. The rim, depth and length
//! checks run before the parabolic fit; the outcome equals that of the full conjunction.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::fit::{fit_parabola, FitCoefficients};
use super::helpers::{argmin, rim_asymmetry};
use crate::{config::DetectorConfig, series::CandleSeries};

/// A price window accepted as the cup of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CupCandidate {
    pub start_idx: usize,
    pub end_idx: usize,
    /// Index of the lowest close inside the cup
    pub bottom_idx: usize,
    pub left_rim_price: f64,
    pub right_rim_price: f64,
    pub cup_bottom_price: f64,
    /// max(rims) - lowest close
    pub depth: f64,
    pub r_squared: f64,
    pub fit_coefficients: FitCoefficients,
}

impl CupCandidate {
    /// Number of candles in the cup, both rims included
    #[inline]
    pub fn duration(&self) -> usize {
        self.end_idx - self.start_idx + 1
    }

    /// Resistance level: the higher of the two rims
    #[inline]
    pub fn max_rim(&self) -> f64 {
        self.left_rim_price.max(self.right_rim_price)
    }
}

/// Why a (start, end) window is not a cup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CupRejection {
    Length { span: usize },
    OutOfSeries,
    RimAsymmetry { asymmetry: f64 },
    TooShallow { depth: f64, required: f64 },
    PoorFit { r_squared: f64 },
}

/// Searches left boundaries for a given right boundary
#[derive(Debug, Clone, Copy)]
pub struct CupScanner<'a> {
    series: &'a CandleSeries,
    config: &'a DetectorConfig,
}

impl<'a> CupScanner<'a> {
    pub fn new(series: &'a CandleSeries, config: &'a DetectorConfig) -> Self {
        Self { series, config }
    }

    /// Left boundaries admissible for `end`, never below `floor`. `None` when empty.
    pub fn left_bounds(&self, end: usize, floor: usize) -> Option<RangeInclusive<usize>> {
        let highest = end.checked_sub(self.config.min_cup_duration.get())?;
        let lowest = floor.max(end.saturating_sub(self.config.max_cup_duration.get()));
        (lowest <= highest).then_some(lowest..=highest)
    }

    /// Test the window `[start, end]` as a cup
    pub fn evaluate(&self, start: usize, end: usize) -> Result<CupCandidate, CupRejection> {
        let span = end.saturating_sub(start);
        if start >= end
            || span < self.config.min_cup_duration.get()
            || span > self.config.max_cup_duration.get()
        {
            return Err(CupRejection::Length { span });
        }
        let (Some(left), Some(right)) = (self.series.get(start), self.series.get(end)) else {
            return Err(CupRejection::OutOfSeries);
        };

        let (left_rim_price, right_rim_price) = (left.high, right.high);
        let asymmetry = rim_asymmetry(left_rim_price, right_rim_price);
        if asymmetry > self.config.rim_tolerance.get() {
            return Err(CupRejection::RimAsymmetry { asymmetry });
        }

        let closes = self.series.closes(start..end + 1);
        let Some((bottom_offset, cup_bottom_price)) = argmin(closes) else {
            return Err(CupRejection::OutOfSeries);
        };
        let depth = left_rim_price.max(right_rim_price) - cup_bottom_price;
        let required = self.config.cup_depth_min_factor * self.series.avg_candle_size();
        if depth < required {
            return Err(CupRejection::TooShallow { depth, required });
        }

        let fit = fit_parabola(closes);
        let Some(fit_coefficients) = fit.coefficients else {
            return Err(CupRejection::PoorFit {
                r_squared: fit.r_squared,
            });
        };
        if fit.r_squared < self.config.min_r2.get() {
            return Err(CupRejection::PoorFit {
                r_squared: fit.r_squared,
            });
        }

        Ok(CupCandidate {
            start_idx: start,
            end_idx: end,
            bottom_idx: start + bottom_offset,
            left_rim_price,
            right_rim_price,
            cup_bottom_price,
            depth,
            r_squared: fit.r_squared,
            fit_coefficients,
        })
    }

    /// Shortest cup ending at `end` whose start is not below `floor`
    pub fn find(&self, end: usize, floor: usize) -> Option<CupCandidate> {
        self.left_bounds(end, floor)?
            .rev()
            .find_map(|start| self.evaluate(start, end).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Bar;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64], spread: f64) -> CandleSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: start + Duration::minutes(i as i64),
                open: c,
                high: c + spread,
                low: c - spread,
                close: c,
                volume: 1.0,
            })
            .collect();
        CandleSeries::from_bars(&bars, 14).unwrap()
    }

    /// `lead` flat candles at 100 followed by a 61-candle bowl from 100 down to 70 and back
    fn bowl(lead: usize) -> Vec<f64> {
        let mut closes = vec![100.0; lead];
        closes.extend((0..=60).map(|x| {
            let u = (x as f64 - 30.0) / 30.0;
            70.0 + 30.0 * u * u
        }));
        closes
    }

    #[test]
    fn test_left_bounds() {
        let s = series(&vec![100.0; 400], 1.0);
        let config = DetectorConfig::default();
        let scanner = CupScanner::new(&s, &config);

        assert_eq!(scanner.left_bounds(29, 0), None);
        assert_eq!(scanner.left_bounds(30, 0), Some(0..=0));
        assert_eq!(scanner.left_bounds(350, 0), Some(50..=320));
        assert_eq!(scanner.left_bounds(350, 100), Some(100..=320));
        assert_eq!(scanner.left_bounds(350, 321), None);
    }

    #[test]
    fn test_accepts_parabolic_bowl() {
        let closes = bowl(10);
        let s = series(&closes, 1.0);
        let config = DetectorConfig::default();

        let cup = CupScanner::new(&s, &config).evaluate(10, 70).unwrap();
        assert_eq!(cup.duration(), 61);
        assert_eq!(cup.bottom_idx, 40);
        assert!((cup.cup_bottom_price - 70.0).abs() < 1e-9);
        assert!((cup.depth - 31.0).abs() < 1e-9);
        assert!(cup.r_squared > 0.999);
        assert_eq!(cup.max_rim(), 101.0);
    }

    #[test]
    fn test_find_prefers_shortest_cup() {
        let closes = bowl(10);
        let s = series(&closes, 1.0);
        let config = DetectorConfig::default();

        // Starts 16..=40 fail the rim check, so 15 is the nearest passing start
        let scanner = CupScanner::new(&s, &config);
        assert!(scanner.evaluate(10, 70).is_ok());

        let cup = scanner.find(70, 0).unwrap();
        assert_eq!(cup.start_idx, 15);
        assert_eq!(cup.end_idx, 70);
        assert_eq!(cup.bottom_idx, 40);

        assert_eq!(scanner.find(70, 16), None);
    }

    #[test]
    fn test_rejections() {
        let s = series(&bowl(0), 1.0);
        let config = DetectorConfig::default();
        let scanner = CupScanner::new(&s, &config);

        assert_eq!(
            scanner.evaluate(0, 20),
            Err(CupRejection::Length { span: 20 })
        );
        // Right rim at the bottom of the bowl
        assert!(matches!(
            scanner.evaluate(0, 30),
            Err(CupRejection::RimAsymmetry { .. })
        ));

        let flat = series(&vec![100.0; 80], 1.0);
        let scanner = CupScanner::new(&flat, &config);
        assert!(matches!(
            scanner.evaluate(0, 60),
            Err(CupRejection::TooShallow { .. })
        ));
    }

    #[test]
    fn test_poor_fit_rejected() {
        // Two bowls back to back form a W
        let mut closes = bowl(0);
        closes.extend(bowl(0).into_iter().skip(1));
        let s = series(&closes, 1.0);
        let config = DetectorConfig::default();

        assert!(matches!(
            CupScanner::new(&s, &config).evaluate(0, 120),
            Err(CupRejection::PoorFit { .. })
        ));
    }
}
