//! Handle validator
//!
//! The handle starts on the cup's last candle and ends at `k`, tried in increasing order over
//! `[end + min_handle_duration, min(end + max_handle_duration, n - 2)]`. The upper clip keeps at
//! least one candle for the breakout window.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::cup::CupCandidate;
use super::helpers::{window_high, window_low};
use crate::{config::DetectorConfig, series::CandleSeries};

/// A consolidation window accepted as the handle of a cup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandleCandidate {
    /// Same index as the cup's end
    pub start_idx: usize,
    pub end_idx: usize,
    pub high: f64,
    pub low: f64,
    /// Distance of the handle high below the cup resistance
    pub retrace_amount: f64,
}

impl HandleCandidate {
    /// Candles after the cup's end
    #[inline]
    pub fn duration(&self) -> usize {
        self.end_idx - self.start_idx
    }

    #[inline]
    pub fn depth(&self) -> f64 {
        self.high - self.low
    }
}

/// Why a handle window was rejected
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandleRejection {
    OutOfSeries,
    AboveResistance { high: f64, resistance: f64 },
    ExcessiveRetrace { retrace: f64, allowed: f64 },
    BelowCupBottom { low: f64, bottom: f64 },
}

#[derive(Debug, Clone, Copy)]
pub struct HandleValidator<'a> {
    series: &'a CandleSeries,
    config: &'a DetectorConfig,
}

impl<'a> HandleValidator<'a> {
    pub fn new(series: &'a CandleSeries, config: &'a DetectorConfig) -> Self {
        Self { series, config }
    }

    /// Admissible handle end indices for `cup`, `None` when the series is too short.
    ///
    /// Ends stop at `n - 2` so that at least one candle follows the handle. A handle ending on
    /// the last candle has an empty breakout window and produces no record at all, rather than
    /// an Invalid one.
    pub fn end_bounds(&self, cup: &CupCandidate) -> Option<RangeInclusive<usize>> {
        let first = cup.end_idx.saturating_add(self.config.min_handle_duration.get());
        let last = cup
            .end_idx
            .saturating_add(self.config.max_handle_duration.get())
            .min(self.series.len().checked_sub(2)?);
        (first <= last).then_some(first..=last)
    }

    /// Test the window `[cup.end_idx, end]` as the handle of `cup`
    pub fn evaluate(
        &self,
        cup: &CupCandidate,
        end: usize,
    ) -> Result<HandleCandidate, HandleRejection> {
        let Some(window) = self.series.candles().get(cup.end_idx..=end) else {
            return Err(HandleRejection::OutOfSeries);
        };
        let (high, low) = (window_high(window), window_low(window));

        let resistance = cup.max_rim();
        if high > resistance {
            return Err(HandleRejection::AboveResistance { high, resistance });
        }

        let retrace_amount = resistance - high;
        let allowed = self.config.handle_retrace_max.get() * cup.depth;
        if retrace_amount > allowed {
            return Err(HandleRejection::ExcessiveRetrace {
                retrace: retrace_amount,
                allowed,
            });
        }

        if low < cup.cup_bottom_price {
            return Err(HandleRejection::BelowCupBottom {
                low,
                bottom: cup.cup_bottom_price,
            });
        }

        Ok(HandleCandidate {
            start_idx: cup.end_idx,
            end_idx: end,
            high,
            low,
            retrace_amount,
        })
    }
}
