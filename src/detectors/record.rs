//! Pattern records
//!
//! Every (cup, handle) pair that reaches the breakout stage produces exactly one [`Pattern`]:
//! `Valid` when a breakout candle confirmed it, `Invalid` with a reason otherwise.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::breakout::Breakout;
use super::cup::CupCandidate;
use super::handle::HandleCandidate;
use crate::series::CandleSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternStatus {
    Valid,
    Invalid,
}

impl fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => f.write_str("Valid"),
            Self::Invalid => f.write_str("Invalid"),
        }
    }
}

/// Why a cup and handle was not confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidReason {
    #[serde(rename = "no valid breakout candle found after handle")]
    NoBreakout,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoBreakout => "no valid breakout candle found after handle",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected cup and handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Pattern {
    Valid {
        cup: CupCandidate,
        handle: HandleCandidate,
        breakout: Breakout,
        start_time: DateTime<Utc>,
        /// Breakout candle timestamp
        end_time: DateTime<Utc>,
    },
    Invalid {
        cup: CupCandidate,
        handle: HandleCandidate,
        reason: InvalidReason,
        start_time: DateTime<Utc>,
        /// Last handle candle timestamp
        end_time: DateTime<Utc>,
    },
}

impl Pattern {
    pub fn status(&self) -> PatternStatus {
        match self {
            Self::Valid { .. } => PatternStatus::Valid,
            Self::Invalid { .. } => PatternStatus::Invalid,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn reason(&self) -> Option<InvalidReason> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid { reason, .. } => Some(*reason),
        }
    }

    pub fn cup(&self) -> &CupCandidate {
        match self {
            Self::Valid { cup, .. } | Self::Invalid { cup, .. } => cup,
        }
    }

    pub fn handle(&self) -> &HandleCandidate {
        match self {
            Self::Valid { handle, .. } | Self::Invalid { handle, .. } => handle,
        }
    }

    pub fn breakout(&self) -> Option<&Breakout> {
        match self {
            Self::Valid { breakout, .. } => Some(breakout),
            Self::Invalid { .. } => None,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        match self {
            Self::Valid { start_time, .. } | Self::Invalid { start_time, .. } => *start_time,
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        match self {
            Self::Valid { end_time, .. } | Self::Invalid { end_time, .. } => *end_time,
        }
    }

    #[inline]
    pub fn cup_duration(&self) -> usize {
        self.cup().duration()
    }

    #[inline]
    pub fn cup_depth(&self) -> f64 {
        self.cup().depth
    }

    #[inline]
    pub fn r_squared(&self) -> f64 {
        self.cup().r_squared
    }

    #[inline]
    pub fn handle_duration(&self) -> usize {
        self.handle().duration()
    }

    #[inline]
    pub fn handle_depth(&self) -> f64 {
        self.handle().depth()
    }
}

/// Assembles records, resolving timestamps against the scanned series
#[derive(Debug, Clone, Copy)]
pub struct PatternBuilder<'a> {
    series: &'a CandleSeries,
}

impl<'a> PatternBuilder<'a> {
    pub fn new(series: &'a CandleSeries) -> Self {
        Self { series }
    }

    /// `Valid` when `breakout` is present, `Invalid` (no breakout) otherwise
    pub fn build(
        &self,
        cup: CupCandidate,
        handle: HandleCandidate,
        breakout: Option<Breakout>,
    ) -> Pattern {
        let start_time = self.series[cup.start_idx].timestamp;
        match breakout {
            Some(breakout) => Pattern::Valid {
                cup,
                handle,
                end_time: breakout.timestamp,
                breakout,
                start_time,
            },
            None => Pattern::Invalid {
                cup,
                handle,
                reason: InvalidReason::NoBreakout,
                start_time,
                end_time: self.series[handle.end_idx].timestamp,
            },
        }
    }
}
