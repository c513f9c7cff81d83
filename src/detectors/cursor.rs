//! Scan cursor and deduplication
//!
//! After a valid pattern the cursor decides where the next right boundary is and how far back
//! later cups may reach.

use chrono::{Duration, NaiveDate};

use super::breakout::Breakout;
use super::cup::CupCandidate;
use super::handle::HandleCandidate;
use crate::{config::DedupPolicy, series::CandleSeries};

/// States of the scan. `Done` is the terminal `Scanning(n)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanState {
    /// Next right boundary to examine
    Scanning { right: usize },
    /// Testing left boundary `left`; `lowest` is the last one admissible for `right`
    CupSearch {
        right: usize,
        left: usize,
        lowest: usize,
    },
    /// Testing handle end `end` of an accepted cup, up to `last`
    HandleSearch {
        cup: CupCandidate,
        lowest: usize,
        end: usize,
        last: usize,
    },
    Done,
}

#[derive(Debug, Clone)]
pub struct ScanCursor {
    policy: DedupPolicy,
    floor: usize,
    last_day: Option<NaiveDate>,
}

impl ScanCursor {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            floor: 0,
            last_day: None,
        }
    }

    /// Lowest index a cup may start at
    #[inline]
    pub fn floor(&self) -> usize {
        self.floor
    }

    /// Whether a confirmed `cup` may be emitted as valid
    pub fn admits(&self, series: &CandleSeries, cup: &CupCandidate) -> bool {
        match self.policy {
            DedupPolicy::CursorAdvance => true,
            DedupPolicy::OnePerDay { .. } => {
                self.last_day != Some(series[cup.start_idx].timestamp.date_naive())
            }
        }
    }

    /// Record a valid pattern and return the next right boundary
    pub fn advance(
        &mut self,
        series: &CandleSeries,
        cup: &CupCandidate,
        handle: &HandleCandidate,
        breakout: &Breakout,
        breakout_window: usize,
    ) -> usize {
        match self.policy {
            DedupPolicy::CursorAdvance => {
                let next = handle
                    .end_idx
                    .saturating_add(breakout_window)
                    .saturating_add(1)
                    .min(series.len());
                self.floor = next;
                next
            }
            DedupPolicy::OnePerDay { skip_days } => {
                self.last_day = Some(series[cup.start_idx].timestamp.date_naive());
                let resume = breakout
                    .timestamp
                    .checked_add_signed(Duration::days(i64::from(skip_days)))
                    .map_or(series.len(), |t| series.position_at_or_after(t));
                resume.max(handle.end_idx + 1)
            }
        }
    }
}
