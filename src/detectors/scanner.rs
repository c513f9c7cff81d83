//! Scan state machine
//!
//! ```text
//! Scanning(i) ── no admissible j ─────────────────────────────► Scanning(i+1)
//!      │
//!      ▼
//! CupSearch(i, j) ── rejected / handles exhausted ── j > lowest ─► CupSearch(i, j-1)
//!      │                                           └ j = lowest ─► Scanning(i+1)
//!      ▼ cup accepted
//! HandleSearch(cup, k) ── rejected ───────────────────────────► HandleSearch(cup, k+1)
//!      ├── no breakout ── emit Invalid ───────────────────────► HandleSearch(cup, k+1)
//!      └── breakout ── emit Valid ── cursor ──────────────────► Scanning(next)
//! ```
//!
//! `Scanning(n)` is `Done`. Each call to [`Scanner::step`] performs one transition.

use super::breakout::BreakoutConfirmer;
use super::cup::{CupCandidate, CupScanner};
use super::cursor::{ScanCursor, ScanState};
use super::handle::HandleValidator;
use super::record::{Pattern, PatternBuilder};
use crate::{config::DetectorConfig, control::ScanControl, series::CandleSeries, Result};

/// Counters of a scan, logged when it finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub right_boundaries: usize,
    pub cups_accepted: usize,
    pub handles_accepted: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Confirmed patterns withheld by the per-day policy
    pub skipped: usize,
}

/// Drives cup, handle and breakout search over one series
pub struct Scanner<'a> {
    series: &'a CandleSeries,
    breakout_window: usize,
    cups: CupScanner<'a>,
    handles: HandleValidator<'a>,
    breakouts: BreakoutConfirmer<'a>,
    records: PatternBuilder<'a>,
    cursor: ScanCursor,
    state: ScanState,
    stats: ScanStats,
}

impl<'a> Scanner<'a> {
    pub fn new(series: &'a CandleSeries, config: &'a DetectorConfig) -> Self {
        Self {
            series,
            breakout_window: config.breakout_window.get(),
            cups: CupScanner::new(series, config),
            handles: HandleValidator::new(series, config),
            breakouts: BreakoutConfirmer::new(series, config),
            records: PatternBuilder::new(series),
            cursor: ScanCursor::new(config.dedup),
            state: ScanState::Scanning {
                right: config.min_cup_duration.get(),
            },
            stats: ScanStats::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> ScanState {
        self.state
    }

    #[inline]
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Right boundary under examination, `len()` once done
    pub fn position(&self) -> usize {
        match self.state {
            ScanState::Scanning { right } | ScanState::CupSearch { right, .. } => right,
            ScanState::HandleSearch { cup, .. } => cup.end_idx,
            ScanState::Done => self.series.len(),
        }
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.state == ScanState::Done
    }

    /// Perform one transition, returning the pattern it emitted, if any
    pub fn step(&mut self) -> Option<Pattern> {
        let (next, emitted) = match self.state {
            ScanState::Scanning { right } => (self.on_scanning(right), None),
            ScanState::CupSearch {
                right,
                left,
                lowest,
            } => (self.on_cup_search(right, left, lowest), None),
            ScanState::HandleSearch {
                cup,
                lowest,
                end,
                last,
            } => self.on_handle_search(cup, lowest, end, last),
            ScanState::Done => (ScanState::Done, None),
        };
        tracing::trace!(from = ?self.state, to = ?next, "scan transition");
        self.state = next;
        emitted
    }

    /// Run to the next pattern, consulting `control` at every right boundary
    pub fn next_pattern(&mut self, control: &ScanControl) -> Result<Option<Pattern>> {
        loop {
            match self.state {
                ScanState::Done => return Ok(None),
                ScanState::Scanning { right } => control.check(right)?,
                _ => {}
            }
            if let Some(pattern) = self.step() {
                return Ok(Some(pattern));
            }
        }
    }

    fn on_scanning(&mut self, right: usize) -> ScanState {
        if right >= self.series.len() {
            tracing::info!(
                candles = self.series.len(),
                valid = self.stats.valid,
                invalid = self.stats.invalid,
                cups = self.stats.cups_accepted,
                skipped = self.stats.skipped,
                "scan finished"
            );
            return ScanState::Done;
        }
        self.stats.right_boundaries += 1;

        match self.cups.left_bounds(right, self.cursor.floor()) {
            Some(bounds) => ScanState::CupSearch {
                right,
                left: *bounds.end(),
                lowest: *bounds.start(),
            },
            None => ScanState::Scanning { right: right + 1 },
        }
    }

    fn on_cup_search(&mut self, right: usize, left: usize, lowest: usize) -> ScanState {
        let cup = match self.cups.evaluate(left, right) {
            Ok(cup) => cup,
            Err(rejection) => {
                tracing::trace!(left, right, ?rejection, "cup rejected");
                return Self::next_left(right, left, lowest);
            }
        };

        self.stats.cups_accepted += 1;
        tracing::debug!(
            start = cup.start_idx,
            end = cup.end_idx,
            r_squared = cup.r_squared,
            depth = cup.depth,
            "cup accepted"
        );

        match self.handles.end_bounds(&cup) {
            Some(ends) => ScanState::HandleSearch {
                cup,
                lowest,
                end: *ends.start(),
                last: *ends.end(),
            },
            None => Self::next_left(right, left, lowest),
        }
    }

    fn on_handle_search(
        &mut self,
        cup: CupCandidate,
        lowest: usize,
        end: usize,
        last: usize,
    ) -> (ScanState, Option<Pattern>) {
        if end > last {
            return (Self::next_left(cup.end_idx, cup.start_idx, lowest), None);
        }
        let next_end = ScanState::HandleSearch {
            cup,
            lowest,
            end: end + 1,
            last,
        };

        let handle = match self.handles.evaluate(&cup, end) {
            Ok(handle) => handle,
            Err(rejection) => {
                tracing::trace!(end, ?rejection, "handle rejected");
                return (next_end, None);
            }
        };
        self.stats.handles_accepted += 1;

        let Some(breakout) = self.breakouts.confirm(&handle) else {
            self.stats.invalid += 1;
            tracing::debug!(
                cup_start = cup.start_idx,
                cup_end = cup.end_idx,
                handle_end = handle.end_idx,
                "no breakout after handle"
            );
            return (next_end, Some(self.records.build(cup, handle, None)));
        };

        if !self.cursor.admits(self.series, &cup) {
            self.stats.skipped += 1;
            tracing::debug!(
                cup_start = cup.start_idx,
                breakout = breakout.index,
                "pattern on an already reported day skipped"
            );
            return (next_end, None);
        }

        self.stats.valid += 1;
        let next = self
            .cursor
            .advance(self.series, &cup, &handle, &breakout, self.breakout_window);
        tracing::info!(
            cup_start = cup.start_idx,
            cup_end = cup.end_idx,
            handle_end = handle.end_idx,
            breakout = breakout.index,
            price = breakout.price,
            next,
            "valid cup and handle"
        );

        (
            ScanState::Scanning { right: next },
            Some(self.records.build(cup, handle, Some(breakout))),
        )
    }

    fn next_left(right: usize, left: usize, lowest: usize) -> ScanState {
        if left > lowest {
            ScanState::CupSearch {
                right,
                left: left - 1,
                lowest,
            }
        } else {
            ScanState::Scanning { right: right + 1 }
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Pattern;

    fn next(&mut self) -> Option<Pattern> {
        while !self.is_done() {
            if let Some(pattern) = self.step() {
                return Some(pattern);
            }
        }
        None
    }
}
