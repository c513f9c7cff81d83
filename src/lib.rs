//! # cuphandle - Cup and Handle chart pattern detector
//!
//! Batch detection of the Cup and Handle pattern over a complete OHLCV series:
//! a parabolic cup, a shallow handle that stays under the cup's resistance, and a
//! breakout candle that closes a volatility-scaled margin above the handle.
//!
//! ## Quick Start
//!
//! ```rust
//! use cuphandle::prelude::*;
//! use cuphandle::synthetic::{self, SyntheticConfig};
//!
//! // Minute candles with a few injected patterns
//! let data = synthetic::generate(&SyntheticConfig {
//!     total_candles: 1_500,
//!     num_patterns: 3,
//!     ..SyntheticConfig::default()
//! })?;
//!
//! let engine = EngineBuilder::new().build()?;
//! for pattern in engine.scan(&data.bars)?.iter().filter(|p| p.is_valid()) {
//!     println!("{} -> {}  R² {:.3}", pattern.start_time(), pattern.end_time(), pattern.r_squared());
//! }
//! # Ok::<(), cuphandle::PatternError>(())
//! ```
//!
//! Any candle type can be scanned by implementing [`OHLCV`]; [`series::Bar`] is the
//! built-in one used by the CSV reader and the synthetic generator.

pub mod config;
pub mod control;
pub mod detectors;
pub mod indicators;
pub mod params;
pub mod report;
pub mod series;
pub mod synthetic;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::{DedupPolicy, DetectorConfig},
        // Cancellation
        control::{CancelToken, ScanControl},
        // Detectors
        detectors::*,
        // Parameters
        params::{ParamMeta, ParamType, Parameterized},
        // Parallel
        scan_parallel,
        // Series
        series::{Bar, Candle, CandleSeries},
        // Engine
        CupHandleEngine,
        EngineBuilder,
        OHLCVExt,
        // Errors
        PatternError,
        PatternIterator,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        // Core traits
        OHLCV,
    };
}

use chrono::{DateTime, Utc};

use config::{DedupPolicy, DetectorConfig};
use control::ScanControl;
use detectors::{Pattern, Scanner};
use series::CandleSeries;

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Everything that can go wrong while configuring, preparing or scanning
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} must lie within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("candle {index} is malformed: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("candle {index} is older than the candle before it")]
    UnorderedTimestamps { index: usize },

    #[error("candle {index} repeats the previous timestamp")]
    DuplicateTimestamp { index: usize },

    #[error("scan cancelled at candle {position}")]
    Cancelled { position: usize },

    #[error("scan deadline passed at candle {position}")]
    DeadlineExceeded { position: usize },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Share in `0.0..=1.0`, used for fit quality and tolerances
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Ratio(f64);

impl Ratio {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() {
            return Err(PatternError::InvalidValue("ratio is NaN"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Unchecked, for defaults known to be in range
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Ratio {
    type Error = PatternError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Ratio> for f64 {
    fn from(ratio: Ratio) -> f64 {
        ratio.0
    }
}

/// Non-zero number of candles
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "usize", into = "usize")]
pub struct Period(usize);

impl Period {
    pub fn new(value: usize) -> Result<Self> {
        match value {
            0 => Err(PatternError::InvalidValue("period of zero candles")),
            n => Ok(Self(n)),
        }
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for Period {
    type Error = PatternError;

    fn try_from(value: usize) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Period> for usize {
    fn from(period: Period) -> usize {
        period.0
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn timestamp(&self) -> DateTime<Utc>;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

impl<T: OHLCV + ?Sized> OHLCV for &T {
    fn timestamp(&self) -> DateTime<Utc> {
        (**self).timestamp()
    }

    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn volume(&self) -> f64 {
        (**self).volume()
    }
}

/// Derived candle properties
pub trait OHLCVExt: OHLCV {
    /// Candle size: high - low
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// First inconsistency of the candle, if any
    fn defect(&self) -> Option<&'static str> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| !p.is_finite()) {
            Some("non-finite price")
        } else if !self.volume().is_finite() {
            Some("non-finite volume")
        } else if self.high() < self.low() {
            Some("high < low")
        } else {
            None
        }
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

// ============================================================
// CUP AND HANDLE ENGINE
// ============================================================

/// Main detection engine. Holds a validated configuration and nothing else,
/// so one engine can be shared across threads and series.
#[derive(Debug, Clone)]
pub struct CupHandleEngine {
    config: DetectorConfig,
}

impl CupHandleEngine {
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Validate the bars and attach ATR and the average candle size.
    /// The result can be kept and scanned any number of times.
    pub fn prepare<T: OHLCV>(&self, bars: &[T]) -> Result<CandleSeries> {
        CandleSeries::from_bars(bars, self.config.atr_period.get())
    }

    /// Scan a prepared series to completion.
    pub fn scan_series(&self, series: &CandleSeries) -> Vec<Pattern> {
        self.iter(series).collect()
    }

    /// Scan a prepared series, checking `control` before every right-boundary step.
    pub fn scan_series_with(
        &self,
        series: &CandleSeries,
        control: &ScanControl,
    ) -> Result<Vec<Pattern>> {
        let mut scanner = Scanner::new(series, &self.config);
        let mut patterns = Vec::new();
        while let Some(pattern) = scanner.next_pattern(control)? {
            patterns.push(pattern);
        }
        Ok(patterns)
    }

    /// Lazily iterate patterns in detection order.
    pub fn iter<'a>(&'a self, series: &'a CandleSeries) -> PatternIterator<'a> {
        PatternIterator {
            scanner: Scanner::new(series, &self.config),
        }
    }

    /// Prepare and scan raw bars.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<Pattern>> {
        let series = self.prepare(bars)?;
        Ok(self.scan_series(&series))
    }

    /// Prepare and scan raw bars under a deadline / cancellation token.
    pub fn scan_with<T: OHLCV>(&self, bars: &[T], control: &ScanControl) -> Result<Vec<Pattern>> {
        let series = self.prepare(bars)?;
        self.scan_series_with(&series, control)
    }
}

// ============================================================
// PATTERN ITERATOR
// ============================================================

/// Iterator over the patterns of one series, in detection order
pub struct PatternIterator<'a> {
    scanner: Scanner<'a>,
}

impl PatternIterator<'_> {
    /// Index of the right boundary currently being scanned
    pub fn position(&self) -> usize {
        self.scanner.position()
    }
}

impl Iterator for PatternIterator<'_> {
    type Item = Pattern;

    fn next(&mut self) -> Option<Self::Item> {
        self.scanner.next()
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Assembles a [`CupHandleEngine`], validating the configuration on `build`
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: DetectorConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the deduplication policy applied after each valid pattern
    pub fn dedup(mut self, policy: DedupPolicy) -> Self {
        self.config.dedup = policy;
        self
    }

    /// Configure from a flat parameter map; missing keys keep their defaults
    pub fn with_params(mut self, params: &std::collections::HashMap<&str, f64>) -> Result<Self> {
        self.config = <DetectorConfig as params::Parameterized>::with_params(params)?;
        Ok(self)
    }

    pub fn build(self) -> Result<CupHandleEngine> {
        self.config.validate()?;
        Ok(CupHandleEngine {
            config: self.config,
        })
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::iter::Either;
use rayon::prelude::*;

/// Patterns found for one instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub patterns: Vec<Pattern>,
}

/// An instrument whose candles could not be prepared
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

/// Scan independent instruments on the rayon pool with one shared engine.
/// Failures do not stop the other instruments.
pub fn scan_parallel<'a, T, I>(
    engine: &CupHandleEngine,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let (found, failed): (Vec<ScanResult>, Vec<ScanError>) = instruments
        .into_par_iter()
        .partition_map(|(symbol, bars)| match engine.scan(bars) {
            Ok(patterns) => Either::Left(ScanResult {
                symbol: symbol.to_owned(),
                patterns,
            }),
            Err(error) => Either::Right(ScanError {
                symbol: symbol.to_owned(),
                error,
            }),
        });

    tracing::info!(
        instruments = found.len() + failed.len(),
        failed = failed.len(),
        "parallel scan finished"
    );

    (found, failed)
}

// ============================================================
// TESTS
// ============================================================
