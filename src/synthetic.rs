//! Synthetic candle generator
//!
//! Produces a seeded 1-minute random walk with cup and handle segments spliced in. The walk
//! continues from the last price of each segment, so there are no gaps at the seams.
//! Generation is deterministic for a given [`SyntheticConfig`].

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::{series::Bar, PatternError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub total_candles: usize,
    /// Requested segments; overlapping or truncated ones are dropped
    pub num_patterns: usize,
    pub base_price: f64,
    pub avg_candle_size: f64,
    /// Standard deviation of one walk step
    pub walk_volatility: f64,
    /// Total drift added over the whole series
    pub trend: f64,
    /// Candles kept free of segments at each end
    pub margin: usize,
    /// Spacing of the candidate segment starts
    pub min_gap: usize,
    pub start: DateTime<Utc>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            // One week of minutes
            total_candles: 10_081,
            num_patterns: 30,
            base_price: 50_000.0,
            avg_candle_size: 50.0,
            walk_volatility: 15.0,
            trend: 500.0,
            margin: 500,
            min_gap: 200,
            start: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        if self.total_candles == 0 || self.min_gap == 0 {
            return Err(PatternError::InvalidConfig(
                "total_candles and min_gap must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("base_price", self.base_price),
            ("avg_candle_size", self.avg_candle_size),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PatternError::InvalidConfig(format!(
                    "{name} must be a finite positive number, got {value}"
                )));
            }
        }
        if !self.walk_volatility.is_finite() || self.walk_volatility < 0.0 || !self.trend.is_finite()
        {
            return Err(PatternError::InvalidConfig(
                "walk_volatility and trend must be finite, volatility non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a cup and handle segment was placed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectedPattern {
    pub start_idx: usize,
    /// Candles in the cup, rims included
    pub cup_len: usize,
    /// Candles after the cup end
    pub handle_len: usize,
    pub breakout_len: usize,
    pub cup_depth: f64,
    pub handle_retrace: f64,
}

impl InjectedPattern {
    #[inline]
    pub fn cup_end(&self) -> usize {
        self.start_idx + self.cup_len - 1
    }

    #[inline]
    pub fn handle_end(&self) -> usize {
        self.cup_end() + self.handle_len
    }

    /// One past the last breakout candle
    #[inline]
    pub fn end(&self) -> usize {
        self.handle_end() + 1 + self.breakout_len
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSeries {
    pub bars: Vec<Bar>,
    pub patterns: Vec<InjectedPattern>,
}

const BREAKOUT_LEN: usize = 10;

struct Segment {
    closes: Vec<f64>,
    volumes: Vec<f64>,
    pattern: InjectedPattern,
}

struct Generator {
    rng: StdRng,
    avg: f64,
}

impl Generator {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.rng.gen_range(low..high)
    }

    fn segment(&mut self, start_idx: usize, anchor: f64) -> Result<Segment> {
        let avg = self.avg;
        let cup_len = self.rng.gen_range(30..=300usize);
        let handle_len = self.rng.gen_range(5..=50usize);
        let cup_depth = self.uniform(2.5, 5.0) * avg;
        let handle_retrace = self.uniform(0.1, 0.4) * cup_depth;
        let jitter = normal(avg * 0.05)?;

        let mut closes = Vec::with_capacity(cup_len + handle_len + BREAKOUT_LEN);
        let mut volumes = Vec::with_capacity(closes.capacity());

        // Cup: rims at the anchor, bottom `cup_depth` below
        let mid = (cup_len - 1) as f64 / 2.0;
        for x in 0..cup_len {
            let u = (x as f64 - mid) / mid;
            closes.push(anchor - cup_depth + cup_depth * u * u + jitter.sample(&mut self.rng));
            volumes.push(80.0 + 70.0 * u.abs());
        }

        // Handle: drift down by `handle_retrace`
        for t in 1..=handle_len {
            let drop = handle_retrace * t as f64 / handle_len as f64;
            closes.push(anchor - drop + jitter.sample(&mut self.rng));
            volumes.push(100.0);
        }

        // Breakout: climb well clear of the handle
        let from = anchor - handle_retrace;
        let target = anchor + self.uniform(3.0, 5.0) * avg;
        for t in 1..=BREAKOUT_LEN {
            closes.push(from + (target - from) * t as f64 / BREAKOUT_LEN as f64);
            volumes.push(self.uniform(200.0, 300.0));
        }

        Ok(Segment {
            closes,
            volumes,
            pattern: InjectedPattern {
                start_idx,
                cup_len,
                handle_len,
                breakout_len: BREAKOUT_LEN,
                cup_depth,
                handle_retrace,
            },
        })
    }

    /// Candle around `close` with a consistent open/high/low
    fn candle(&mut self, timestamp: DateTime<Utc>, close: f64, volume: f64) -> Bar {
        let avg = self.avg;
        let open = close + self.uniform(-0.2, 0.2) * avg;
        let high = open.max(close) + self.uniform(0.1, 0.5) * avg;
        let low = open.min(close) - self.uniform(0.1, 0.5) * avg;
        Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

fn normal(std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(0.0, std_dev).map_err(|e| PatternError::InvalidConfig(e.to_string()))
}

/// Generate a series with injected cup and handle segments
pub fn generate(config: &SyntheticConfig) -> Result<SyntheticSeries> {
    config.validate()?;

    let mut generator = Generator {
        rng: StdRng::seed_from_u64(config.seed),
        avg: config.avg_candle_size,
    };
    let step = normal(config.walk_volatility)?;
    let drift = config.trend / config.total_candles as f64;

    // Candidate starts every `min_gap` candles inside the margins
    let candidates: Vec<usize> = (config.margin..config.total_candles.saturating_sub(config.margin))
        .step_by(config.min_gap)
        .collect();
    let amount = config.num_patterns.min(candidates.len());
    let mut starts: Vec<usize> = index::sample(&mut generator.rng, candidates.len(), amount)
        .into_iter()
        .map(|i| candidates[i])
        .collect();
    starts.sort_unstable();
    let mut starts = starts.into_iter().peekable();

    let mut bars = Vec::with_capacity(config.total_candles);
    let mut patterns = Vec::new();
    let mut price = config.base_price;

    while bars.len() < config.total_candles {
        let idx = bars.len();
        // Drop starts already covered by the previous segment
        while starts.next_if(|&s| s < idx).is_some() {}

        if starts.next_if_eq(&idx).is_some() {
            let segment = generator.segment(idx, price)?;
            if segment.pattern.end() <= config.total_candles {
                for (close, volume) in segment.closes.into_iter().zip(segment.volumes) {
                    let timestamp = minute(config.start, bars.len());
                    bars.push(generator.candle(timestamp, close, volume));
                    price = close;
                }
                patterns.push(segment.pattern);
                continue;
            }
        }

        price += step.sample(&mut generator.rng) + drift;
        let volume = generator.uniform(100.0, 200.0);
        let timestamp = minute(config.start, idx);
        bars.push(generator.candle(timestamp, price, volume));
    }

    tracing::debug!(
        candles = bars.len(),
        injected = patterns.len(),
        requested = config.num_patterns,
        seed = config.seed,
        "synthetic series generated"
    );

    Ok(SyntheticSeries { bars, patterns })
}

fn minute(start: DateTime<Utc>, index: usize) -> DateTime<Utc> {
    start + Duration::minutes(index as i64)
}
