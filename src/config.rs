//! Detector configuration
//!
//! Every threshold of the scan lives in [`DetectorConfig`]. The struct is serde-enabled so it
//! can be loaded from TOML; missing keys fall back to the defaults below.
//!
//! ```toml
//! min_cup_duration = 30
//! max_cup_duration = 300
//! min_r2 = 0.85
//!
//! [dedup]
//! mode = "one_per_day"
//! skip_days = 1
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    params::{ParamMap, ParamMeta, Parameterized},
    PatternError, Period, Ratio, Result,
};

/// What the scan cursor does after a valid pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Resume after the breakout window; later cups may not start before it.
    #[default]
    CursorAdvance,
    /// At most one valid pattern per calendar day (UTC) of the cup start, resuming
    /// `skip_days` after the breakout candle.
    OnePerDay { skip_days: u32 },
}

/// Thresholds for cup, handle and breakout detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub min_cup_duration: Period,
    pub max_cup_duration: Period,
    pub min_handle_duration: Period,
    pub max_handle_duration: Period,
    /// Minimum R² of the parabolic cup fit
    pub min_r2: Ratio,
    /// Maximum |left rim - right rim| / mean(rims)
    pub rim_tolerance: Ratio,
    /// Maximum distance of the handle high below the cup resistance, as a share of cup depth
    pub handle_retrace_max: Ratio,
    /// Cup depth must be at least this many average candle sizes
    pub cup_depth_min_factor: f64,
    /// Breakout close must clear the handle high by this many ATRs
    pub breakout_atr_multiplier: f64,
    /// Number of candles after the handle searched for a breakout
    pub breakout_window: Period,
    pub atr_period: Period,
    pub dedup: DedupPolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_cup_duration: Period::new_const(30),
            max_cup_duration: Period::new_const(300),
            min_handle_duration: Period::new_const(5),
            max_handle_duration: Period::new_const(50),
            min_r2: Ratio::new_const(0.85),
            rim_tolerance: Ratio::new_const(0.10),
            handle_retrace_max: Ratio::new_const(0.40),
            cup_depth_min_factor: 2.0,
            breakout_atr_multiplier: 1.5,
            breakout_window: Period::new_const(10),
            atr_period: Period::new_const(crate::indicators::ATR_PERIOD),
            dedup: DedupPolicy::CursorAdvance,
        }
    }
}

impl DetectorConfig {
    /// Check cross-field constraints the validated field types cannot express
    pub fn validate(&self) -> Result<()> {
        if self.min_cup_duration > self.max_cup_duration {
            return Err(PatternError::InvalidConfig(format!(
                "min_cup_duration ({}) exceeds max_cup_duration ({})",
                self.min_cup_duration.get(),
                self.max_cup_duration.get()
            )));
        }
        if self.min_handle_duration > self.max_handle_duration {
            return Err(PatternError::InvalidConfig(format!(
                "min_handle_duration ({}) exceeds max_handle_duration ({})",
                self.min_handle_duration.get(),
                self.max_handle_duration.get()
            )));
        }
        // A cup needs three points for the quadratic fit
        if self.min_cup_duration.get() < 2 {
            return Err(PatternError::InvalidConfig(
                "min_cup_duration must be at least 2".to_string(),
            ));
        }
        for (name, value) in [
            ("cup_depth_min_factor", self.cup_depth_min_factor),
            ("breakout_atr_multiplier", self.breakout_atr_multiplier),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PatternError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Shortest series that can contain a cup followed by a handle
    pub fn min_series_len(&self) -> usize {
        self.min_cup_duration
            .get()
            .saturating_add(self.min_handle_duration.get())
            .saturating_add(1)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| PatternError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| PatternError::InvalidConfig(e.to_string()))
    }
}

// ============================================================
// PARAMETERS
// ============================================================

static PARAMS: [ParamMeta; 13] = [
    ParamMeta::period(
        "min_cup_duration",
        30.0,
        (20.0, 60.0, 10.0),
        "Shortest cup, as end - start candles",
    ),
    ParamMeta::period(
        "max_cup_duration",
        300.0,
        (100.0, 400.0, 50.0),
        "Longest cup, as end - start candles",
    ),
    ParamMeta::period(
        "min_handle_duration",
        5.0,
        (3.0, 10.0, 1.0),
        "Shortest handle, in candles after the cup end",
    ),
    ParamMeta::period(
        "max_handle_duration",
        50.0,
        (20.0, 80.0, 10.0),
        "Longest handle, in candles after the cup end",
    ),
    ParamMeta::ratio(
        "min_r2",
        0.85,
        (0.70, 0.95, 0.05),
        "Minimum R² of the parabolic cup fit",
    ),
    ParamMeta::ratio(
        "rim_tolerance",
        0.10,
        (0.05, 0.20, 0.05),
        "Maximum rim asymmetry relative to the mean rim",
    ),
    ParamMeta::ratio(
        "handle_retrace_max",
        0.40,
        (0.20, 0.60, 0.10),
        "Maximum handle pullback below resistance, as a share of cup depth",
    ),
    ParamMeta::factor(
        "cup_depth_min_factor",
        2.0,
        (1.0, 4.0, 0.5),
        "Minimum cup depth in average candle sizes",
    ),
    ParamMeta::factor(
        "breakout_atr_multiplier",
        1.5,
        (0.5, 3.0, 0.5),
        "ATR margin a breakout close must clear above the handle high",
    ),
    ParamMeta::period(
        "breakout_window",
        10.0,
        (5.0, 20.0, 5.0),
        "Candles searched for a breakout after the handle",
    ),
    ParamMeta::period("atr_period", 14.0, (7.0, 28.0, 7.0), "ATR lookback"),
    ParamMeta::flag(
        "one_pattern_per_day",
        false,
        "Report at most one valid pattern per cup start day",
    ),
    ParamMeta::count(
        "skip_days_after_pattern",
        1.0,
        (0.0, 7.0, 1.0),
        "Days skipped after a breakout when one_pattern_per_day is on",
    ),
];

impl Parameterized for DetectorConfig {
    fn param_meta() -> &'static [ParamMeta] {
        &PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let defaults = Self::default();
        let map = ParamMap::new(params);

        let dedup = if map.flag("one_pattern_per_day", false) {
            DedupPolicy::OnePerDay {
                skip_days: map.count("skip_days_after_pattern", 1)?,
            }
        } else {
            DedupPolicy::CursorAdvance
        };

        let config = Self {
            min_cup_duration: map.period("min_cup_duration", defaults.min_cup_duration)?,
            max_cup_duration: map.period("max_cup_duration", defaults.max_cup_duration)?,
            min_handle_duration: map.period("min_handle_duration", defaults.min_handle_duration)?,
            max_handle_duration: map.period("max_handle_duration", defaults.max_handle_duration)?,
            min_r2: map.ratio("min_r2", defaults.min_r2)?,
            rim_tolerance: map.ratio("rim_tolerance", defaults.rim_tolerance)?,
            handle_retrace_max: map.ratio("handle_retrace_max", defaults.handle_retrace_max)?,
            cup_depth_min_factor: map
                .factor("cup_depth_min_factor", defaults.cup_depth_min_factor)?,
            breakout_atr_multiplier: map
                .factor("breakout_atr_multiplier", defaults.breakout_atr_multiplier)?,
            breakout_window: map.period("breakout_window", defaults.breakout_window)?,
            atr_period: map.period("atr_period", defaults.atr_period)?,
            dedup,
        };
        config.validate()?;
        Ok(config)
    }
}
