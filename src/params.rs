//! Tunable parameters of the detector
//!
//! [`DetectorConfig`](crate::config::DetectorConfig) publishes one [`ParamMeta`] per option.
//! The CLI prints them (`cuphandle params`), sweeps walk their [`SweepRange`], and
//! [`Parameterized::with_params`] builds a configuration from a flat `name -> value` map.
//!
//! # Example
//!
//! ```rust
//! use cuphandle::params::Parameterized;
//! use cuphandle::prelude::*;
//!
//! for meta in DetectorConfig::param_meta() {
//!     let grid = meta.grid();
//!     println!("{} ({:?}): {} values to try", meta.name, meta.param_type, grid.len());
//! }
//! ```

use std::collections::HashMap;

use crate::{PatternError, Period, Ratio, Result};

// ============================================================
// METADATA
// ============================================================

/// Kind of value a parameter holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Share in 0.0..=1.0
  Ratio,
  /// Candle count, at least 1
  Period,
  /// Integer, zero allowed
  Count,
  /// Non-negative multiplier
  Factor,
  /// 0.0 = off, 1.0 = on
  Flag,
}

/// Inclusive sweep `min..=max` in increments of `step`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRange {
  pub min: f64,
  pub max: f64,
  pub step: f64,
}

impl SweepRange {
  pub const fn new(min: f64, max: f64, step: f64) -> Self {
    Self { min, max, step }
  }

  #[inline]
  pub fn contains(&self, value: f64) -> bool {
    (self.min..=self.max).contains(&value)
  }

  /// Points of the sweep. A non-positive step yields `min` only.
  pub fn values(&self) -> Vec<f64> {
    if self.step <= 0.0 || self.step.is_nan() {
      return vec![self.min];
    }
    // Tolerance so that 0.3 + 2 * 0.2 still counts as <= 0.7
    let last = self.max + self.step * 1e-9;
    (0u32..)
      .map(|i| self.min + self.step * f64::from(i))
      .take_while(|v| *v <= last)
      .collect()
  }
}

/// Description of one configuration option
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Key in parameter maps and TOML files
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  pub sweep: SweepRange,
  pub description: &'static str,
}

impl ParamMeta {
  const fn new(
    name: &'static str,
    param_type: ParamType,
    default: f64,
    (min, max, step): (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self {
      name,
      param_type,
      default,
      sweep: SweepRange::new(min, max, step),
      description,
    }
  }

  pub const fn ratio(
    name: &'static str,
    default: f64,
    sweep: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self::new(name, ParamType::Ratio, default, sweep, description)
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    sweep: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self::new(name, ParamType::Period, default, sweep, description)
  }

  pub const fn count(
    name: &'static str,
    default: f64,
    sweep: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self::new(name, ParamType::Count, default, sweep, description)
  }

  pub const fn factor(
    name: &'static str,
    default: f64,
    sweep: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self::new(name, ParamType::Factor, default, sweep, description)
  }

  pub const fn flag(name: &'static str, default: bool, description: &'static str) -> Self {
    let default = if default { 1.0 } else { 0.0 };
    Self::new(name, ParamType::Flag, default, (0.0, 1.0, 1.0), description)
  }

  /// Values tried by a grid search
  pub fn grid(&self) -> Vec<f64> {
    self.sweep.values()
  }

  /// Check that `value` is inside the sweep range and fits the parameter type
  pub fn check(&self, value: f64) -> Result<()> {
    if value.is_nan() || value.is_infinite() {
      return Err(PatternError::InvalidValue("parameter value must be finite"));
    }
    if !self.sweep.contains(value) {
      return Err(PatternError::OutOfRange {
        field: self.name,
        value,
        min: self.sweep.min,
        max: self.sweep.max,
      });
    }
    let whole = value.fract() == 0.0;
    match self.param_type {
      ParamType::Period if !whole || value < 1.0 => {
        Err(PatternError::InvalidValue("period must be a whole number of at least 1"))
      },
      ParamType::Count if !whole || value < 0.0 => {
        Err(PatternError::InvalidValue("count must be a whole non-negative number"))
      },
      ParamType::Flag if value != 0.0 && value != 1.0 => {
        Err(PatternError::InvalidValue("flag must be 0 or 1"))
      },
      _ => Ok(()),
    }
  }
}

// ============================================================
// PARAMETERIZED TRAIT
// ============================================================

/// Types configurable from a flat parameter map
pub trait Parameterized: Sized {
  fn param_meta() -> &'static [ParamMeta];

  /// Keys absent from `params` keep their default
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;
}

// ============================================================
// TYPED LOOKUP
// ============================================================

/// Typed reads from a parameter map, falling back to defaults
#[derive(Debug, Clone, Copy)]
pub struct ParamMap<'a, 'k> {
  values: &'a HashMap<&'k str, f64>,
}

impl<'a, 'k> ParamMap<'a, 'k> {
  pub fn new(values: &'a HashMap<&'k str, f64>) -> Self {
    Self { values }
  }

  fn raw(&self, key: &str) -> Option<f64> {
    self.values.get(key).copied()
  }

  pub fn ratio(&self, key: &str, default: Ratio) -> Result<Ratio> {
    self.raw(key).map_or(Ok(default), Ratio::new)
  }

  pub fn period(&self, key: &str, default: Period) -> Result<Period> {
    match self.raw(key) {
      None => Ok(default),
      Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Period::new(v as usize),
      Some(_) => Err(PatternError::InvalidValue("period must be a whole number of at least 1")),
    }
  }

  pub fn count(&self, key: &str, default: u32) -> Result<u32> {
    match self.raw(key) {
      None => Ok(default),
      Some(v) if (0.0..=f64::from(u32::MAX)).contains(&v) && v.fract() == 0.0 => Ok(v as u32),
      Some(_) => Err(PatternError::InvalidValue("count must be a whole non-negative number")),
    }
  }

  pub fn factor(&self, key: &str, default: f64) -> Result<f64> {
    match self.raw(key) {
      None => Ok(default),
      Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
      Some(_) => Err(PatternError::InvalidValue("factor must be finite and non-negative")),
    }
  }

  /// Any non-zero value switches the flag on
  pub fn flag(&self, key: &str, default: bool) -> bool {
    self.raw(key).map_or(default, |v| v != 0.0)
  }
}
