//! Conversion rules as data.
//!
//! A [`ConversionRuleSet`] holds three tables: parameter renames, effect
//! compatibility, and numeric ranges used for clamping. The engine never
//! hard-codes device knowledge; swapping the rule set retargets it.
//!
//! Rule sets can be written in TOML:
//!
//! ```toml
//! [parameters]
//! input_gain = "input_gain"
//! output_level = "master_volume"
//!
//! [effects]
//! overdrive = "overdrive"
//! fuzz = "distortion"
//! wah = "unsupported"
//!
//! [ranges]
//! input_gain = { min = 0.0, max = 100.0 }
//! ```

use crate::error::{Error, Result};
use crate::model::{EffectKind, Value};
use crate::validate::EFFECT_PARAM_RANGES;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Closed numeric interval used for clamping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    /// Lower bound, inclusive
    pub min: f64,
    /// Upper bound, inclusive
    pub max: f64,
}

impl ParamRange {
    /// Creates a range
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Returns true if `v` lies within the range
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    /// Clamps a float: `max(min, min(max, v))`
    pub fn clamp_f64(&self, v: f64) -> f64 {
        self.min.max(self.max.min(v))
    }

    /// Clamps an integer to the integral part of the range
    pub fn clamp_i64(&self, v: i64) -> i64 {
        let lo = self.min.ceil() as i64;
        let hi = self.max.floor() as i64;
        v.min(hi).max(lo)
    }

    /// Clamps numeric values, keeping their type; other values pass through
    pub fn clamp(&self, value: &Value) -> Value {
        match value {
            Value::Integer(i) => Value::Integer(self.clamp_i64(*i)),
            Value::Float(f) => Value::Float(self.clamp_f64(*f)),
            other => other.clone(),
        }
    }
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// What a source effect type becomes on the target device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EffectMapping {
    /// The effect exists on the target, possibly under another type
    Maps(EffectKind),
    /// The target has no equivalent
    Unsupported,
}

const UNSUPPORTED: &str = "unsupported";

impl FromStr for EffectMapping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(Error::config("effect mapping target cannot be empty")),
            UNSUPPORTED => Ok(EffectMapping::Unsupported),
            name => Ok(EffectMapping::Maps(EffectKind::from(name))),
        }
    }
}

impl TryFrom<String> for EffectMapping {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<EffectMapping> for String {
    fn from(mapping: EffectMapping) -> Self {
        match mapping {
            EffectMapping::Maps(kind) => kind.into(),
            EffectMapping::Unsupported => UNSUPPORTED.to_string(),
        }
    }
}

/// Parameter, effect and range tables driving a conversion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionRuleSet {
    /// Source parameter key to target parameter key
    #[serde(default)]
    pub parameters: IndexMap<String, String>,
    /// Source effect type to target effect type
    #[serde(default)]
    pub effects: IndexMap<EffectKind, EffectMapping>,
    /// Target parameter key to allowed range
    #[serde(default)]
    pub ranges: IndexMap<String, ParamRange>,
}

impl ConversionRuleSet {
    /// Creates an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// The GP-5 to GP-50 rules
    pub fn gp5_to_gp50() -> Self {
        let mut rules = Self::new()
            .rename("input_gain", "input_gain")
            .rename("output_level", "output_level")
            .rename("noise_gate_enabled", "noise_gate_enabled")
            .rename("noise_gate_threshold", "noise_gate_threshold");

        for kind in [
            EffectKind::Overdrive,
            EffectKind::Distortion,
            EffectKind::Delay,
            EffectKind::Reverb,
            EffectKind::Chorus,
        ] {
            rules = rules.effect(kind.clone(), kind);
        }

        let schema = ["input_gain", "output_level", "noise_gate_threshold"];
        for key in schema.into_iter().chain(EFFECT_PARAM_RANGES) {
            rules = rules.range(key, 0.0, 100.0);
        }
        rules
    }

    /// Parses a rule set from TOML
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let rules: Self = toml::from_str(text)?;
        for (key, range) in &rules.ranges {
            if range.min > range.max || range.min.is_nan() || range.max.is_nan() {
                return Err(Error::config(format!("range for '{}' is empty: {}", key, range)));
            }
        }
        Ok(rules)
    }

    /// Reads and parses a TOML rule set file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(path)
            } else {
                Error::file_read(path, e)
            }
        })?;
        Self::from_toml_str(&text)
    }

    /// Adds a parameter rename
    pub fn rename(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.parameters.insert(source.into(), target.into());
        self
    }

    /// Adds a supported effect mapping
    pub fn effect(mut self, source: impl Into<EffectKind>, target: impl Into<EffectKind>) -> Self {
        self.effects
            .insert(source.into(), EffectMapping::Maps(target.into()));
        self
    }

    /// Marks an effect type as unsupported on the target
    pub fn unsupported(mut self, source: impl Into<EffectKind>) -> Self {
        self.effects.insert(source.into(), EffectMapping::Unsupported);
        self
    }

    /// Adds a clamping range for a target parameter
    pub fn range(mut self, key: impl Into<String>, min: f64, max: f64) -> Self {
        self.ranges.insert(key.into(), ParamRange::new(min, max));
        self
    }

    /// Target kind for a source effect, `None` when unsupported or unmapped
    pub fn map_effect(&self, kind: &EffectKind) -> Option<&EffectKind> {
        match self.effects.get(kind) {
            Some(EffectMapping::Maps(target)) => Some(target),
            Some(EffectMapping::Unsupported) | None => None,
        }
    }

    /// Clamps `value` if a range is configured for `key`
    pub fn clamp(&self, key: &str, value: &Value) -> Value {
        match self.ranges.get(key) {
            Some(range) => range.clamp(value),
            None => value.clone(),
        }
    }
}
