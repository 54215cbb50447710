//! Format-independent preset representation.
//!
//! Every format is parsed into the same [`PresetModel`], tagged with the
//! [`FormatTag`] it came from. Parameters are a typed [`Value`] union kept in
//! insertion order, and the effect chain is an ordered list of [`EffectSpec`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name given to presets whose stored name is missing or blank
pub const UNNAMED_PRESET: &str = "Unnamed Preset";

/// Name given to buffers that match no known format
pub const UNKNOWN_PRESET: &str = "Unknown Preset";

/// Known preset formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    /// GP-5 presets (conversion source)
    Gp5,
    /// GP-50 presets (conversion target)
    Gp50,
    /// A non-empty buffer that matched no registered signature
    Unrecognized,
}

impl FormatTag {
    /// Returns the display name of the format
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::Gp5 => "GP5",
            FormatTag::Gp50 => "GP50",
            FormatTag::Unrecognized => "UNKNOWN",
        }
    }

    /// Returns the conventional file extension, without the dot
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            FormatTag::Gp5 => Some("gp5"),
            FormatTag::Gp50 => Some("gp50"),
            FormatTag::Unrecognized => None,
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean switch
    Bool(bool),
    /// Integral value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Nested list of values
    List(Vec<Value>),
}

impl Value {
    /// Returns the value as a float if it is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value as a bool if it is boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns true for integers and floats
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Short type name used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "\"{}\"", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Effect kinds understood by the supported devices
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    /// Overdrive
    Overdrive,
    /// Distortion
    Distortion,
    /// Fuzz
    Fuzz,
    /// Clean boost
    Boost,
    /// Delay
    Delay,
    /// Reverb
    Reverb,
    /// Chorus
    Chorus,
    /// Flanger
    Flanger,
    /// Phaser
    Phaser,
    /// Tremolo
    Tremolo,
    /// Compressor
    Compressor,
    /// Equalizer
    Eq,
    /// Wah
    Wah,
    /// Amplifier simulation
    AmpSim,
    /// Cabinet simulation
    Cabinet,
    /// Noise gate
    NoiseGate,
    /// A type name outside the known set, kept verbatim
    Unknown(String),
}

impl EffectKind {
    /// All known effect kinds, in code order
    pub const KNOWN: [EffectKind; 16] = [
        EffectKind::Overdrive,
        EffectKind::Distortion,
        EffectKind::Fuzz,
        EffectKind::Boost,
        EffectKind::Delay,
        EffectKind::Reverb,
        EffectKind::Chorus,
        EffectKind::Flanger,
        EffectKind::Phaser,
        EffectKind::Tremolo,
        EffectKind::Compressor,
        EffectKind::Eq,
        EffectKind::Wah,
        EffectKind::AmpSim,
        EffectKind::Cabinet,
        EffectKind::NoiseGate,
    ];

    /// Returns the snake_case type name
    pub fn as_str(&self) -> &str {
        match self {
            EffectKind::Overdrive => "overdrive",
            EffectKind::Distortion => "distortion",
            EffectKind::Fuzz => "fuzz",
            EffectKind::Boost => "boost",
            EffectKind::Delay => "delay",
            EffectKind::Reverb => "reverb",
            EffectKind::Chorus => "chorus",
            EffectKind::Flanger => "flanger",
            EffectKind::Phaser => "phaser",
            EffectKind::Tremolo => "tremolo",
            EffectKind::Compressor => "compressor",
            EffectKind::Eq => "eq",
            EffectKind::Wah => "wah",
            EffectKind::AmpSim => "amp_sim",
            EffectKind::Cabinet => "cabinet",
            EffectKind::NoiseGate => "noise_gate",
            EffectKind::Unknown(name) => name,
        }
    }

    /// Returns true unless this is [`EffectKind::Unknown`]
    pub fn is_known(&self) -> bool {
        !matches!(self, EffectKind::Unknown(_))
    }
}

impl FromStr for EffectKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::KNOWN
            .iter()
            .find(|kind| kind.as_str() == s)
            .cloned()
            .unwrap_or_else(|| EffectKind::Unknown(s.to_string())))
    }
}

impl From<&str> for EffectKind {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<String> for EffectKind {
    fn from(s: String) -> Self {
        EffectKind::from(s.as_str())
    }
}

impl From<EffectKind> for String {
    fn from(kind: EffectKind) -> Self {
        kind.as_str().to_string()
    }
}

impl Serialize for EffectKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EffectKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(EffectKind::from)
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage of an effect chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    /// Effect type
    pub kind: EffectKind,
    /// Whether the stage is switched on
    pub enabled: bool,
    /// Whether the stage is bypassed
    pub bypass: bool,
    /// Type-specific numeric parameters, stored at wire precision
    pub params: IndexMap<String, f32>,
}

impl EffectSpec {
    /// Creates an enabled, non-bypassed effect with no parameters
    pub fn new(kind: impl Into<EffectKind>) -> Self {
        Self {
            kind: kind.into(),
            enabled: true,
            bypass: false,
            params: IndexMap::new(),
        }
    }

    /// Adds a numeric parameter
    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Sets the enabled flag
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the bypass flag
    pub fn bypass(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }
}

/// Generic preset representation shared by all formats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetModel {
    format: FormatTag,
    version: String,
    name: String,
    parameters: IndexMap<String, Value>,
    effects: Vec<EffectSpec>,
    raw: Option<Vec<u8>>,
}

impl PresetModel {
    /// Creates a preset; a blank name becomes [`UNNAMED_PRESET`]
    pub fn new(format: FormatTag, version: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            format,
            version: version.into(),
            name: normalize_name(name.into()),
            parameters: IndexMap::new(),
            effects: Vec::new(),
            raw: None,
        }
    }

    /// Creates the model for a buffer that matched no known format
    pub fn unrecognized(raw: Vec<u8>) -> Self {
        Self {
            raw: Some(raw),
            ..Self::new(FormatTag::Unrecognized, "", UNKNOWN_PRESET)
        }
    }

    /// Adds or replaces a parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Replaces all parameters
    pub fn with_parameters(mut self, parameters: IndexMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Appends an effect to the chain
    pub fn with_effect(mut self, effect: EffectSpec) -> Self {
        self.effects.push(effect);
        self
    }

    /// Replaces the effect chain
    pub fn with_effects(mut self, effects: Vec<EffectSpec>) -> Self {
        self.effects = effects;
        self
    }

    /// Attaches the raw payload
    pub fn with_raw(mut self, raw: Vec<u8>) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Returns the format tag
    pub fn format(&self) -> FormatTag {
        self.format
    }

    /// Returns the version string
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the preset name, never empty
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns all parameters in order
    pub fn parameters(&self) -> &IndexMap<String, Value> {
        &self.parameters
    }

    /// Looks up a parameter
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    /// Returns the effect chain
    pub fn effects(&self) -> &[EffectSpec] {
        &self.effects
    }

    /// Returns the raw payload, if kept
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }
}

fn normalize_name(name: String) -> String {
    if name.trim().is_empty() {
        UNNAMED_PRESET.to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_is_normalized() {
        assert_eq!(PresetModel::new(FormatTag::Gp5, "1.0", "").name(), UNNAMED_PRESET);
        assert_eq!(PresetModel::new(FormatTag::Gp5, "1.0", "   ").name(), UNNAMED_PRESET);
        assert_eq!(PresetModel::new(FormatTag::Gp5, "1.0", "Lead").name(), "Lead");
    }

    #[test]
    fn test_unrecognized_keeps_payload() {
        let model = PresetModel::unrecognized(vec![0xFF; 3]);
        assert_eq!(model.format(), FormatTag::Unrecognized);
        assert_eq!(model.raw(), Some(&[0xFF, 0xFF, 0xFF][..]));
        assert_eq!(model.name(), UNKNOWN_PRESET);
    }

    #[test]
    fn test_effect_kind_names() {
        for kind in EffectKind::KNOWN.iter() {
            assert_eq!(&EffectKind::from(kind.as_str()), kind);
        }
        let unknown = EffectKind::from("unknown_fx");
        assert_eq!(unknown, EffectKind::Unknown("unknown_fx".into()));
        assert!(!unknown.is_known());
        assert_eq!(unknown.to_string(), "unknown_fx");
    }

    #[test]
    fn test_parameters_keep_insertion_order() {
        let model = PresetModel::new(FormatTag::Gp50, "1.0", "Order")
            .with_parameter("output_level", 10i64)
            .with_parameter("input_gain", 20i64);
        let keys: Vec<_> = model.parameters().keys().cloned().collect();
        assert_eq!(keys, vec!["output_level", "input_gain"]);
    }

    #[test]
    fn test_value_helpers() {
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Value::Bool(true).as_f64(), None);
        assert!(Value::Float(1.5).is_numeric());
        assert_eq!(Value::List(vec![1i64.into(), "x".into()]).to_string(), "[1, \"x\"]");
    }
}
