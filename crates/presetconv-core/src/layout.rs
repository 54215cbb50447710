//! Per-format byte layout tables.
//!
//! A [`FormatLayout`] describes everything the parser and writer need to know
//! about one format: its signature, byte order, field widths, the parameter
//! schema in wire order, and the schema version written into new presets.
//! Layouts are plain data and can be loaded from TOML, so supporting a new
//! device revision means supplying a new table rather than new code paths.
//!
//! ## Wire layout
//!
//! ```text
//! signature                [signature.len()]
//! version                  [version_width]            NUL padded
//! name                     [name_width]               NUL padded
//! parameters               schema order, per-kind width
//! effect count             u8
//! effect * count
//!   type                   [effect_type_width]        NUL padded
//!   flags                  u8 (bit 0 enabled, bit 1 bypass)
//!   param count            u8
//!   param * count
//!     name                 [effect_param_name_width]  NUL padded
//!     value                f32
//! expression assignment    [expression_width]         only when non-zero
//! ```
//!
//! The built-in offsets and widths are placeholders, not the byte layout of
//! any physical unit.

use crate::binary::{ByteReader, ByteWriter, Endian};
use crate::error::{Error, Result};
use crate::model::{FormatTag, Value};
use crate::rules::ParamRange;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Signature of GP-5 presets
pub const GP5_SIGNATURE: &[u8; 4] = b"GP5\0";

/// Signature of GP-50 presets
pub const GP50_SIGNATURE: &[u8; 4] = b"GP50";

/// Wire encoding of a schema parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Unsigned byte
    U8,
    /// Signed byte
    I8,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 16-bit integer
    I16,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 32-bit integer
    I32,
    /// 32-bit float
    F32,
    /// Single byte, zero is false
    Bool,
}

impl FieldKind {
    /// Encoded width in bytes
    pub fn width(&self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::I8 | FieldKind::Bool => 1,
            FieldKind::U16 | FieldKind::I16 => 2,
            FieldKind::U32 | FieldKind::I32 | FieldKind::F32 => 4,
        }
    }

    /// Inclusive range representable by an integer kind
    pub fn integer_bounds(&self) -> Option<(i64, i64)> {
        match self {
            FieldKind::U8 => Some((0, u8::MAX as i64)),
            FieldKind::I8 => Some((i8::MIN as i64, i8::MAX as i64)),
            FieldKind::U16 => Some((0, u16::MAX as i64)),
            FieldKind::I16 => Some((i16::MIN as i64, i16::MAX as i64)),
            FieldKind::U32 => Some((0, u32::MAX as i64)),
            FieldKind::I32 => Some((i32::MIN as i64, i32::MAX as i64)),
            FieldKind::F32 | FieldKind::Bool => None,
        }
    }

    /// Returns true if `value` has a type this kind can encode
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::Bool => matches!(value, Value::Bool(_)),
            _ => value.is_numeric(),
        }
    }

    /// Reads one value of this kind
    pub fn read(&self, reader: &mut ByteReader<'_>, endian: Endian) -> Result<Value> {
        Ok(match self {
            FieldKind::U8 => Value::Integer(reader.read_u8()? as i64),
            FieldKind::I8 => Value::Integer(reader.read_i8()? as i64),
            FieldKind::U16 => Value::Integer(reader.read_u16(endian)? as i64),
            FieldKind::I16 => Value::Integer(reader.read_i16(endian)? as i64),
            FieldKind::U32 => Value::Integer(reader.read_u32(endian)? as i64),
            FieldKind::I32 => Value::Integer(reader.read_i32(endian)? as i64),
            FieldKind::F32 => Value::Float(reader.read_f32(endian)? as f64),
            FieldKind::Bool => Value::Bool(reader.read_u8()? != 0),
        })
    }

    /// Writes `value` as this kind.
    ///
    /// Floats written to integer kinds are rounded. Values of the wrong type
    /// or outside the integer width are rejected.
    pub fn write(&self, writer: &mut ByteWriter, value: &Value, endian: Endian) -> Result<()> {
        if let FieldKind::Bool = self {
            let flag = value.as_bool().ok_or_else(|| self.mismatch(value))?;
            writer.write_u8(flag as u8);
            return Ok(());
        }

        let number = value.as_f64().ok_or_else(|| self.mismatch(value))?;
        if let FieldKind::F32 = self {
            writer.write_f32(number as f32, endian);
            return Ok(());
        }

        let integer = match value {
            Value::Integer(i) => *i,
            _ => number.round() as i64,
        };
        let (lo, hi) = self.integer_bounds().unwrap_or((i64::MIN, i64::MAX));
        if integer < lo || integer > hi {
            return Err(Error::invalid_model(vec![format!(
                "value {} does not fit {:?} ({}..={})",
                integer, self, lo, hi
            )]));
        }

        match self {
            FieldKind::U8 => writer.write_u8(integer as u8),
            FieldKind::I8 => writer.write_i8(integer as i8),
            FieldKind::U16 => writer.write_u16(integer as u16, endian),
            FieldKind::I16 => writer.write_i16(integer as i16, endian),
            FieldKind::U32 => writer.write_u32(integer as u32, endian),
            FieldKind::I32 => writer.write_i32(integer as i32, endian),
            FieldKind::F32 | FieldKind::Bool => return Err(self.mismatch(value)),
        }
        Ok(())
    }

    fn mismatch(&self, value: &Value) -> Error {
        Error::invalid_model(vec![format!(
            "cannot encode {} value {} as {:?}",
            value.type_name(),
            value,
            self
        )])
    }
}

/// One parameter of a format's schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamField {
    /// Parameter key in the model
    pub key: String,
    /// Wire encoding
    pub kind: FieldKind,
    /// Value written when the model lacks this key
    pub default: Value,
    /// Valid range for numeric parameters
    #[serde(default)]
    pub range: Option<ParamRange>,
}

impl ParamField {
    /// Creates a schema field
    pub fn new(key: impl Into<String>, kind: FieldKind, default: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            kind,
            default: default.into(),
            range: None,
        }
    }

    /// Sets the valid range
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(ParamRange::new(min, max));
        self
    }
}

/// Byte layout of one preset format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatLayout {
    /// Format this table describes
    pub tag: FormatTag,
    /// Fixed bytes at offset 0
    pub signature: Vec<u8>,
    /// Byte order of multi-byte fields
    #[serde(default)]
    pub endian: Endian,
    /// Width of the version string field
    pub version_width: usize,
    /// Width of the name field
    pub name_width: usize,
    /// Version written into presets of this format
    pub schema_version: String,
    /// Parameters in wire order
    pub params: Vec<ParamField>,
    /// Maximum effect chain length
    pub max_effects: usize,
    /// Width of an effect's type name
    pub effect_type_width: usize,
    /// Width of an effect parameter's name
    pub effect_param_name_width: usize,
    /// Width of the trailing expression-pedal assignment (0 = absent)
    #[serde(default)]
    pub expression_width: usize,
}

impl FormatLayout {
    /// Built-in GP-5 layout
    pub fn gp5() -> Self {
        Self {
            tag: FormatTag::Gp5,
            signature: GP5_SIGNATURE.to_vec(),
            endian: Endian::Little,
            version_width: 16,
            name_width: 32,
            schema_version: "1.0".to_string(),
            params: common_params(),
            max_effects: 8,
            effect_type_width: 16,
            effect_param_name_width: 12,
            expression_width: 0,
        }
    }

    /// Built-in GP-50 layout
    pub fn gp50() -> Self {
        Self {
            tag: FormatTag::Gp50,
            signature: GP50_SIGNATURE.to_vec(),
            max_effects: 10,
            expression_width: 16,
            ..Self::gp5()
        }
    }

    /// Parses a layout table from TOML
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let layout: Self = toml::from_str(text)?;
        layout.check()?;
        Ok(layout)
    }

    /// Looks up a schema field by key
    pub fn field(&self, key: &str) -> Option<&ParamField> {
        self.params.iter().find(|f| f.key == key)
    }

    /// Size of the fixed header (signature, version, name, parameters)
    pub fn header_len(&self) -> usize {
        self.signature.len()
            + self.version_width
            + self.name_width
            + self.params.iter().map(|f| f.kind.width()).sum::<usize>()
    }

    /// Returns true if `data` starts with this layout's signature
    pub fn matches(&self, data: &[u8]) -> bool {
        data.starts_with(&self.signature)
    }

    fn check(&self) -> Result<()> {
        if self.tag == FormatTag::Unrecognized {
            return Err(Error::config("a layout cannot describe the unrecognized format"));
        }
        if self.signature.is_empty() {
            return Err(Error::config(format!("{} layout has an empty signature", self.tag)));
        }
        for field in &self.params {
            if !field.kind.accepts(&field.default) {
                return Err(Error::config(format!(
                    "default of '{}' is a {}, not {:?}",
                    field.key,
                    field.default.type_name(),
                    field.kind
                )));
            }
        }
        Ok(())
    }
}

fn common_params() -> Vec<ParamField> {
    vec![
        ParamField::new("input_gain", FieldKind::U8, 50i64).range(0.0, 100.0),
        ParamField::new("output_level", FieldKind::U8, 50i64).range(0.0, 100.0),
        ParamField::new("noise_gate_enabled", FieldKind::Bool, false),
        ParamField::new("noise_gate_threshold", FieldKind::U8, 30i64).range(0.0, 100.0),
    ]
}

/// Registered layouts in detection priority order
#[derive(Debug, Clone, Default)]
pub struct LayoutRegistry {
    layouts: Vec<FormatLayout>,
}

impl LayoutRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the GP-5 and GP-50 layouts, in that order
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for layout in [FormatLayout::gp5(), FormatLayout::gp50()] {
            // The built-in signatures are distinct and non-prefixing
            if let Err(e) = registry.register(layout) {
                debug!("skipping built-in layout: {}", e);
            }
        }
        registry
    }

    /// Adds a layout at the lowest priority.
    ///
    /// Rejects layouts whose format is already registered or whose signature
    /// is a prefix of (or prefixed by) a registered signature.
    pub fn register(&mut self, layout: FormatLayout) -> Result<()> {
        layout.check()?;

        for existing in &self.layouts {
            let overlap = existing.signature.starts_with(&layout.signature)
                || layout.signature.starts_with(&existing.signature);
            if existing.tag == layout.tag || overlap {
                return Err(Error::LayoutConflict {
                    format: layout.tag,
                    existing: existing.tag,
                });
            }
        }

        debug!(
            "registered {} layout (signature {:02X?})",
            layout.tag, layout.signature
        );
        self.layouts.push(layout);
        Ok(())
    }

    /// Replaces the layout registered for the same format
    pub fn replace(&mut self, layout: FormatLayout) -> Result<()> {
        let previous = self.layouts.iter().position(|l| l.tag == layout.tag);
        let removed = previous.map(|i| self.layouts.remove(i));

        match self.register(layout) {
            Ok(()) => Ok(()),
            Err(e) => {
                if let (Some(i), Some(old)) = (previous, removed) {
                    self.layouts.insert(i, old);
                }
                Err(e)
            }
        }
    }

    /// Returns the first layout whose signature matches `data`
    pub fn detect(&self, data: &[u8]) -> Option<&FormatLayout> {
        self.layouts.iter().find(|layout| layout.matches(data))
    }

    /// Returns the layout registered for `tag`
    pub fn get(&self, tag: FormatTag) -> Option<&FormatLayout> {
        self.layouts.iter().find(|layout| layout.tag == tag)
    }

    /// Iterates layouts in priority order
    pub fn iter(&self) -> impl Iterator<Item = &FormatLayout> {
        self.layouts.iter()
    }
}
