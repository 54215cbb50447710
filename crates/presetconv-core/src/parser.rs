//! Signature-driven preset parsing.
//!
//! [`FormatParser`] classifies a buffer by its leading signature and
//! dispatches to the matching format's extraction routine. Buffers matching
//! no signature become [`FormatTag::Unrecognized`] models that keep the full
//! payload; only an empty buffer is a hard failure.
//!
//! ## Checksums
//!
//! Integrity checks plug in through [`ChecksumValidator`]. The default
//! [`NoChecksum`] accepts everything; closures work too:
//!
//! ```
//! use presetconv_core::{FormatParser, FormatTag};
//!
//! let parser = FormatParser::new()
//!     .with_checksum(|_tag: FormatTag, data: &[u8]| data.len() % 2 == 0);
//! assert!(parser.parse(b"\x01\x02\x03").is_ok()); // unrecognized, not checked
//! ```

use crate::binary::ByteReader;
use crate::error::{Error, Result};
use crate::layout::{FormatLayout, LayoutRegistry};
use crate::model::{EffectSpec, FormatTag, PresetModel, Value};
use crate::validate::Validator;
use indexmap::IndexMap;
use std::fmt;
use tracing::{debug, trace, warn};

/// Parameter key holding the GP-50 expression pedal assignment
pub const EXPRESSION_PEDAL_KEY: &str = "expression_pedal_assignment";

const FLAG_ENABLED: u8 = 0b01;
const FLAG_BYPASS: u8 = 0b10;

/// Per-format integrity check run before field extraction
pub trait ChecksumValidator: Send + Sync {
    /// Returns true if `data` passes the checksum for `format`
    fn verify(&self, format: FormatTag, data: &[u8]) -> bool;
}

/// Checksum hook that accepts every buffer
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChecksum;

impl ChecksumValidator for NoChecksum {
    fn verify(&self, _format: FormatTag, _data: &[u8]) -> bool {
        true
    }
}

impl<F> ChecksumValidator for F
where
    F: Fn(FormatTag, &[u8]) -> bool + Send + Sync,
{
    fn verify(&self, format: FormatTag, data: &[u8]) -> bool {
        self(format, data)
    }
}

/// Configuration for the parser
#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    /// Fail with [`Error::InvalidModel`] instead of logging validation problems
    pub strict: bool,
}

impl ParserConfig {
    /// Creates a new parser config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets strict validation
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Parses preset buffers into [`PresetModel`]s
pub struct FormatParser {
    registry: LayoutRegistry,
    checksum: Box<dyn ChecksumValidator>,
    config: ParserConfig,
}

impl fmt::Debug for FormatParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatParser")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for FormatParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatParser {
    /// Creates a parser for the built-in formats
    pub fn new() -> Self {
        Self::with_registry(LayoutRegistry::builtin())
    }

    /// Creates a parser for a custom set of layouts
    pub fn with_registry(registry: LayoutRegistry) -> Self {
        Self {
            registry,
            checksum: Box::new(NoChecksum),
            config: ParserConfig::default(),
        }
    }

    /// Installs a checksum hook
    pub fn with_checksum(mut self, checksum: impl ChecksumValidator + 'static) -> Self {
        self.checksum = Box::new(checksum);
        self
    }

    /// Sets the parser configuration
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the registered layouts
    pub fn registry(&self) -> &LayoutRegistry {
        &self.registry
    }

    /// Classifies a buffer without extracting fields
    pub fn detect(&self, data: &[u8]) -> Result<FormatTag> {
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(self
            .registry
            .detect(data)
            .map(|layout| layout.tag)
            .unwrap_or(FormatTag::Unrecognized))
    }

    /// Parses a complete preset buffer
    pub fn parse(&self, data: &[u8]) -> Result<PresetModel> {
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }

        let Some(layout) = self.registry.detect(data) else {
            debug!(
                "no signature matched {} bytes, keeping raw payload",
                data.len()
            );
            return Ok(PresetModel::unrecognized(data.to_vec()));
        };

        debug!("detected {} preset ({} bytes)", layout.tag, data.len());

        if !self.checksum.verify(layout.tag, data) {
            return Err(Error::ChecksumMismatch { format: layout.tag });
        }

        let mut reader = ByteReader::new(data);
        let model = match layout.tag {
            FormatTag::Gp5 => extract_gp5(&mut reader, layout)?,
            FormatTag::Gp50 => extract_gp50(&mut reader, layout)?,
            FormatTag::Unrecognized => {
                return Err(Error::internal("layout registered for the unrecognized format"))
            }
        };

        if !reader.is_empty() {
            debug!(
                "{} trailing bytes after {} preset ignored",
                reader.remaining(),
                layout.tag
            );
        }

        let report = Validator::for_layout(layout).validate(&model);
        if !report.is_valid() {
            if self.config.strict {
                return report.into_result().map(|_| model);
            }
            for violation in &report.violations {
                warn!("{} preset '{}': {}", layout.tag, model.name(), violation);
            }
        }

        Ok(model)
    }

    /// Reads and parses a preset file
    pub fn parse_file(&self, path: impl AsRef<std::path::Path>) -> Result<PresetModel> {
        let data = crate::fsio::read_file(path)?;
        self.parse(&data)
    }
}

fn extract_gp5(reader: &mut ByteReader<'_>, layout: &FormatLayout) -> Result<PresetModel> {
    let (version, name) = read_header(reader, layout)?;
    let parameters = read_parameters(reader, layout)?;
    let effects = read_effects(reader, layout)?;

    Ok(PresetModel::new(layout.tag, version, name)
        .with_parameters(parameters)
        .with_effects(effects))
}

fn extract_gp50(reader: &mut ByteReader<'_>, layout: &FormatLayout) -> Result<PresetModel> {
    let (version, name) = read_header(reader, layout)?;
    let mut parameters = read_parameters(reader, layout)?;
    let effects = read_effects(reader, layout)?;

    if layout.expression_width > 0 {
        let assignment = reader.read_string(layout.expression_width)?;
        if !assignment.is_empty() {
            trace!("expression pedal assigned to '{}'", assignment);
            parameters.insert(EXPRESSION_PEDAL_KEY.to_string(), Value::Text(assignment));
        }
    }

    Ok(PresetModel::new(layout.tag, version, name)
        .with_parameters(parameters)
        .with_effects(effects))
}

fn read_header(reader: &mut ByteReader<'_>, layout: &FormatLayout) -> Result<(String, String)> {
    reader.skip(layout.signature.len())?;
    let version = reader.read_string(layout.version_width)?;
    let name = reader.read_string(layout.name_width)?;
    trace!("header: version '{}', name '{}'", version.trim(), name.trim());
    Ok((version.trim().to_string(), name.trim().to_string()))
}

fn read_parameters(
    reader: &mut ByteReader<'_>,
    layout: &FormatLayout,
) -> Result<IndexMap<String, Value>> {
    let mut parameters = IndexMap::with_capacity(layout.params.len());
    for field in &layout.params {
        let value = field.kind.read(reader, layout.endian)?;
        trace!("parameter {} = {}", field.key, value);
        parameters.insert(field.key.clone(), value);
    }
    Ok(parameters)
}

fn read_effects(reader: &mut ByteReader<'_>, layout: &FormatLayout) -> Result<Vec<EffectSpec>> {
    let count = reader.read_u8()? as usize;
    let mut effects = Vec::with_capacity(count);

    for _ in 0..count {
        let kind = reader.read_string(layout.effect_type_width)?;
        let flags = reader.read_u8()?;
        let param_count = reader.read_u8()?;

        let mut effect = EffectSpec::new(kind.trim())
            .enabled(flags & FLAG_ENABLED != 0)
            .bypass(flags & FLAG_BYPASS != 0);
        for _ in 0..param_count {
            let name = reader.read_string(layout.effect_param_name_width)?;
            let value = reader.read_f32(layout.endian)?;
            effect.params.insert(name, value);
        }

        trace!("effect {} with {} params", effect.kind, effect.params.len());
        effects.push(effect);
    }

    Ok(effects)
}

/// Encodes effect flags the way [`FormatParser`] decodes them
pub(crate) fn effect_flags(effect: &EffectSpec) -> u8 {
    let mut flags = 0;
    if effect.enabled {
        flags |= FLAG_ENABLED;
    }
    if effect.bypass {
        flags |= FLAG_BYPASS;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{ByteWriter, Endian};
    use crate::layout::GP5_SIGNATURE;
    use crate::model::EffectKind;
    use pretty_assertions::assert_eq;

    fn gp5_bytes(name: &str, gain: u8, effects: &[(&str, u8, &[(&str, f32)])]) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_bytes(GP5_SIGNATURE);
        w.write_string("1.0", 16, 0);
        w.write_string(name, 32, 0);
        w.write_u8(gain);
        w.write_u8(60);
        w.write_u8(1);
        w.write_u8(30);
        w.write_u8(effects.len() as u8);
        for (kind, flags, params) in effects {
            w.write_string(kind, 16, 0);
            w.write_u8(*flags);
            w.write_u8(params.len() as u8);
            for (name, value) in params.iter() {
                w.write_string(name, 12, 0);
                w.write_f32(*value, Endian::Little);
            }
        }
        w.into_bytes()
    }

    #[test]
    fn test_parse_gp5() {
        let data = gp5_bytes("Blues", 70, &[("overdrive", 0b01, &[("drive", 35.0)])]);
        let model = FormatParser::new().parse(&data).unwrap();

        assert_eq!(model.format(), FormatTag::Gp5);
        assert_eq!(model.version(), "1.0");
        assert_eq!(model.name(), "Blues");
        assert_eq!(model.parameter("input_gain"), Some(&Value::Integer(70)));
        assert_eq!(model.parameter("noise_gate_enabled"), Some(&Value::Bool(true)));
        assert_eq!(model.effects().len(), 1);
        assert_eq!(model.effects()[0].kind, EffectKind::Overdrive);
        assert!(model.effects()[0].enabled);
        assert!(!model.effects()[0].bypass);
        assert_eq!(model.effects()[0].params["drive"], 35.0);
        assert!(model.raw().is_none());
    }

    #[test]
    fn test_blank_name_becomes_unnamed() {
        let data = gp5_bytes("", 50, &[]);
        let model = FormatParser::new().parse(&data).unwrap();
        assert_eq!(model.name(), crate::model::UNNAMED_PRESET);
    }

    #[test]
    fn test_unknown_effect_is_preserved() {
        let data = gp5_bytes("Odd", 50, &[("unknown_fx", 0b11, &[])]);
        let model = FormatParser::new().parse(&data).unwrap();
        assert_eq!(model.effects()[0].kind, EffectKind::Unknown("unknown_fx".into()));
        assert!(model.effects()[0].bypass);
    }

    #[test]
    fn test_strict_mode_rejects_invalid() {
        let data = gp5_bytes("Hot", 200, &[]);
        assert!(FormatParser::new().parse(&data).is_ok());

        let strict = FormatParser::new().with_config(ParserConfig::new().strict(true));
        assert!(matches!(strict.parse(&data), Err(Error::InvalidModel { .. })));
    }

    #[test]
    fn test_unrecognized_buffer() {
        let data = [0xFFu8; 10];
        let model = FormatParser::new().parse(&data).unwrap();
        assert_eq!(model.format(), FormatTag::Unrecognized);
        assert_eq!(model.raw(), Some(&data[..]));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(FormatParser::new().parse(&[]), Err(Error::EmptyInput)));
        assert!(matches!(FormatParser::new().detect(&[]), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_truncated_preset_is_out_of_bounds() {
        let data = gp5_bytes("Cut", 50, &[("delay", 1, &[("mix", 20.0)])]);
        let err = FormatParser::new().parse(&data[..data.len() - 2]).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { .. }));

        // Signature alone
        let err = FormatParser::new().parse(GP5_SIGNATURE).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { offset: 4, .. }));
    }

    #[test]
    fn test_checksum_hook() {
        let data = gp5_bytes("Sum", 50, &[]);
        let parser = FormatParser::new().with_checksum(|tag: FormatTag, _: &[u8]| tag != FormatTag::Gp5);
        assert!(matches!(
            parser.parse(&data),
            Err(Error::ChecksumMismatch {
                format: FormatTag::Gp5
            })
        ));
    }

    #[test]
    fn test_detect() {
        let parser = FormatParser::new();
        assert_eq!(parser.detect(b"GP50....").unwrap(), FormatTag::Gp50);
        assert_eq!(parser.detect(b"GP5\0....").unwrap(), FormatTag::Gp5);
        assert_eq!(parser.detect(b"RIFF").unwrap(), FormatTag::Unrecognized);
    }
}
