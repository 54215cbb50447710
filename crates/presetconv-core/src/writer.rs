//! Preset serialization.
//!
//! [`FormatWriter`] is the structural inverse of [`FormatParser`]: it emits
//! the same fields, in the same order, with the same widths, as the layout
//! table of the model's format describes.
//!
//! [`FormatParser`]: crate::parser::FormatParser

use crate::binary::ByteWriter;
use crate::error::{Error, Result};
use crate::layout::{FormatLayout, LayoutRegistry};
use crate::model::{FormatTag, PresetModel, Value};
use crate::parser::{effect_flags, EXPRESSION_PEDAL_KEY};
use crate::validate::Validator;
use tracing::{debug, trace};

/// Serializes [`PresetModel`]s to their format's byte layout
#[derive(Debug, Clone)]
pub struct FormatWriter {
    registry: LayoutRegistry,
}

impl Default for FormatWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatWriter {
    /// Creates a writer for the built-in formats
    pub fn new() -> Self {
        Self::with_registry(LayoutRegistry::builtin())
    }

    /// Creates a writer for a custom set of layouts
    pub fn with_registry(registry: LayoutRegistry) -> Self {
        Self { registry }
    }

    /// Serializes a preset.
    ///
    /// Unrecognized presets are written back from their raw payload. Other
    /// presets are validated first; every violation is reported at once.
    pub fn write(&self, model: &PresetModel) -> Result<Vec<u8>> {
        let layout = match model.format() {
            FormatTag::Unrecognized => {
                return model
                    .raw()
                    .map(<[u8]>::to_vec)
                    .ok_or(Error::UnsupportedFormat(FormatTag::Unrecognized));
            }
            tag => self
                .registry
                .get(tag)
                .ok_or(Error::UnsupportedFormat(tag))?,
        };

        Validator::for_layout(layout).validate(model).into_result()?;

        let mut writer = ByteWriter::with_capacity(layout.header_len() + 64);
        match layout.tag {
            FormatTag::Gp5 => write_gp5(&mut writer, model, layout)?,
            FormatTag::Gp50 => write_gp50(&mut writer, model, layout)?,
            FormatTag::Unrecognized => {
                return Err(Error::internal("layout registered for the unrecognized format"))
            }
        }

        debug!(
            "serialized {} preset '{}' ({} bytes)",
            layout.tag,
            model.name(),
            writer.tell()
        );
        Ok(writer.into_bytes())
    }
}

fn write_gp5(writer: &mut ByteWriter, model: &PresetModel, layout: &FormatLayout) -> Result<()> {
    write_header(writer, model, layout);
    write_parameters(writer, model, layout)?;
    write_effects(writer, model, layout);
    Ok(())
}

fn write_gp50(writer: &mut ByteWriter, model: &PresetModel, layout: &FormatLayout) -> Result<()> {
    write_header(writer, model, layout);
    write_parameters(writer, model, layout)?;
    write_effects(writer, model, layout);

    if layout.expression_width > 0 {
        let assignment = match model.parameter(EXPRESSION_PEDAL_KEY) {
            Some(Value::Text(target)) => target.as_str(),
            _ => "",
        };
        writer.write_string(assignment, layout.expression_width, 0);
    }
    Ok(())
}

fn write_header(writer: &mut ByteWriter, model: &PresetModel, layout: &FormatLayout) {
    writer.write_bytes(&layout.signature);
    writer.write_string(model.version(), layout.version_width, 0);
    writer.write_string(model.name(), layout.name_width, 0);
}

fn write_parameters(
    writer: &mut ByteWriter,
    model: &PresetModel,
    layout: &FormatLayout,
) -> Result<()> {
    for field in &layout.params {
        let value = model.parameter(&field.key).unwrap_or(&field.default);
        trace!("parameter {} = {}", field.key, value);
        field
            .kind
            .write(writer, value, layout.endian)
            .map_err(|e| match e {
                Error::InvalidModel { violations } => Error::invalid_model(
                    violations
                        .into_iter()
                        .map(|v| format!("parameter '{}': {}", field.key, v))
                        .collect(),
                ),
                other => other,
            })?;
    }
    Ok(())
}

// Chain length and parameter counts are bounded by validation
fn write_effects(writer: &mut ByteWriter, model: &PresetModel, layout: &FormatLayout) {
    let effects = model.effects();
    writer.write_u8(effects.len().min(u8::MAX as usize) as u8);

    for effect in effects.iter().take(u8::MAX as usize) {
        writer.write_string(effect.kind.as_str(), layout.effect_type_width, 0);
        writer.write_u8(effect_flags(effect));
        writer.write_u8(effect.params.len().min(u8::MAX as usize) as u8);
        for (name, value) in effect.params.iter().take(u8::MAX as usize) {
            writer.write_string(name, layout.effect_param_name_width, 0);
            writer.write_f32(*value, layout.endian);
        }
    }
}
