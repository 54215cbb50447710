//! Rule-driven conversion between preset formats.
//!
//! [`ConversionEngine`] maps a source model to a new target model using a
//! [`ConversionRuleSet`]: parameters are renamed and clamped, effects are
//! retyped or dropped. Dropping an effect never fails the conversion; it
//! produces a warning instead. Names are sanitized and chains longer than the
//! target allows are cut, so every converted model is writable.
//!
//! ```
//! use presetconv_core::{ConversionEngine, EffectSpec, FormatTag, PresetModel, Value};
//!
//! let source = PresetModel::new(FormatTag::Gp5, "1.0", "Crunch")
//!     .with_parameter("input_gain", 130i64)
//!     .with_effect(EffectSpec::new("overdrive"))
//!     .with_effect(EffectSpec::new("wah"));
//!
//! let engine = ConversionEngine::gp5_to_gp50();
//! let conversion = engine.convert_with_report(&source)?;
//!
//! assert_eq!(conversion.preset.format(), FormatTag::Gp50);
//! assert_eq!(conversion.preset.parameter("input_gain"), Some(&Value::Integer(100)));
//! assert_eq!(conversion.preset.effects().len(), 1);
//! assert_eq!(conversion.warnings.len(), 1);
//! # Ok::<(), presetconv_core::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::layout::FormatLayout;
use crate::model::{EffectSpec, FormatTag, PresetModel, Value};
use crate::rules::ConversionRuleSet;
use crate::validate::sanitize_name;
use indexmap::IndexMap;
use tracing::{debug, warn};

/// A converted preset together with the compatibility warnings it produced
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// The target-format preset
    pub preset: PresetModel,
    /// One entry per dropped effect
    pub warnings: Vec<String>,
}

impl Conversion {
    /// Returns true if nothing was dropped
    pub fn is_lossless(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Converts presets into one target format
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    rules: ConversionRuleSet,
    target: FormatLayout,
}

impl ConversionEngine {
    /// Creates an engine converting into `target` under `rules`
    pub fn new(rules: ConversionRuleSet, target: FormatLayout) -> Self {
        Self { rules, target }
    }

    /// Engine with the built-in GP-5 to GP-50 rules
    pub fn gp5_to_gp50() -> Self {
        Self::new(ConversionRuleSet::gp5_to_gp50(), FormatLayout::gp50())
    }

    /// Returns the rule set
    pub fn rules(&self) -> &ConversionRuleSet {
        &self.rules
    }

    /// Returns the target layout
    pub fn target(&self) -> &FormatLayout {
        &self.target
    }

    /// Converts `source`, discarding warnings (they are still logged)
    pub fn convert(&self, source: &PresetModel) -> Result<PresetModel> {
        self.convert_with_report(source).map(|c| c.preset)
    }

    /// Converts `source` and reports every dropped effect
    pub fn convert_with_report(&self, source: &PresetModel) -> Result<Conversion> {
        let from = source.format();
        if from == FormatTag::Unrecognized || from == self.target.tag {
            return Err(Error::UnsupportedConversion {
                from,
                to: self.target.tag,
            });
        }

        let mut parameters = IndexMap::new();
        for (key, value) in source.parameters() {
            let Some(target_key) = self.rules.parameters.get(key) else {
                continue;
            };
            let converted = self.rules.clamp(target_key, value);
            if &converted != value {
                debug!("clamped {} from {} to {}", target_key, value, converted);
            }
            parameters.insert(target_key.clone(), converted);
        }

        let mut effects = Vec::with_capacity(source.effects().len());
        let mut warnings = Vec::new();
        for effect in source.effects() {
            match self.rules.map_effect(&effect.kind) {
                Some(target_kind) => effects.push(EffectSpec {
                    kind: target_kind.clone(),
                    enabled: effect.enabled,
                    bypass: effect.bypass,
                    params: effect
                        .params
                        .iter()
                        .map(|(name, &v)| (name.clone(), self.clamp_effect_param(name, v)))
                        .collect(),
                }),
                None => {
                    let warning = unsupported_warning(effect.kind.as_str(), self.target.tag);
                    warn!("{}: {}", source.name(), warning);
                    warnings.push(warning);
                }
            }
        }

        if effects.len() > self.target.max_effects {
            for effect in effects.drain(self.target.max_effects..) {
                let warning = format!(
                    "Effect '{}' dropped: {} supports at most {} effects",
                    effect.kind, self.target.tag, self.target.max_effects
                );
                warn!("{}: {}", source.name(), warning);
                warnings.push(warning);
            }
        }

        let name = sanitize_name(source.name());
        if name != source.name() {
            debug!("renamed '{}' to '{}'", source.name(), name);
        }

        debug!(
            "converted '{}' {} -> {} ({} of {} effects kept)",
            source.name(),
            source.format(),
            self.target.tag,
            effects.len(),
            source.effects().len()
        );

        let preset = PresetModel::new(
            self.target.tag,
            self.target.schema_version.clone(),
            name,
        )
        .with_parameters(parameters)
        .with_effects(effects);

        Ok(Conversion { preset, warnings })
    }

    /// Scans the effect chain for types the target cannot represent
    pub fn check_compatibility(&self, source: &PresetModel) -> (bool, Vec<String>) {
        let warnings: Vec<String> = source
            .effects()
            .iter()
            .filter(|effect| self.rules.map_effect(&effect.kind).is_none())
            .map(|effect| unsupported_warning(effect.kind.as_str(), self.target.tag))
            .collect();

        (warnings.is_empty(), warnings)
    }

    fn clamp_effect_param(&self, name: &str, value: f32) -> f32 {
        match self.rules.clamp(name, &Value::Float(value as f64)) {
            Value::Float(v) => v as f32,
            _ => value,
        }
    }
}

fn unsupported_warning(effect_type: &str, target: FormatTag) -> String {
    format!("Effect '{}' may not be supported in {}", effect_type, target)
}
