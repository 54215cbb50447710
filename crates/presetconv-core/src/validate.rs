//! Preset validation.
//!
//! The [`Validator`] checks a model against a format layout and collects
//! every violation instead of stopping at the first one, so callers can report
//! everything wrong with a preset at once.

use crate::error::{Error, Result};
use crate::layout::FormatLayout;
use crate::model::{PresetModel, UNNAMED_PRESET};
use crate::rules::ParamRange;

/// Longest accepted preset name, in characters
pub const MAX_NAME_CHARS: usize = 64;

/// Characters that may not appear in preset names
pub const INVALID_NAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Effect parameters with a fixed 0..=100 range on every format
pub const EFFECT_PARAM_RANGES: [&str; 13] = [
    "mix", "level", "drive", "tone", "gain", "feedback", "rate", "depth", "bass", "mid",
    "treble", "presence", "master",
];

/// Outcome of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Every violation found, in check order
    pub violations: Vec<String>,
}

impl ValidationReport {
    /// Returns true if nothing was flagged
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Converts the report into `Err(Error::InvalidModel)` when anything was flagged
    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::invalid_model(self.violations))
        }
    }

    fn push(&mut self, violation: String) {
        self.violations.push(violation);
    }
}

/// Checks presets against one format layout
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    layout: &'a FormatLayout,
}

impl<'a> Validator<'a> {
    /// Creates a validator for `layout`
    pub fn for_layout(layout: &'a FormatLayout) -> Self {
        Self { layout }
    }

    /// Runs every check and collects the violations
    pub fn validate(&self, model: &PresetModel) -> ValidationReport {
        let mut report = ValidationReport::default();

        if let Err(e) = validate_name(model.name()) {
            report.push(e);
        }
        self.check_parameters(model, &mut report);
        self.check_effects(model, &mut report);

        report
    }

    fn check_parameters(&self, model: &PresetModel, report: &mut ValidationReport) {
        for (key, value) in model.parameters() {
            // Keys outside the schema are not encoded, so nothing to check
            let Some(field) = self.layout.field(key) else {
                continue;
            };

            if !field.kind.accepts(value) {
                report.push(format!(
                    "parameter '{}' must be {:?}, got {} {}",
                    key,
                    field.kind,
                    value.type_name(),
                    value
                ));
                continue;
            }

            if let (Some(range), Some(v)) = (field.range, value.as_f64()) {
                if !range.contains(v) {
                    report.push(format!(
                        "parameter '{}' must be between {} and {}, got {}",
                        key, range.min, range.max, value
                    ));
                }
            }
        }
    }

    fn check_effects(&self, model: &PresetModel, report: &mut ValidationReport) {
        let effects = model.effects();
        if effects.len() > self.layout.max_effects {
            report.push(format!(
                "effect chain has {} effects, {} supports at most {}",
                effects.len(),
                self.layout.tag,
                self.layout.max_effects
            ));
        }

        let common = ParamRange::new(0.0, 100.0);
        for (i, effect) in effects.iter().enumerate() {
            if effect.kind.as_str().trim().is_empty() {
                report.push(format!("effect {}: missing effect type", i));
            } else if !effect.kind.is_known() {
                report.push(format!("effect {}: unknown effect type: {}", i, effect.kind));
            }

            if effect.params.len() > u8::MAX as usize {
                report.push(format!(
                    "effect {}: {} parameters exceed the limit of {}",
                    i,
                    effect.params.len(),
                    u8::MAX
                ));
            }

            for (name, &value) in &effect.params {
                if name.is_empty() {
                    report.push(format!("effect {}: parameter with empty name", i));
                } else if EFFECT_PARAM_RANGES.contains(&name.as_str())
                    && !common.contains(value as f64)
                {
                    report.push(format!(
                        "effect {}: parameter '{}' must be between {} and {}, got {}",
                        i, name, common.min, common.max, value
                    ));
                }
            }
        }
    }
}

/// Checks a preset name, returning the first problem found
pub fn validate_name(name: &str) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err("preset name cannot be empty".to_string());
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(format!(
            "preset name too long (maximum {} characters)",
            MAX_NAME_CHARS
        ));
    }
    if let Some(c) = name.chars().find(|c| INVALID_NAME_CHARS.contains(c)) {
        return Err(format!("preset name contains invalid character: {}", c));
    }
    Ok(())
}

/// Replaces invalid characters with `_`, truncates, and fills in blank names
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if INVALID_NAME_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_NAME_CHARS)
        .collect();

    if sanitized.trim().is_empty() {
        UNNAMED_PRESET.to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EffectSpec, FormatTag, Value};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_preset() {
        let layout = FormatLayout::gp50();
        let model = PresetModel::new(FormatTag::Gp50, "1.0", "Clean")
            .with_parameter("input_gain", 40i64)
            .with_effect(EffectSpec::new("reverb").with_param("mix", 25.0));
        assert!(Validator::for_layout(&layout).validate(&model).is_valid());
    }

    #[test]
    fn test_collects_every_violation() {
        let layout = FormatLayout::gp5();
        let model = PresetModel::new(FormatTag::Gp5, "1.0", "Bad:Name")
            .with_parameter("input_gain", 140i64)
            .with_parameter("noise_gate_enabled", Value::Integer(1))
            .with_effect(EffectSpec::new("unknown_fx"))
            .with_effect(EffectSpec::new("delay").with_param("feedback", 120.0));

        let report = Validator::for_layout(&layout).validate(&model);
        assert_eq!(
            report.violations,
            vec![
                "preset name contains invalid character: :".to_string(),
                "parameter 'input_gain' must be between 0 and 100, got 140".to_string(),
                "parameter 'noise_gate_enabled' must be Bool, got integer 1".to_string(),
                "effect 0: unknown effect type: unknown_fx".to_string(),
                "effect 1: parameter 'feedback' must be between 0 and 100, got 120".to_string(),
            ]
        );

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, Error::InvalidModel { ref violations } if violations.len() == 5));
    }

    #[test]
    fn test_effect_chain_length() {
        let layout = FormatLayout::gp5();
        let effects = vec![EffectSpec::new("chorus"); layout.max_effects + 1];
        let model = PresetModel::new(FormatTag::Gp5, "1.0", "Busy").with_effects(effects);
        let report = Validator::for_layout(&layout).validate(&model);
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].contains("at most 8"));
    }

    #[test]
    fn test_unknown_parameters_are_ignored() {
        let layout = FormatLayout::gp5();
        let model = PresetModel::new(FormatTag::Gp5, "1.0", "Future")
            .with_parameter("expression_curve", "log");
        assert!(Validator::for_layout(&layout).validate(&model).is_valid());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Lead 1").is_ok());
        assert!(validate_name("  ").is_err());
        assert!(validate_name(&"x".repeat(65)).is_err());
        assert!(validate_name("a|b").is_err());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("AC/DC: Back"), "AC_DC_ Back");
        assert_eq!(sanitize_name(""), UNNAMED_PRESET);
        assert_eq!(sanitize_name(&"y".repeat(80)).len(), 64);
    }
}
