use std::fmt::Display;

use four_cc::FourCC;

use super::{Parameter, ParameterType, ParameterValueUpdate};

// -------------------------------------------------------------------------------------------------

/// A boolean parameter descriptor.
#[derive(Debug, Clone)]
pub struct BooleanParameter {
    id: FourCC,
    name: &'static str,
    default: bool,
}

impl BooleanParameter {
    /// Create a new boolean parameter descriptor.
    pub const fn new(id: FourCC, name: &'static str, default: bool) -> Self {
        Self { id, name, default }
    }

    /// The parameter's default plain value.
    pub const fn default_value(&self) -> bool {
        self.default
    }

    /// Normalize the given plain value to a 0.0-1.0 range.
    pub const fn normalize_value(&self, value: bool) -> f32 {
        if value {
            1.0
        } else {
            0.0
        }
    }

    /// Denormalize a 0.0-1.0 ranged value to the corresponding plain value.
    pub fn denormalize_value(&self, normalized: f32) -> bool {
        debug_assert!((0.0..=1.0).contains(&normalized));
        normalized >= 0.5
    }
}

impl Parameter for BooleanParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Boolean {
            default: self.default,
        }
    }

    fn default_value(&self) -> f32 {
        self.normalize_value(self.default)
    }

    fn value_to_string(&self, normalized: f32, _include_unit: bool) -> String {
        if self.denormalize_value(normalized.clamp(0.0, 1.0)) {
            "ON".to_string()
        } else {
            "OFF".to_string()
        }
    }

    fn string_to_value(&self, string: &str) -> Option<f32> {
        let string = string.trim();
        let value = if string.eq_ignore_ascii_case("ON") {
            true
        } else if string.eq_ignore_ascii_case("OFF") {
            false
        } else {
            string.parse::<bool>().ok()?
        };
        Some(self.normalize_value(value))
    }
}

// -------------------------------------------------------------------------------------------------

/// Holds a boolean parameter value and its description.
#[derive(Debug, Clone)]
pub struct BooleanParameterValue {
    /// The parameter's description and constraints.
    description: BooleanParameter,
    /// The current value of the parameter.
    value: bool,
}

impl BooleanParameterValue {
    /// Create a new parameter value with the given parameter description, initialized to the
    /// parameter's default value.
    pub fn from_description(description: BooleanParameter) -> Self {
        let value = description.default_value();
        Self { value, description }
    }

    /// Access the parameter value's description.
    pub fn description(&self) -> &BooleanParameter {
        &self.description
    }

    /// Access to the current value.
    #[inline(always)]
    pub fn value(&self) -> bool {
        self.value
    }

    /// Set a new value.
    pub fn set_value(&mut self, value: bool) {
        self.value = value;
    }

    /// Applies a parameter update.
    pub fn apply_update(&mut self, update: &ParameterValueUpdate) {
        match update {
            ParameterValueUpdate::Raw(raw) => {
                if let Some(value) = raw.downcast_ref::<bool>() {
                    self.set_value(*value);
                } else {
                    log::warn!(
                        "Invalid value type for boolean parameter '{}'",
                        self.description.id()
                    );
                }
            }
            ParameterValueUpdate::Normalized(normalized) => {
                let value = self
                    .description
                    .denormalize_value(normalized.clamp(0.0, 1.0));
                self.set_value(value);
            }
        }
    }
}

impl Display for BooleanParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let include_unit = false;
        let normalized = self.description.normalize_value(self.value);
        f.write_str(&self.description.value_to_string(normalized, include_unit))
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_conversion() {
        let param = BooleanParameter::new(FourCC(*b"test"), "Test", false);
        assert_eq!(param.string_to_value("on"), Some(1.0));
        assert_eq!(param.string_to_value(" OFF "), Some(0.0));
        assert_eq!(param.string_to_value("true"), Some(1.0));
        assert_eq!(param.string_to_value("nope"), None);
    }

    #[test]
    fn updates() {
        let param = BooleanParameter::new(FourCC(*b"test"), "Test", false);
        let mut value = BooleanParameterValue::from_description(param);
        assert!(!value.value());
        value.apply_update(&ParameterValueUpdate::Raw(Box::new(true)));
        assert!(value.value());
        value.apply_update(&ParameterValueUpdate::Normalized(0.0));
        assert!(!value.value());
    }
}
