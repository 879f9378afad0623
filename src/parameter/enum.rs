use std::{fmt::Display, str::FromStr};

use four_cc::FourCC;
use strum::IntoEnumIterator;

use super::{Parameter, ParameterType, ParameterValueUpdate};

// -------------------------------------------------------------------------------------------------

/// An enum parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumParameter {
    id: FourCC,
    name: &'static str,
    values: Vec<String>,
    default_index: usize,
}

impl EnumParameter {
    /// Create a new enum parameter descriptor from an iterable enum type.
    pub fn new<E: IntoEnumIterator + ToString + PartialEq>(
        id: FourCC,
        name: &'static str,
        default: E,
    ) -> Self {
        let values = E::iter().map(|v| v.to_string()).collect::<Vec<_>>();
        let default_index = E::iter().position(|v| v == default).unwrap_or(0);
        Self {
            id,
            name,
            values,
            default_index,
        }
    }

    /// The parameter's default value string.
    pub fn default_value(&self) -> &String {
        &self.values[self.default_index]
    }

    /// Normalize the given value string to a 0.0-1.0 range.
    /// Unknown values normalize to the default value's position.
    pub fn normalize_value(&self, value: &str) -> f32 {
        let index = self
            .values
            .iter()
            .position(|v| v == value)
            .unwrap_or(self.default_index);
        index as f32 / (self.values.len() - 1).max(1) as f32
    }

    /// Denormalize a 0.0-1.0 ranged value to the corresponding value string.
    pub fn denormalize_value(&self, normalized: f32) -> &String {
        debug_assert!((0.0..=1.0).contains(&normalized));
        let index = (normalized * (self.values.len() - 1) as f32).round() as usize;
        &self.values[index.min(self.values.len() - 1)]
    }
}

impl Parameter for EnumParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Enum {
            values: self.values.clone(),
            default_index: self.default_index,
        }
    }

    fn default_value(&self) -> f32 {
        self.default_index as f32 / (self.values.len() - 1).max(1) as f32
    }

    fn value_to_string(&self, normalized: f32, _include_unit: bool) -> String {
        self.denormalize_value(normalized.clamp(0.0, 1.0)).clone()
    }

    fn string_to_value(&self, string: &str) -> Option<f32> {
        let string = string.trim();
        self.values
            .iter()
            .position(|v| v.eq_ignore_ascii_case(string))
            .map(|index| index as f32 / (self.values.len() - 1).max(1) as f32)
    }
}

// -------------------------------------------------------------------------------------------------

/// Holds an enum parameter value and its description.
///
/// Unknown value strings in updates fall back to the parameter's default value instead of
/// being rejected, so stale or misspelled host presets degrade gracefully.
#[derive(Debug, Clone)]
pub struct EnumParameterValue<E: Sized + Clone> {
    /// The parameter's description and constraints.
    description: EnumParameter,
    /// The current value of the parameter.
    value: E,
}

impl<E: Sized + FromStr + Default + Clone + 'static> EnumParameterValue<E> {
    /// Create a new parameter value with the given parameter description, initialized to the
    /// parameter's default value.
    pub fn from_description(description: EnumParameter) -> Self {
        let value = E::from_str(description.default_value()).unwrap_or_default();
        Self { value, description }
    }

    /// Access the parameter value's description.
    pub fn description(&self) -> &EnumParameter {
        &self.description
    }

    /// Access to the current value.
    #[inline(always)]
    pub fn value(&self) -> &E {
        &self.value
    }

    /// Set a new value.
    pub fn set_value(&mut self, value: E) {
        self.value = value;
    }

    /// Applies a parameter update.
    pub fn apply_update(&mut self, update: &ParameterValueUpdate) {
        match update {
            ParameterValueUpdate::Raw(raw) => {
                if let Some(value) = raw.downcast_ref::<E>() {
                    self.set_value(value.clone());
                } else if let Some(value_str) = raw.downcast_ref::<String>() {
                    if let Ok(value) = E::from_str(value_str) {
                        self.set_value(value);
                    } else {
                        log::warn!(
                            "Unknown value '{}' for enum parameter '{}': using default",
                            value_str,
                            self.description.id()
                        );
                        self.set_value(E::default());
                    }
                } else {
                    log::warn!(
                        "Invalid value type for enum parameter '{}'",
                        self.description.id()
                    );
                }
            }
            ParameterValueUpdate::Normalized(normalized) => {
                let value_str = self
                    .description
                    .denormalize_value(normalized.clamp(0.0, 1.0));
                if let Ok(value) = E::from_str(value_str) {
                    self.set_value(value);
                }
            }
        }
    }
}

impl<E: Sized + Clone + Display> Display for EnumParameterValue<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use strum::{Display, EnumIter, EnumString};

    use super::*;

    #[derive(Debug, Default, Clone, Copy, PartialEq, EnumString, EnumIter, Display)]
    enum Flavor {
        #[default]
        Vanilla,
        Chocolate,
        Mint,
    }

    #[test]
    fn value_conversion() {
        let param = EnumParameter::new(FourCC(*b"flav"), "Flavor", Flavor::Vanilla);
        assert_eq!(param.normalize_value("Vanilla"), 0.0);
        assert_eq!(param.normalize_value("Mint"), 1.0);
        assert_eq!(param.denormalize_value(0.5), "Chocolate");
        assert_eq!(param.string_to_value("mint"), Some(1.0));
        assert_eq!(param.string_to_value("strawberry"), None);
    }

    #[test]
    fn unknown_string_falls_back_to_default() {
        let param = EnumParameter::new(FourCC(*b"flav"), "Flavor", Flavor::Vanilla);
        let mut value = EnumParameterValue::<Flavor>::from_description(param);
        value.set_value(Flavor::Mint);
        value.apply_update(&ParameterValueUpdate::Raw(Box::new(
            "strawberry".to_string(),
        )));
        assert_eq!(*value.value(), Flavor::Vanilla);
    }

    #[test]
    fn typed_updates() {
        let param = EnumParameter::new(FourCC(*b"flav"), "Flavor", Flavor::Vanilla);
        let mut value = EnumParameterValue::<Flavor>::from_description(param);
        value.apply_update(&ParameterValueUpdate::Raw(Box::new(Flavor::Chocolate)));
        assert_eq!(*value.value(), Flavor::Chocolate);
        value.apply_update(&ParameterValueUpdate::Normalized(1.0));
        assert_eq!(*value.value(), Flavor::Mint);
    }
}
