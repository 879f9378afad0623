//! Effect parameter descriptors and value wrappers.

use std::{any::Any, fmt::Debug, ops::RangeInclusive};

use four_cc::FourCC;

// -------------------------------------------------------------------------------------------------

/// Describes the type of a [`Parameter`] to e.g. select a proper visual representation in a UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterType {
    /// A continuous floating-point value within a plain value range.
    Float {
        range: RangeInclusive<f32>,
        default: f32,
    },
    /// A choice from a list of strings (an enum).
    Enum {
        values: Vec<String>,
        default_index: usize,
    },
    /// A boolean toggle.
    Boolean { default: bool },
}

// -------------------------------------------------------------------------------------------------

/// Describes a single parameter of an [`Effect`](crate::Effect) for use in UIs or for automation.
///
/// Values are exchanged as normalized floats in range \[0, 1\] here, so generic UIs don't need to
/// know about a parameter's plain value range or type.
pub trait Parameter: Debug {
    /// The unique id of the parameter.
    fn id(&self) -> FourCC;

    /// The name of the parameter.
    fn name(&self) -> &'static str;

    /// The parameter type with type specific value ranges and defaults.
    fn parameter_type(&self) -> ParameterType;

    /// Default value of the parameter, expressed as normalized value in range \[0, 1\].
    fn default_value(&self) -> f32;

    /// Convert the given normalized value to a display string.
    fn value_to_string(&self, normalized: f32, include_unit: bool) -> String;

    /// Convert the given string to a normalized value.
    /// Returns `None` when the conversion failed, else a valid normalized value.
    fn string_to_value(&self, string: &str) -> Option<f32>;
}

// -------------------------------------------------------------------------------------------------

/// Allows creating `dyn Parameter` clones.
pub trait ClonableParameter: Parameter {
    /// Create a dyn Parameter clone, wrapped into a box.
    fn dyn_clone(&self) -> Box<dyn Parameter>;
}

impl<P> ClonableParameter for P
where
    P: Parameter + Clone + 'static,
{
    fn dyn_clone(&self) -> Box<dyn Parameter> {
        Box::new(Self::clone(self))
    }
}

// -------------------------------------------------------------------------------------------------

/// An update for a [`Parameter`]'s value, consumed by [`Effect`](crate::Effect)s in audio time.
///
/// Out-of-range values are clamped into the parameter's declared range when applied.
#[derive(Debug)]
pub enum ParameterValueUpdate {
    /// Raw, type-erased plain value (f32, bool, an enum value or its string name).
    Raw(Box<dyn Any + Send + Sync>),
    /// A float value in range `0.0..=1.0`.
    Normalized(f32),
}

// -------------------------------------------------------------------------------------------------

mod boolean;
pub use boolean::{BooleanParameter, BooleanParameterValue};

mod float;
pub use float::{FloatParameter, FloatParameterValue};

mod r#enum;
pub use r#enum::{EnumParameter, EnumParameterValue};
