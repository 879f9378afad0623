#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod effect;
mod error;
mod parameter;

// public, flat re-exports
pub use error::Error;

pub use effect::{Effect, EffectMessage, EffectMessagePayload, EffectTime};

pub use parameter::{
    BooleanParameter, BooleanParameterValue, ClonableParameter, EnumParameter, EnumParameterValue,
    FloatParameter, FloatParameterValue, Parameter, ParameterType, ParameterValueUpdate,
};

// public mods
pub mod utils;

pub mod effects {
    //! The guitar effect kernel implementations.

    pub use super::effect::{
        freeze::{FreezeController, FreezeEffect, FreezeEffectMessage, FreezeMode},
        gate::GateEffect,
        looper::{LooperController, LooperEffect, LooperEffectMessage, LooperPlaybackState},
        pitch_shift::PitchShiftEffect,
        sag::SagEffect,
    };
}
