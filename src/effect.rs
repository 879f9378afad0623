use std::any::Any;

use four_cc::FourCC;

use crate::{parameter::ParameterValueUpdate, ClonableParameter, Error};

// -------------------------------------------------------------------------------------------------

pub mod freeze;
pub mod gate;
pub mod looper;
pub mod pitch_shift;
pub mod sag;

// -------------------------------------------------------------------------------------------------

/// Carries [`Effect`] specific payloads, which can't or should not be expressed as a
/// [`Parameter`](crate::Parameter) change, such as looper transport commands.
///
/// This trait is implemented by message enums specific to each effect. It provides a way to
/// identify the target effect and access the message payload as a `dyn Any`, which can then be
/// downcast to the concrete message type within the effect's `process_message` implementation.
///
/// Messages are always applied in the effect's DSP real-time thread.
pub trait EffectMessage: Any + Send + Sync {
    /// The static name of the target effect for this message.
    ///
    /// This should match the `name()` of the target `Effect` implementation. It can be used by
    /// hosts to prevent sending messages to the wrong effect type.
    fn effect_name(&self) -> &'static str;

    /// Returns the message payload as a `dyn Any` reference.
    ///
    /// This allows the effect to downcast the payload to its specific message enum type.
    fn payload(&self) -> &dyn Any;
}

// -------------------------------------------------------------------------------------------------

/// Type used in [`Effect::process_message`] to receive messages.
///
/// It allows for dynamic dispatch to different message types.
pub type EffectMessagePayload = dyn EffectMessage;

// -------------------------------------------------------------------------------------------------

/// Frame time reference for an effect's process function.
///
/// Counts the absolute stream position of the first frame in the currently processed block,
/// since processing started.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EffectTime {
    pub pos_in_frames: u64,
}

impl EffectTime {
    /// Returns a new time with the frame position advanced by the given number of frames.
    #[must_use]
    pub const fn with_added_frames(&self, frames: u64) -> Self {
        Self {
            pos_in_frames: self.pos_in_frames + frames,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Effects manipulate audio samples in `f32` format and can be `Send` and `Sync`ed across threads.
/// Buffers are interleaved and processed in-place in the audio real-time thread.
///
/// After an effect got handed to an audio host, parameters can only be changed by scheduling
/// [`ParameterValueUpdate`]s or [`EffectMessage`]s, which the host forwards to
/// [`Effect::process_parameter_update`] and [`Effect::process_message`] on the audio thread
/// between two process calls. Updates never interrupt a running block: values read at the start
/// of a block stay constant for the whole block. This ensures that the actual effect processing
/// state can not be mutated outside of the audio thread.
///
/// Non real-time thread clients, such as UIs, can query info about an effect's parameter set via
/// [`Effect::parameters`] after creating the effect.
///
/// If you need to pass shared state from the effect to UIs (e.g. looper playback states), use
/// channels or atomics instead - as usual in Rust. See
/// [`LooperController`](crate::effects::LooperController) for an example.
///
/// NB: all `process_XXX` functions are called in realtime audio threads, so they must not
/// block! All other functions are called in the main thread to initialize the effect.
pub trait Effect: Send + Sync + 'static {
    /// A unique, static name for the effect.
    ///
    /// This name is used to associate `EffectMessage`s with their target effect type, preventing
    /// mis-typed messages from being processed. It can also be used for logging or in UIs.
    fn name(&self) -> &'static str;

    /// Returns a list of parameter descriptors for this effect.
    ///
    /// This can be used by UIs or automation systems to query available parameters of a specific
    /// effect. This method may only be called on non-real-time threads, usually right after
    /// creating a new effect instance.
    fn parameters(&self) -> Vec<&dyn ClonableParameter>;

    /// Initializes the effect with the audio stream's properties.
    ///
    /// This method is called once by the host before the effect is used. It runs on a
    /// non-real-time thread, so it's safe to perform allocations (e.g. for capture buffers)
    /// or other setup tasks here. All buffers must be sized here: `process` is never called
    /// with more than `max_frames` frames per channel.
    ///
    /// If an error is returned, the effect must not be used for processing.
    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        max_frames: usize,
    ) -> Result<(), Error>;

    /// Processes an interleaved audio buffer in-place, applying the effect.
    ///
    /// This method is called repeatedly on the real-time audio thread. To avoid audio glitches,
    /// it must not block, allocate memory, or perform other time-consuming operations.
    fn process(&mut self, output: &mut [f32], time: &EffectTime);

    /// Handles a parameter update in the real-time thread.
    ///
    /// This method is called on the real-time audio thread between two `process` calls when a
    /// parameter change is scheduled. The implementation should match on the `id` and update its
    /// internal state accordingly by using the `value`, which can be a raw or normalized value.
    ///
    /// Like `process`, this method must not block, allocate memory, or do other time-consuming
    /// tasks.
    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error>;

    /// Handles optional effect specific messages in the real-time thread. This can be used to pass
    /// payloads to the effects which can or should not be expressed as a trivial parameter change.
    ///
    /// The implementation should downcast the `message` payload to its specific message enum type
    /// and update its internal state accordingly.
    ///
    /// Like `process`, this method must not block, allocate memory, or do other time-consuming
    /// tasks.
    fn process_message(&mut self, _message: &EffectMessagePayload) -> Result<(), Error> {
        Err(Error::ParameterError(format!(
            "{}: Received unexpected message payload.",
            self.name()
        )))
    }
}
