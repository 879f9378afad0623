use std::{
    any::Any,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crossbeam_channel::{Receiver, Sender};
use four_cc::FourCC;
use strum::{Display, EnumIter, EnumString, VariantNames};

use crate::{
    effect::{Effect, EffectMessage, EffectMessagePayload, EffectTime},
    parameter::{
        EnumParameter, EnumParameterValue, FloatParameter, FloatParameterValue,
        ParameterValueUpdate,
    },
    utils::dsp::{
        loopbuffer::{CaptureRing, LoopBuffer},
        smoothing_coeff,
    },
    ClonableParameter, Error,
};

// -------------------------------------------------------------------------------------------------

/// Capture and fade behavior of the [`FreezeEffect`].
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, Display, VariantNames,
)]
pub enum FreezeMode {
    /// Short 80 ms capture with snappy fades.
    #[default]
    Fast,
    /// Long 300 ms capture with soft, pad-like fades.
    Slow,
    /// 120 ms capture with slow fades, for latching drones.
    Latch,
}

impl FreezeMode {
    /// Capture window in seconds.
    fn capture_secs(&self) -> f32 {
        match self {
            Self::Fast => 0.08,
            Self::Slow => 0.3,
            Self::Latch => 0.12,
        }
    }

    /// Fade time in seconds for the pass-through to frozen crossfade.
    fn freeze_fade_secs(&self) -> f32 {
        match self {
            Self::Fast => 0.01,
            Self::Slow | Self::Latch => 0.08,
        }
    }

    /// Fade time in seconds for the frozen to pass-through crossfade.
    fn unfreeze_fade_secs(&self) -> f32 {
        match self {
            Self::Fast => 0.02,
            Self::Slow | Self::Latch => 0.15,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Freeze commands for the [`FreezeEffect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeEffectMessage {
    Freeze,
    Unfreeze,
    Toggle,
}

impl EffectMessage for FreezeEffectMessage {
    fn effect_name(&self) -> &'static str {
        FreezeEffect::EFFECT_NAME
    }
    fn payload(&self) -> &dyn Any {
        self
    }
}

// -------------------------------------------------------------------------------------------------

/// Cloneable, `Send + Sync` control handle for a [`FreezeEffect`].
#[derive(Debug, Clone)]
pub struct FreezeController {
    sender: Sender<FreezeEffectMessage>,
    is_frozen: Arc<AtomicBool>,
}

impl FreezeController {
    pub fn freeze(&self) -> Result<(), Error> {
        self.send(FreezeEffectMessage::Freeze)
    }
    pub fn unfreeze(&self) -> Result<(), Error> {
        self.send(FreezeEffectMessage::Unfreeze)
    }
    pub fn toggle(&self) -> Result<(), Error> {
        self.send(FreezeEffectMessage::Toggle)
    }

    /// Whether the effect currently sustains a frozen fragment. May lag the audio thread by
    /// up to one block.
    pub fn is_frozen(&self) -> bool {
        self.is_frozen.load(Ordering::Relaxed)
    }

    fn send(&self, message: FreezeEffectMessage) -> Result<(), Error> {
        self.sender.try_send(message)?;
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// Infinite sustain effect, inspired by classic freeze pedals.
///
/// The input is continuously captured into a short stereo ring buffer. On `freeze`, the most
/// recent mode-dependent window is materialized into a seamless, boundary-crossfaded loop and
/// the output crossfades from the pass-through input to the looping frozen fragment. On
/// `unfreeze` the output fades back, the loop is dropped once inaudible and capture restarts
/// from scratch. Freezing before anything got captured leaves the effect transparent.
pub struct FreezeEffect {
    // Effect configuration
    sample_rate: u32,
    channel_count: usize,
    // Parameters
    mode: EnumParameterValue<FreezeMode>,
    decay: FloatParameterValue,
    // Control plumbing
    sender: Sender<FreezeEffectMessage>,
    receiver: Receiver<FreezeEffectMessage>,
    is_frozen_flag: Arc<AtomicBool>,
    // Capture and playback state
    capture_ring: CaptureRing,
    capture_scratch: Vec<f32>,
    loop_buffer: LoopBuffer,
    frozen: bool,
    capturing: bool,
    play_pos: f64,
    freeze_gain: f32,
    through_gain: f32,
}

impl FreezeEffect {
    pub const EFFECT_NAME: &'static str = "FreezeEffect";
    pub const MODE_ID: FourCC = FourCC(*b"mode");
    pub const DECAY_ID: FourCC = FourCC(*b"dcay");

    /// Ring capacity in seconds, the longest mode capture window fits well within.
    const RING_SECONDS: f32 = 0.5;
    const MESSAGE_QUEUE_SIZE: usize = 16;
    /// Frozen path gain below which the loop counts as inaudible.
    const SILENCE_GAIN: f32 = 1e-4;

    /// Creates a new `FreezeEffect` with default parameters.
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(Self::MESSAGE_QUEUE_SIZE);
        Self {
            sample_rate: 0,
            channel_count: 0,
            mode: EnumParameterValue::from_description(EnumParameter::new(
                Self::MODE_ID,
                "Mode",
                FreezeMode::Fast,
            )),
            decay: FloatParameterValue::from_description(FloatParameter::new(
                Self::DECAY_ID,
                "Decay",
                0.0..=1.0,
                1.0,
            )),
            sender,
            receiver,
            is_frozen_flag: Arc::new(AtomicBool::new(false)),
            capture_ring: CaptureRing::with_capacity(0),
            capture_scratch: Vec::new(),
            loop_buffer: LoopBuffer::with_capacity(0),
            frozen: false,
            capturing: true,
            play_pos: 0.0,
            freeze_gain: 0.0,
            through_gain: 1.0,
        }
    }

    /// Create a control handle for this effect. Handles are cheap to clone and can be used
    /// from any non-real-time thread.
    pub fn controller(&self) -> FreezeController {
        FreezeController {
            sender: self.sender.clone(),
            is_frozen: Arc::clone(&self.is_frozen_flag),
        }
    }

    fn apply_message(&mut self, message: &FreezeEffectMessage) {
        match message {
            FreezeEffectMessage::Freeze => self.freeze(),
            FreezeEffectMessage::Unfreeze => self.unfreeze(),
            FreezeEffectMessage::Toggle => {
                if self.frozen {
                    self.unfreeze();
                } else {
                    self.freeze();
                }
            }
        }
    }

    fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        let window_frames =
            (self.mode.value().capture_secs() * self.sample_rate as f32) as usize;
        let frames = self
            .capture_ring
            .copy_recent_into(window_frames, &mut self.capture_scratch);
        if frames < 2 {
            // nothing captured yet, stay transparent
            return;
        }
        self.loop_buffer
            .materialize(&self.capture_scratch[..frames * 2], false);
        if self.loop_buffer.is_empty() {
            return;
        }
        self.play_pos = 0.0;
        self.frozen = true;
        self.capturing = false;
        self.is_frozen_flag.store(true, Ordering::Relaxed);
    }

    fn unfreeze(&mut self) {
        if !self.frozen {
            return;
        }
        self.frozen = false;
        self.is_frozen_flag.store(false, Ordering::Relaxed);
        // resume capturing from scratch, the fade-out keeps ringing from the loop buffer
        self.capture_ring.reset();
        self.capturing = true;
    }
}

impl Default for FreezeEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for FreezeEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&dyn ClonableParameter> {
        vec![self.mode.description(), self.decay.description()]
    }

    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        _max_frames: usize,
    ) -> Result<(), Error> {
        if !(1..=2).contains(&channel_count) {
            return Err(Error::ChannelLayoutError(channel_count));
        }
        self.sample_rate = sample_rate;
        self.channel_count = channel_count;
        let ring_frames = (Self::RING_SECONDS * sample_rate as f32) as usize;
        self.capture_ring = CaptureRing::with_capacity(ring_frames);
        self.capture_scratch = vec![0.0; ring_frames * 2];
        self.loop_buffer = LoopBuffer::with_capacity(ring_frames);
        self.frozen = false;
        self.capturing = true;
        self.play_pos = 0.0;
        self.freeze_gain = 0.0;
        self.through_gain = 1.0;
        self.is_frozen_flag.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn process(&mut self, output: &mut [f32], _time: &EffectTime) {
        debug_assert!(self.channel_count > 0, "Effect is not initialized");

        // apply pending freeze commands at the block boundary
        while let Ok(message) = self.receiver.try_recv() {
            self.apply_message(&message);
        }

        // k-rate parameter snapshot
        let decay = self.decay.value();
        let mode = *self.mode.value();
        let fade_secs = if self.frozen {
            mode.freeze_fade_secs()
        } else {
            mode.unfreeze_fade_secs()
        };
        let fade_coeff = smoothing_coeff(fade_secs, self.sample_rate);
        let (freeze_target, through_target) = if self.frozen {
            (decay, 0.0)
        } else {
            (0.0, 1.0)
        };

        for frame in output.chunks_exact_mut(self.channel_count) {
            let (in_left, in_right) = if frame.len() == 2 {
                (frame[0], frame[1])
            } else {
                (frame[0], frame[0])
            };
            if self.capturing {
                self.capture_ring.write_frame(in_left, in_right);
            }

            self.freeze_gain = freeze_target + (self.freeze_gain - freeze_target) * fade_coeff;
            self.through_gain = through_target + (self.through_gain - through_target) * fade_coeff;

            let (frozen_left, frozen_right) = if !self.loop_buffer.is_empty() {
                let frozen = self.loop_buffer.frame_interpolated(self.play_pos);
                self.play_pos += 1.0;
                if self.play_pos >= self.loop_buffer.len_frames() as f64 {
                    self.play_pos -= self.loop_buffer.len_frames() as f64;
                }
                frozen
            } else {
                (0.0, 0.0)
            };

            frame[0] = in_left * self.through_gain + frozen_left * self.freeze_gain;
            if frame.len() == 2 {
                frame[1] = in_right * self.through_gain + frozen_right * self.freeze_gain;
            }
        }

        // drop the faded out loop once it became inaudible
        if !self.frozen && !self.loop_buffer.is_empty() && self.freeze_gain < Self::SILENCE_GAIN {
            self.loop_buffer.clear();
            self.play_pos = 0.0;
        }
    }

    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error> {
        match id {
            Self::MODE_ID => self.mode.apply_update(value),
            Self::DECAY_ID => self.decay.apply_update(value),
            _ => {
                return Err(Error::ParameterError(format!(
                    "Unknown parameter: '{id}' for effect '{}'",
                    self.name()
                )))
            }
        }
        Ok(())
    }

    fn process_message(&mut self, message: &EffectMessagePayload) -> Result<(), Error> {
        if let Some(message) = message.payload().downcast_ref::<FreezeEffectMessage>() {
            self.apply_message(message);
            Ok(())
        } else {
            Err(Error::ParameterError(format!(
                "{}: Received unexpected message payload.",
                self.name()
            )))
        }
    }
}

// -------------------------------------------------------------------------------------------------
