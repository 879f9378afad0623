use std::{
    any::Any,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crossbeam_channel::{Receiver, Sender};
use four_cc::FourCC;

use crate::{
    effect::{Effect, EffectMessage, EffectMessagePayload, EffectTime},
    parameter::{
        BooleanParameter, BooleanParameterValue, FloatParameter, FloatParameterValue,
        ParameterValueUpdate,
    },
    utils::dsp::{loopbuffer::LoopBuffer, soft_clip},
    ClonableParameter, Error,
};

// -------------------------------------------------------------------------------------------------

/// Transport commands for the [`LooperEffect`].
///
/// Sent from control threads through a [`LooperController`] or routed by a host via
/// [`Effect::process_message`]. Commands take effect at the next block boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LooperEffectMessage {
    StartRecording,
    StopRecording,
    StartOverdub,
    StopOverdub,
    StartPlayback,
    StopPlayback,
    Clear,
    SetReverse(bool),
    SetHalfSpeed(bool),
}

impl EffectMessage for LooperEffectMessage {
    fn effect_name(&self) -> &'static str {
        LooperEffect::EFFECT_NAME
    }
    fn payload(&self) -> &dyn Any {
        self
    }
}

// -------------------------------------------------------------------------------------------------

/// Observable looper transport flags, shared between the audio thread and control threads.
#[derive(Debug, Default)]
pub struct LooperPlaybackState {
    is_recording: AtomicBool,
    is_overdubbing: AtomicBool,
    is_playing: AtomicBool,
    has_loop: AtomicBool,
}

impl LooperPlaybackState {
    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::Relaxed)
    }
    pub fn is_overdubbing(&self) -> bool {
        self.is_overdubbing.load(Ordering::Relaxed)
    }
    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }
    pub fn has_loop(&self) -> bool {
        self.has_loop.load(Ordering::Relaxed)
    }
}

// -------------------------------------------------------------------------------------------------

/// Cloneable, `Send + Sync` control handle for a [`LooperEffect`].
///
/// Transport calls enqueue messages on a bounded lock-free channel, which the effect drains at
/// the next block boundary, so they are safe to call from any non-real-time thread. State
/// queries reflect what the audio thread last published and may lag by up to one block.
#[derive(Debug, Clone)]
pub struct LooperController {
    sender: Sender<LooperEffectMessage>,
    state: Arc<LooperPlaybackState>,
}

impl LooperController {
    pub fn start_recording(&self) -> Result<(), Error> {
        self.send(LooperEffectMessage::StartRecording)
    }
    pub fn stop_recording(&self) -> Result<(), Error> {
        self.send(LooperEffectMessage::StopRecording)
    }
    pub fn start_overdub(&self) -> Result<(), Error> {
        self.send(LooperEffectMessage::StartOverdub)
    }
    pub fn stop_overdub(&self) -> Result<(), Error> {
        self.send(LooperEffectMessage::StopOverdub)
    }
    pub fn start_playback(&self) -> Result<(), Error> {
        self.send(LooperEffectMessage::StartPlayback)
    }
    pub fn stop_playback(&self) -> Result<(), Error> {
        self.send(LooperEffectMessage::StopPlayback)
    }
    pub fn clear(&self) -> Result<(), Error> {
        self.send(LooperEffectMessage::Clear)
    }
    pub fn set_reverse(&self, reverse: bool) -> Result<(), Error> {
        self.send(LooperEffectMessage::SetReverse(reverse))
    }
    pub fn set_half_speed(&self, half_speed: bool) -> Result<(), Error> {
        self.send(LooperEffectMessage::SetHalfSpeed(half_speed))
    }

    /// The looper's observable transport state.
    pub fn state(&self) -> &LooperPlaybackState {
        &self.state
    }

    fn send(&self, message: LooperEffectMessage) -> Result<(), Error> {
        self.sender.try_send(message)?;
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransportState {
    Idle,
    Recording,
    Playing,
    Overdubbing,
}

// -------------------------------------------------------------------------------------------------

/// Loop recorder with overdubbing, reverse and half-speed playback.
///
/// Records up to 60 seconds of stereo input into a linear capture span. Stopping the
/// recording materializes the span into a boundary-crossfaded [`LoopBuffer`] and immediately
/// starts playback, mixed on top of the pass-through input. Overdubs blend new input into the
/// captured span with a fixed 0.85/0.85 old/new attenuation and a soft clip, which saturates
/// rather than explodes under repeated layering. Reverse rebuilds the loop time-reversed from
/// the unchanged span, so reversing twice restores the original loop sample for sample.
///
/// Reverse and half-speed are exposed both as transport messages and as boolean parameters,
/// so hosts can automate them like any other parameter.
pub struct LooperEffect {
    // Effect configuration
    sample_rate: u32,
    channel_count: usize,
    // Parameters
    volume: FloatParameterValue,
    reverse: BooleanParameterValue,
    half_speed: BooleanParameterValue,
    // Control plumbing
    sender: Sender<LooperEffectMessage>,
    receiver: Receiver<LooperEffectMessage>,
    shared_state: Arc<LooperPlaybackState>,
    // Capture and playback state
    state: TransportState,
    span: Vec<f32>,
    span_frames: usize,
    loop_buffer: LoopBuffer,
    play_pos: f64,
}

impl LooperEffect {
    pub const EFFECT_NAME: &'static str = "LooperEffect";
    pub const VOLUME_ID: FourCC = FourCC(*b"lvol");
    pub const REVERSE_ID: FourCC = FourCC(*b"rvrs");
    pub const HALF_SPEED_ID: FourCC = FourCC(*b"half");

    /// Maximum loop length in seconds.
    pub const MAX_LOOP_SECONDS: usize = 60;

    const MESSAGE_QUEUE_SIZE: usize = 16;
    const OVERDUB_ATTENUATION: f32 = 0.85;

    /// Creates a new `LooperEffect` with default parameters.
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(Self::MESSAGE_QUEUE_SIZE);
        Self {
            sample_rate: 0,
            channel_count: 0,
            volume: FloatParameterValue::from_description(FloatParameter::new(
                Self::VOLUME_ID,
                "Loop Volume",
                0.0..=1.0,
                1.0,
            )),
            reverse: BooleanParameterValue::from_description(BooleanParameter::new(
                Self::REVERSE_ID,
                "Reverse",
                false,
            )),
            half_speed: BooleanParameterValue::from_description(BooleanParameter::new(
                Self::HALF_SPEED_ID,
                "Half Speed",
                false,
            )),
            sender,
            receiver,
            shared_state: Arc::new(LooperPlaybackState::default()),
            state: TransportState::Idle,
            span: Vec::new(),
            span_frames: 0,
            loop_buffer: LoopBuffer::with_capacity(0),
            play_pos: 0.0,
        }
    }

    /// Create a control handle for this looper. Handles are cheap to clone and can be used
    /// from any non-real-time thread.
    pub fn controller(&self) -> LooperController {
        LooperController {
            sender: self.sender.clone(),
            state: Arc::clone(&self.shared_state),
        }
    }

    /// Maximum capture span length in frames.
    fn capacity_frames(&self) -> usize {
        Self::MAX_LOOP_SECONDS * self.sample_rate as usize
    }

    fn apply_transport(&mut self, message: &LooperEffectMessage) {
        match *message {
            LooperEffectMessage::StartRecording => {
                self.span_frames = 0;
                self.loop_buffer.clear();
                self.play_pos = 0.0;
                self.state = TransportState::Recording;
            }
            LooperEffectMessage::StopRecording => {
                if self.state == TransportState::Recording {
                    self.finish_recording();
                }
            }
            LooperEffectMessage::StartOverdub => {
                if self.state == TransportState::Playing && !self.loop_buffer.is_empty() {
                    self.state = TransportState::Overdubbing;
                }
            }
            LooperEffectMessage::StopOverdub => {
                if self.state == TransportState::Overdubbing {
                    // rebuild the audible loop from the mutated span
                    self.materialize();
                    self.state = TransportState::Playing;
                }
            }
            LooperEffectMessage::StartPlayback => {
                if self.state == TransportState::Idle && !self.loop_buffer.is_empty() {
                    self.play_pos = 0.0;
                    self.state = TransportState::Playing;
                }
            }
            LooperEffectMessage::StopPlayback => {
                if matches!(
                    self.state,
                    TransportState::Playing | TransportState::Overdubbing
                ) {
                    self.state = TransportState::Idle;
                }
            }
            LooperEffectMessage::Clear => {
                self.span_frames = 0;
                self.loop_buffer.clear();
                self.play_pos = 0.0;
                self.state = TransportState::Idle;
            }
            LooperEffectMessage::SetReverse(reverse) => {
                if reverse != self.reverse.value() {
                    self.reverse.set_value(reverse);
                    if !self.loop_buffer.is_empty() {
                        self.materialize();
                    }
                }
            }
            LooperEffectMessage::SetHalfSpeed(half_speed) => {
                self.half_speed.set_value(half_speed);
            }
        }
        self.publish_state();
    }

    /// Fix the loop length, build the audible loop and auto-start playback.
    /// A zero length capture is a no-op and returns the looper to idle.
    fn finish_recording(&mut self) {
        if self.span_frames == 0 {
            self.state = TransportState::Idle;
            return;
        }
        self.materialize();
        if self.loop_buffer.is_empty() {
            self.state = TransportState::Idle;
            return;
        }
        self.play_pos = 0.0;
        self.state = TransportState::Playing;
    }

    /// Rebuild the loop buffer from the capture span, keeping the playback position
    /// where feasible.
    fn materialize(&mut self) {
        self.loop_buffer
            .materialize(&self.span[..self.span_frames * 2], self.reverse.value());
        if !self.loop_buffer.is_empty() {
            self.play_pos %= self.loop_buffer.len_frames() as f64;
        } else {
            self.play_pos = 0.0;
        }
    }

    fn publish_state(&self) {
        let state = &self.shared_state;
        state
            .is_recording
            .store(self.state == TransportState::Recording, Ordering::Relaxed);
        state
            .is_overdubbing
            .store(self.state == TransportState::Overdubbing, Ordering::Relaxed);
        state.is_playing.store(
            matches!(
                self.state,
                TransportState::Playing | TransportState::Overdubbing
            ),
            Ordering::Relaxed,
        );
        state
            .has_loop
            .store(!self.loop_buffer.is_empty(), Ordering::Relaxed);
    }
}

impl Default for LooperEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for LooperEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&dyn ClonableParameter> {
        vec![
            self.volume.description(),
            self.reverse.description(),
            self.half_speed.description(),
        ]
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
        self.span = vec![0.0; self.capacity_frames() * 2];
        self.span_frames = 0;
        self.loop_buffer = LoopBuffer::with_capacity(self.capacity_frames());
        self.play_pos = 0.0;
        self.state = TransportState::Idle;
        self.publish_state();
        Ok(())
    }

    fn process(&mut self, output: &mut [f32], _time: &EffectTime) {
        debug_assert!(self.channel_count > 0, "Effect is not initialized");

        // apply pending transport commands at the block boundary
        while let Ok(message) = self.receiver.try_recv() {
            self.apply_transport(&message);
        }

        // k-rate parameter snapshot
        let volume = self.volume.value();
        let reverse = self.reverse.value();
        let rate = if self.half_speed.value() { 0.5 } else { 1.0 };
        let capacity = self.capacity_frames();
        let mut state_changed = false;

        for frame in output.chunks_exact_mut(self.channel_count) {
            let (in_left, in_right) = if frame.len() == 2 {
                (frame[0], frame[1])
            } else {
                (frame[0], frame[0])
            };

            if self.state == TransportState::Recording {
                if self.span_frames < capacity {
                    self.span[self.span_frames * 2] = in_left;
                    self.span[self.span_frames * 2 + 1] = in_right;
                    self.span_frames += 1;
                } else {
                    // capacity reached: force-stop into playback
                    self.finish_recording();
                    state_changed = true;
                }
            }

            if matches!(
                self.state,
                TransportState::Playing | TransportState::Overdubbing
            ) && !self.loop_buffer.is_empty()
            {
                let loop_len = self.loop_buffer.len_frames();

                if self.state == TransportState::Overdubbing {
                    let index = self.play_pos as usize % loop_len;
                    // the span always stays in forward time, so reversed playback positions
                    // map to the mirrored span frame
                    let span_index = if reverse {
                        self.span_frames - 1 - index
                    } else {
                        index
                    };
                    let span_frame = &mut self.span[span_index * 2..span_index * 2 + 2];
                    span_frame[0] = soft_clip(
                        span_frame[0] * Self::OVERDUB_ATTENUATION
                            + in_left * Self::OVERDUB_ATTENUATION,
                    );
                    span_frame[1] = soft_clip(
                        span_frame[1] * Self::OVERDUB_ATTENUATION
                            + in_right * Self::OVERDUB_ATTENUATION,
                    );
                    // keep the audible loop in sync with the mutated span
                    let loop_frame = self.loop_buffer.frame_mut(index);
                    loop_frame[0] = soft_clip(
                        loop_frame[0] * Self::OVERDUB_ATTENUATION
                            + in_left * Self::OVERDUB_ATTENUATION,
                    );
                    loop_frame[1] = soft_clip(
                        loop_frame[1] * Self::OVERDUB_ATTENUATION
                            + in_right * Self::OVERDUB_ATTENUATION,
                    );
                }

                let (loop_left, loop_right) = self.loop_buffer.frame_interpolated(self.play_pos);
                frame[0] += loop_left * volume;
                if frame.len() == 2 {
                    frame[1] += loop_right * volume;
                }

                self.play_pos += rate;
                if self.play_pos >= loop_len as f64 {
                    self.play_pos -= loop_len as f64;
                }
            }
        }

        if state_changed {
            self.publish_state();
        }
    }

    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error> {
        match id {
            Self::VOLUME_ID => self.volume.apply_update(value),
            Self::REVERSE_ID => {
                let was_reversed = self.reverse.value();
                self.reverse.apply_update(value);
                if self.reverse.value() != was_reversed && !self.loop_buffer.is_empty() {
                    self.materialize();
                }
            }
            Self::HALF_SPEED_ID => self.half_speed.apply_update(value),
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
        if let Some(message) = message.payload().downcast_ref::<LooperEffectMessage>() {
            self.apply_transport(message);
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
