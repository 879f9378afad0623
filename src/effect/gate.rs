use four_cc::FourCC;

use crate::{
    effect::{Effect, EffectTime},
    parameter::{FloatParameter, FloatParameterValue, ParameterValueUpdate},
    utils::{
        db_to_linear,
        dsp::{detector::LevelDetector, smoothing_coeff},
    },
    ClonableParameter, Error,
};

// -------------------------------------------------------------------------------------------------

/// Hysteretic noise gate with a hybrid RMS/peak level detector.
///
/// The gate opens when the detected level rises above the open threshold and closes when it
/// falls below the separate, lower close threshold, so levels hovering around a single
/// threshold can't make it chatter. The gain moves towards its open/closed target with
/// asymmetric one-pole smoothing and never jumps. Closed means the configurable gate floor,
/// not digital silence. An optional hold time keeps the gate in its current state for a
/// minimum time after each transition.
pub struct GateEffect {
    // Effect configuration
    sample_rate: u32,
    channel_count: usize,
    // Parameters
    threshold_open: FloatParameterValue,
    threshold_close: FloatParameterValue,
    attack_time: FloatParameterValue,
    release_time: FloatParameterValue,
    rms_window: FloatParameterValue,
    peak_mix: FloatParameterValue,
    floor: FloatParameterValue,
    hold_time: FloatParameterValue,
    // Internal state
    detector: LevelDetector,
    open: bool,
    gain: f32,
    hold_frames_left: u32,
}

impl GateEffect {
    pub const EFFECT_NAME: &'static str = "GateEffect";
    pub const THRESHOLD_OPEN_ID: FourCC = FourCC(*b"thop");
    pub const THRESHOLD_CLOSE_ID: FourCC = FourCC(*b"thcl");
    pub const ATTACK_ID: FourCC = FourCC(*b"attk");
    pub const RELEASE_ID: FourCC = FourCC(*b"rels");
    pub const RMS_WINDOW_ID: FourCC = FourCC(*b"rmsw");
    pub const PEAK_MIX_ID: FourCC = FourCC(*b"pkmx");
    pub const FLOOR_ID: FourCC = FourCC(*b"flor");
    pub const HOLD_ID: FourCC = FourCC(*b"hold");

    /// Creates a new `GateEffect` with default parameters.
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            channel_count: 0,
            threshold_open: FloatParameterValue::from_description(
                FloatParameter::new(Self::THRESHOLD_OPEN_ID, "Open Threshold", -96.0..=0.0, -48.0)
                    .with_unit("dB"),
            ),
            threshold_close: FloatParameterValue::from_description(
                FloatParameter::new(
                    Self::THRESHOLD_CLOSE_ID,
                    "Close Threshold",
                    -96.0..=0.0,
                    -56.0,
                )
                .with_unit("dB"),
            ),
            attack_time: FloatParameterValue::from_description(
                FloatParameter::new(Self::ATTACK_ID, "Attack", 0.1..=100.0, 1.0).with_unit("ms"),
            ),
            release_time: FloatParameterValue::from_description(
                FloatParameter::new(Self::RELEASE_ID, "Release", 10.0..=1000.0, 80.0)
                    .with_unit("ms"),
            ),
            rms_window: FloatParameterValue::from_description(
                FloatParameter::new(Self::RMS_WINDOW_ID, "RMS Window", 1.0..=100.0, 15.0)
                    .with_unit("ms"),
            ),
            peak_mix: FloatParameterValue::from_description(FloatParameter::new(
                Self::PEAK_MIX_ID,
                "Peak Mix",
                0.0..=1.0,
                0.3,
            )),
            floor: FloatParameterValue::from_description(
                FloatParameter::new(Self::FLOOR_ID, "Floor", -120.0..=-10.0, -80.0).with_unit("dB"),
            ),
            hold_time: FloatParameterValue::from_description(
                FloatParameter::new(Self::HOLD_ID, "Hold", 0.0..=200.0, 0.0).with_unit("ms"),
            ),
            detector: LevelDetector::new(0.015, 44100),
            open: false,
            gain: 0.0,
            hold_frames_left: 0,
        }
    }
}

impl Default for GateEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for GateEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&dyn ClonableParameter> {
        vec![
            self.threshold_open.description(),
            self.threshold_close.description(),
            self.attack_time.description(),
            self.release_time.description(),
            self.rms_window.description(),
            self.peak_mix.description(),
            self.floor.description(),
            self.hold_time.description(),
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
        self.detector = LevelDetector::new(self.rms_window.value() / 1000.0, sample_rate);
        self.open = false;
        self.gain = db_to_linear(self.floor.value());
        self.hold_frames_left = 0;
        Ok(())
    }

    fn process(&mut self, output: &mut [f32], _time: &EffectTime) {
        debug_assert!(self.channel_count > 0, "Effect is not initialized");

        // k-rate parameter snapshot
        let mut threshold_open = db_to_linear(self.threshold_open.value());
        let mut threshold_close = db_to_linear(self.threshold_close.value());
        if threshold_close > threshold_open {
            std::mem::swap(&mut threshold_open, &mut threshold_close);
        }
        let floor = db_to_linear(self.floor.value());
        let attack_coeff = smoothing_coeff(self.attack_time.value() / 1000.0, self.sample_rate);
        let release_coeff = smoothing_coeff(self.release_time.value() / 1000.0, self.sample_rate);
        let peak_mix = self.peak_mix.value();
        let hold_frames =
            (self.hold_time.value() / 1000.0 * self.sample_rate as f32) as u32;
        self.detector
            .configure(self.rms_window.value() / 1000.0, self.sample_rate);

        for frame in output.chunks_exact_mut(self.channel_count) {
            // linked detection: both channels share one envelope
            let input = if frame.len() == 2 {
                frame[0].abs().max(frame[1].abs())
            } else {
                frame[0].abs()
            };
            let level = self.detector.process(input, peak_mix);

            if self.hold_frames_left > 0 {
                self.hold_frames_left -= 1;
            } else if self.open && level < threshold_close {
                self.open = false;
                self.hold_frames_left = hold_frames;
            } else if !self.open && level > threshold_open {
                self.open = true;
                self.hold_frames_left = hold_frames;
            }

            let target = if self.open { 1.0 } else { floor };
            let coeff = if target > self.gain {
                attack_coeff
            } else {
                release_coeff
            };
            self.gain = target + (self.gain - target) * coeff;

            for sample in frame.iter_mut() {
                *sample *= self.gain;
            }
        }
        self.detector.end_block();
    }

    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error> {
        match id {
            Self::THRESHOLD_OPEN_ID => self.threshold_open.apply_update(value),
            Self::THRESHOLD_CLOSE_ID => self.threshold_close.apply_update(value),
            Self::ATTACK_ID => self.attack_time.apply_update(value),
            Self::RELEASE_ID => self.release_time.apply_update(value),
            Self::RMS_WINDOW_ID => self.rms_window.apply_update(value),
            Self::PEAK_MIX_ID => self.peak_mix.apply_update(value),
            Self::FLOOR_ID => self.floor.apply_update(value),
            Self::HOLD_ID => self.hold_time.apply_update(value),
            _ => {
                return Err(Error::ParameterError(format!(
                    "Unknown parameter: '{id}' for effect '{}'",
                    self.name()
                )))
            }
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 48000;
    const BLOCK: usize = 256;

    /// Process `blocks` blocks of `BLOCK` frames, sized for the gate's channel layout.
    fn process_blocks(gate: &mut GateEffect, amplitude: f32, blocks: usize) -> f32 {
        let mut last = 0.0;
        let time = EffectTime::default();
        for _ in 0..blocks {
            let mut buffer = vec![amplitude; BLOCK * gate.channel_count];
            gate.process(&mut buffer, &time);
            last = buffer[buffer.len() - gate.channel_count];
        }
        last
    }

    #[test]
    fn opens_above_and_closes_below_thresholds() {
        let mut gate = GateEffect::new();
        gate.initialize(SAMPLE_RATE, 2, BLOCK).unwrap();

        // loud signal passes nearly unattenuated
        let out = process_blocks(&mut gate, 0.5, 100);
        assert!((out - 0.5).abs() < 0.01);

        // near-silence gets attenuated down to the floor
        let floor = db_to_linear(-80.0);
        let out = process_blocks(&mut gate, 1e-5, 400);
        assert!(out.abs() < 1e-5 * (floor + 0.01));
    }

    #[test]
    fn hysteresis_band_keeps_state() {
        let mut gate = GateEffect::new();
        gate.initialize(SAMPLE_RATE, 1, BLOCK).unwrap();

        // a level between the close and open thresholds must not open a closed gate
        let between = db_to_linear(-52.0);
        let time = EffectTime::default();
        for _ in 0..100 {
            let mut buffer = vec![between; BLOCK];
            gate.process(&mut buffer, &time);
        }
        assert!(!gate.open);

        // once opened by a loud burst, the same level keeps it open
        process_blocks(&mut gate, 0.5, 20);
        assert!(gate.open);
        for _ in 0..100 {
            let mut buffer = vec![between; BLOCK];
            gate.process(&mut buffer, &time);
        }
        assert!(gate.open);
    }

    #[test]
    fn inverted_thresholds_are_swapped() {
        let mut gate = GateEffect::new();
        gate.initialize(SAMPLE_RATE, 1, BLOCK).unwrap();
        gate.process_parameter_update(
            GateEffect::THRESHOLD_OPEN_ID,
            &ParameterValueUpdate::Raw(Box::new(-60.0f32)),
        )
        .unwrap();
        gate.process_parameter_update(
            GateEffect::THRESHOLD_CLOSE_ID,
            &ParameterValueUpdate::Raw(Box::new(-40.0f32)),
        )
        .unwrap();

        // effective open threshold is the higher of the two: -40 dB
        process_blocks(&mut gate, db_to_linear(-50.0), 100);
        assert!(!gate.open);
        process_blocks(&mut gate, db_to_linear(-30.0), 100);
        assert!(gate.open);
    }

    #[test]
    fn hold_blocks_retriggering() {
        let mut gate = GateEffect::new();
        gate.initialize(SAMPLE_RATE, 1, BLOCK).unwrap();
        gate.process_parameter_update(
            GateEffect::HOLD_ID,
            &ParameterValueUpdate::Raw(Box::new(200.0f32)),
        )
        .unwrap();

        // a single loud block opens the gate and arms the hold window
        process_blocks(&mut gate, 0.5, 1);
        assert!(gate.open);
        assert!(gate.hold_frames_left > 0);
        // 20 silent blocks (5120 frames) stay well within the 9600 frame hold window,
        // so the gate can not close yet
        process_blocks(&mut gate, 0.0, 20);
        assert!(gate.open);
        // after the hold window has passed, silence closes it
        process_blocks(&mut gate, 0.0, 400);
        assert!(!gate.open);
    }

    #[test]
    fn rejects_unknown_parameters_and_channel_layouts() {
        let mut gate = GateEffect::new();
        assert!(gate.initialize(SAMPLE_RATE, 3, BLOCK).is_err());
        gate.initialize(SAMPLE_RATE, 2, BLOCK).unwrap();
        assert!(gate
            .process_parameter_update(FourCC(*b"nope"), &ParameterValueUpdate::Normalized(0.5))
            .is_err());
    }
}
