use four_cc::FourCC;

use crate::{
    effect::{Effect, EffectTime},
    parameter::{FloatParameter, FloatParameterValue, ParameterValueUpdate},
    utils::dsp::{detector::LevelDetector, smoothing_coeff},
    ClonableParameter, Error,
};

// -------------------------------------------------------------------------------------------------

/// Power-supply "sag" simulation.
///
/// A continuous headroom multiplier that droops under signal load and slowly recovers, the way
/// a tube amp's rectifier supply compresses under hard playing. The gain target is
/// `max(floor, 1 - depth * level^shape)`, so the output is never attenuated below the
/// configured floor. Droop uses the attack time, recovery the release time.
pub struct SagEffect {
    // Effect configuration
    sample_rate: u32,
    channel_count: usize,
    // Parameters
    depth: FloatParameterValue,
    attack_time: FloatParameterValue,
    release_time: FloatParameterValue,
    floor: FloatParameterValue,
    shape: FloatParameterValue,
    rms_window: FloatParameterValue,
    peak_mix: FloatParameterValue,
    // Internal state
    detector: LevelDetector,
    gain: f32,
}

impl SagEffect {
    pub const EFFECT_NAME: &'static str = "SagEffect";
    pub const DEPTH_ID: FourCC = FourCC(*b"dpth");
    pub const ATTACK_ID: FourCC = FourCC(*b"attk");
    pub const RELEASE_ID: FourCC = FourCC(*b"rels");
    pub const FLOOR_ID: FourCC = FourCC(*b"flor");
    pub const SHAPE_ID: FourCC = FourCC(*b"shap");
    pub const RMS_WINDOW_ID: FourCC = FourCC(*b"rmsw");
    pub const PEAK_MIX_ID: FourCC = FourCC(*b"pkmx");

    /// Creates a new `SagEffect` with default parameters.
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            channel_count: 0,
            depth: FloatParameterValue::from_description(FloatParameter::new(
                Self::DEPTH_ID,
                "Depth",
                0.0..=0.5,
                0.08,
            )),
            attack_time: FloatParameterValue::from_description(
                FloatParameter::new(Self::ATTACK_ID, "Attack", 1.0..=50.0, 6.0).with_unit("ms"),
            ),
            release_time: FloatParameterValue::from_description(
                FloatParameter::new(Self::RELEASE_ID, "Release", 10.0..=500.0, 80.0)
                    .with_unit("ms"),
            ),
            floor: FloatParameterValue::from_description(FloatParameter::new(
                Self::FLOOR_ID,
                "Floor",
                0.1..=0.9,
                0.25,
            )),
            shape: FloatParameterValue::from_description(FloatParameter::new(
                Self::SHAPE_ID,
                "Shape",
                0.5..=3.0,
                1.0,
            )),
            rms_window: FloatParameterValue::from_description(
                FloatParameter::new(Self::RMS_WINDOW_ID, "RMS Window", 2.0..=80.0, 10.0)
                    .with_unit("ms"),
            ),
            peak_mix: FloatParameterValue::from_description(FloatParameter::new(
                Self::PEAK_MIX_ID,
                "Peak Mix",
                0.0..=1.0,
                0.3,
            )),
            detector: LevelDetector::new(0.010, 44100),
            gain: 1.0,
        }
    }
}

impl Default for SagEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for SagEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&dyn ClonableParameter> {
        vec![
            self.depth.description(),
            self.attack_time.description(),
            self.release_time.description(),
            self.floor.description(),
            self.shape.description(),
            self.rms_window.description(),
            self.peak_mix.description(),
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
        self.gain = 1.0;
        Ok(())
    }

    fn process(&mut self, output: &mut [f32], _time: &EffectTime) {
        debug_assert!(self.channel_count > 0, "Effect is not initialized");

        // k-rate parameter snapshot
        let depth = self.depth.value();
        let floor = self.floor.value();
        let shape = self.shape.value();
        let peak_mix = self.peak_mix.value();
        let attack_coeff = smoothing_coeff(self.attack_time.value() / 1000.0, self.sample_rate);
        let release_coeff = smoothing_coeff(self.release_time.value() / 1000.0, self.sample_rate);
        self.detector
            .configure(self.rms_window.value() / 1000.0, self.sample_rate);

        for frame in output.chunks_exact_mut(self.channel_count) {
            let input = if frame.len() == 2 {
                frame[0].abs().max(frame[1].abs())
            } else {
                frame[0].abs()
            };
            let level = self.detector.process(input, peak_mix);

            let target = (1.0 - depth * level.powf(shape)).max(floor);
            // droop fast on rising load, recover slowly
            let coeff = if target < self.gain {
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
            Self::DEPTH_ID => self.depth.apply_update(value),
            Self::ATTACK_ID => self.attack_time.apply_update(value),
            Self::RELEASE_ID => self.release_time.apply_update(value),
            Self::FLOOR_ID => self.floor.apply_update(value),
            Self::SHAPE_ID => self.shape.apply_update(value),
            Self::RMS_WINDOW_ID => self.rms_window.apply_update(value),
            Self::PEAK_MIX_ID => self.peak_mix.apply_update(value),
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
