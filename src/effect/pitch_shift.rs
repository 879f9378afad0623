use four_cc::FourCC;

use crate::{
    effect::{Effect, EffectTime},
    parameter::{FloatParameter, FloatParameterValue, ParameterValueUpdate},
    utils::dsp::grain::{hann_window, GrainHead},
    ClonableParameter, Error,
};

// -------------------------------------------------------------------------------------------------

/// Granular pitch shifter with two overlapping Hann-windowed grain heads.
///
/// The input (channel 0 for stereo material) continuously feeds a mono circular buffer. Two
/// read heads slide over that buffer at the pitch ratio `2^(semitones/12)`, half a grain apart
/// in window phase, each weighted by a Hann window whose weights sum to unity. At each grain
/// boundary both heads re-anchor a full grain behind the write position, which keeps them near
/// the freshest input without ever catching the write head. The shifted signal is mixed with
/// the dry input on all channels.
pub struct PitchShiftEffect {
    // Effect configuration
    sample_rate: u32,
    channel_count: usize,
    // Parameters
    pitch: FloatParameterValue,
    mix: FloatParameterValue,
    grain_size: FloatParameterValue,
    // Internal state
    buffer: Vec<f32>,
    write_pos: usize,
    heads: [GrainHead; 2],
    grain_phase: f32,
}

impl PitchShiftEffect {
    pub const EFFECT_NAME: &'static str = "PitchShiftEffect";
    pub const PITCH_ID: FourCC = FourCC(*b"ptch");
    pub const MIX_ID: FourCC = FourCC(*b"mixx");
    pub const GRAIN_ID: FourCC = FourCC(*b"grai");

    /// Longest supported grain in frames, sized for sample rates up to 96 kHz.
    const MAX_GRAIN_FRAMES: usize = (0.1 * 96_000.0) as usize;
    /// Shortest supported grain in frames.
    const MIN_GRAIN_FRAMES: usize = 128;
    /// Circular buffer capacity: enough history for a full grain behind the write position
    /// at the highest downward pitch rates.
    const BUFFER_FRAMES: usize = 4 * Self::MAX_GRAIN_FRAMES;

    /// Creates a new `PitchShiftEffect` with default parameters.
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            channel_count: 0,
            pitch: FloatParameterValue::from_description(
                FloatParameter::new(Self::PITCH_ID, "Pitch", -24.0..=24.0, 0.0).with_unit("st"),
            ),
            mix: FloatParameterValue::from_description(FloatParameter::new(
                Self::MIX_ID,
                "Mix",
                0.0..=1.0,
                1.0,
            )),
            grain_size: FloatParameterValue::from_description(
                FloatParameter::new(Self::GRAIN_ID, "Grain", 20.0..=100.0, 50.0).with_unit("ms"),
            ),
            buffer: Vec::new(),
            write_pos: 0,
            heads: [GrainHead::default(), GrainHead::default()],
            grain_phase: 0.0,
        }
    }

    /// Playback rate for a pitch offset in semitones.
    fn pitch_ratio(semitones: f32) -> f64 {
        2.0f64.powf(semitones as f64 / 12.0)
    }

    /// The current grain length in frames, derived from the grain ms parameter.
    fn grain_frames(&self) -> usize {
        let frames = (self.grain_size.value() / 1000.0 * self.sample_rate as f32) as usize;
        frames.clamp(Self::MIN_GRAIN_FRAMES, Self::MAX_GRAIN_FRAMES)
    }

    /// Re-anchor both heads a full grain behind the write position, half a grain apart,
    /// and restart the grain phase.
    fn reset_heads(&mut self) {
        let grain = self.grain_frames() as f64;
        let write_pos = self.write_pos as f64;
        self.heads[0].anchor(write_pos - grain, Self::BUFFER_FRAMES);
        self.heads[1].anchor(write_pos - grain / 2.0, Self::BUFFER_FRAMES);
        self.grain_phase = 0.0;
    }
}

impl Default for PitchShiftEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for PitchShiftEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&dyn ClonableParameter> {
        vec![
            self.pitch.description(),
            self.mix.description(),
            self.grain_size.description(),
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
        self.buffer = vec![0.0; Self::BUFFER_FRAMES];
        self.write_pos = 0;
        self.reset_heads();
        Ok(())
    }

    fn process(&mut self, output: &mut [f32], _time: &EffectTime) {
        debug_assert!(self.channel_count > 0, "Effect is not initialized");

        // k-rate parameter snapshot
        let mix = self.mix.value();
        let rate = Self::pitch_ratio(self.pitch.value());
        let grain_frames = self.grain_frames();
        let phase_increment = 1.0 / grain_frames as f32;

        for frame in output.chunks_exact_mut(self.channel_count) {
            // channel 0 feeds the mono analysis buffer
            self.buffer[self.write_pos] = frame[0];
            self.write_pos = (self.write_pos + 1) % Self::BUFFER_FRAMES;

            // overlap-add both heads, half a grain apart in window phase
            let wet = self.heads[0].read(&self.buffer) * hann_window(self.grain_phase)
                + self.heads[1].read(&self.buffer) * hann_window((self.grain_phase + 0.5) % 1.0);
            for head in self.heads.iter_mut() {
                head.advance(rate, Self::BUFFER_FRAMES);
            }

            self.grain_phase += phase_increment;
            if self.grain_phase >= 1.0 {
                self.grain_phase -= 1.0;
                // grain ended: re-anchor both heads behind the freshest input
                let anchor = self.write_pos as f64 - grain_frames as f64;
                self.heads[0].anchor(anchor, Self::BUFFER_FRAMES);
                self.heads[1].anchor(anchor + grain_frames as f64 / 2.0, Self::BUFFER_FRAMES);
            }

            for sample in frame.iter_mut() {
                *sample = *sample * (1.0 - mix) + wet * mix;
            }
        }
    }

    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error> {
        match id {
            Self::PITCH_ID => self.pitch.apply_update(value),
            Self::MIX_ID => self.mix.apply_update(value),
            Self::GRAIN_ID => {
                self.grain_size.apply_update(value);
                // keep the captured history and just re-anchor for the new grain length,
                // so grain changes don't drop audio
                if !self.buffer.is_empty() {
                    self.reset_heads();
                }
            }
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
    const BLOCK: usize = 512;

    fn sine_block(frequency: f32, start_frame: usize, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|frame| {
                let t = (start_frame + frame) as f32 / SAMPLE_RATE as f32;
                (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect()
    }

    /// Count zero crossings as a crude frequency estimate.
    fn zero_crossings(buffer: &[f32]) -> usize {
        buffer
            .windows(2)
            .filter(|pair| pair[0] <= 0.0 && pair[1] > 0.0)
            .count()
    }

    #[test]
    fn zero_semitones_passes_signal_through_delayed() {
        let mut shifter = PitchShiftEffect::new();
        shifter.initialize(SAMPLE_RATE, 1, BLOCK).unwrap();

        // at 0 st the wet path is a delayed copy: frequency content must be unchanged
        let mut crossings = 0;
        for block in 0..40 {
            let mut buffer = sine_block(440.0, block * BLOCK, BLOCK);
            shifter.process(&mut buffer, &EffectTime::default());
            if block > 20 {
                crossings += zero_crossings(&buffer);
            }
        }
        let seconds = (19 * BLOCK) as f32 / SAMPLE_RATE as f32;
        let estimated = crossings as f32 / seconds;
        assert!((estimated - 440.0).abs() < 20.0, "estimated {estimated} Hz");
    }

    #[test]
    fn octave_up_doubles_frequency() {
        let mut shifter = PitchShiftEffect::new();
        shifter.initialize(SAMPLE_RATE, 1, BLOCK).unwrap();
        shifter
            .process_parameter_update(
                PitchShiftEffect::PITCH_ID,
                &ParameterValueUpdate::Raw(Box::new(12.0f32)),
            )
            .unwrap();

        let mut crossings = 0;
        for block in 0..40 {
            let mut buffer = sine_block(440.0, block * BLOCK, BLOCK);
            shifter.process(&mut buffer, &EffectTime::default());
            if block > 20 {
                crossings += zero_crossings(&buffer);
            }
        }
        let seconds = (19 * BLOCK) as f32 / SAMPLE_RATE as f32;
        let estimated = crossings as f32 / seconds;
        assert!((estimated - 880.0).abs() < 60.0, "estimated {estimated} Hz");
    }

    #[test]
    fn pitch_ratio_and_grain_size() {
        assert!((PitchShiftEffect::pitch_ratio(12.0) - 2.0).abs() < 1e-12);
        assert!((PitchShiftEffect::pitch_ratio(-12.0) - 0.5).abs() < 1e-12);
        assert!((PitchShiftEffect::pitch_ratio(0.0) - 1.0).abs() < 1e-12);

        let mut shifter = PitchShiftEffect::new();
        shifter.initialize(SAMPLE_RATE, 1, BLOCK).unwrap();
        assert_eq!(shifter.grain_frames(), 2400);
    }

    #[test]
    fn grain_changes_keep_captured_audio() {
        let mut shifter = PitchShiftEffect::new();
        shifter.initialize(SAMPLE_RATE, 1, BLOCK).unwrap();
        for block in 0..20 {
            let mut buffer = sine_block(440.0, block * BLOCK, BLOCK);
            shifter.process(&mut buffer, &EffectTime::default());
        }

        shifter
            .process_parameter_update(
                PitchShiftEffect::GRAIN_ID,
                &ParameterValueUpdate::Raw(Box::new(30.0f32)),
            )
            .unwrap();

        // the first block after the change still plays from the captured history
        let mut buffer = sine_block(440.0, 20 * BLOCK, BLOCK);
        shifter.process(&mut buffer, &EffectTime::default());
        let rms = (buffer.iter().map(|s| s * s).sum::<f32>() / buffer.len() as f32).sqrt();
        assert!(rms > 0.2, "rms {rms}");
    }

    #[test]
    fn dry_mix_is_transparent() {
        let mut shifter = PitchShiftEffect::new();
        shifter.initialize(SAMPLE_RATE, 2, BLOCK).unwrap();
        shifter
            .process_parameter_update(
                PitchShiftEffect::MIX_ID,
                &ParameterValueUpdate::Raw(Box::new(0.0f32)),
            )
            .unwrap();

        let dry = sine_block(440.0, 0, BLOCK);
        let mut buffer = Vec::with_capacity(BLOCK * 2);
        for sample in &dry {
            buffer.push(*sample);
            buffer.push(*sample);
        }
        shifter.process(&mut buffer, &EffectTime::default());
        for (frame, sample) in buffer.chunks_exact(2).zip(&dry) {
            assert!((frame[0] - sample).abs() < 1e-6);
            assert!((frame[1] - sample).abs() < 1e-6);
        }
    }

    #[test]
    fn output_stays_bounded() {
        let mut shifter = PitchShiftEffect::new();
        shifter.initialize(SAMPLE_RATE, 1, BLOCK).unwrap();
        shifter
            .process_parameter_update(
                PitchShiftEffect::PITCH_ID,
                &ParameterValueUpdate::Raw(Box::new(-24.0f32)),
            )
            .unwrap();

        for block in 0..100 {
            let mut buffer = sine_block(220.0, block * BLOCK, BLOCK);
            shifter.process(&mut buffer, &EffectTime::default());
            for sample in buffer {
                assert!(sample.abs() <= 2.0);
            }
        }
    }
}
