//! Hybrid RMS/peak level detector for envelope driven effects.

// -------------------------------------------------------------------------------------------------

/// Tracks the level of a signal with a blend of a windowed RMS average and a fast decaying
/// peak follower.
///
/// The RMS side reacts smoothly to sustained signal energy, the peak side catches transients.
/// For stereo material, feed the cross-channel peak `max(|l|, |r|)` per frame, so both channels
/// share one linked envelope.
#[derive(Debug, Clone)]
pub struct LevelDetector {
    rms_squared: f32,
    peak: f32,
    rms_alpha: f32,
    // cached configuration, to recompute the coefficient only on change
    window_secs: f32,
    sample_rate: u32,
}

impl LevelDetector {
    /// Per-sample peak follower decay.
    const PEAK_DECAY: f32 = 0.99;
    /// Extra peak decay applied once per processed block.
    const PEAK_BLOCK_DECAY: f32 = 0.995;

    /// Create a new detector with the given RMS window.
    pub fn new(window_secs: f32, sample_rate: u32) -> Self {
        let mut detector = Self {
            rms_squared: 0.0,
            peak: 0.0,
            rms_alpha: 0.0,
            window_secs: 0.0,
            sample_rate: 0,
        };
        detector.configure(window_secs, sample_rate);
        detector
    }

    /// Update the RMS window and sample rate. The smoothing coefficient is only recomputed
    /// when either actually changed, so this is cheap to call once per block.
    pub fn configure(&mut self, window_secs: f32, sample_rate: u32) {
        if window_secs != self.window_secs || sample_rate != self.sample_rate {
            self.window_secs = window_secs;
            self.sample_rate = sample_rate;
            self.rms_alpha = (-1.0 / (window_secs.max(1e-4) * sample_rate as f32)).exp();
        }
    }

    /// Track a single input sample and return the current level, blending peak and RMS with
    /// the given `peak_mix` ratio (0 = RMS only, 1 = peak only).
    #[inline]
    pub fn process(&mut self, input: f32, peak_mix: f32) -> f32 {
        let abs = input.abs();
        self.peak = abs.max(self.peak * Self::PEAK_DECAY);
        self.rms_squared = self.rms_alpha * self.rms_squared + (1.0 - self.rms_alpha) * abs * abs;
        // the added epsilon keeps the sqrt and downstream feedback paths out of denormal range
        let rms = (self.rms_squared + 1e-12).sqrt();
        peak_mix * self.peak + (1.0 - peak_mix) * rms
    }

    /// Apply the per-block peak decay. Call once at the end of each processed block.
    #[inline]
    pub fn end_block(&mut self) {
        self.peak *= Self::PEAK_BLOCK_DECAY;
    }

    /// Reset all envelope state, keeping the configuration.
    pub fn reset(&mut self) {
        self.rms_squared = 0.0;
        self.peak = 0.0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_levels() {
        let mut detector = LevelDetector::new(0.015, 48000);

        // silence stays near zero
        let mut level = 0.0;
        for _ in 0..512 {
            level = detector.process(0.0, 0.3);
        }
        assert!(level < 1e-3);

        // a constant signal converges towards its amplitude
        for _ in 0..48000 {
            level = detector.process(0.5, 0.0);
        }
        assert!((level - 0.5).abs() < 0.01);

        // peak mix reacts instantly to a transient
        detector.reset();
        let level = detector.process(1.0, 1.0);
        assert!(level > 0.99);
    }

    #[test]
    fn peak_decays() {
        let mut detector = LevelDetector::new(0.015, 48000);
        let initial = detector.process(1.0, 1.0);
        let mut level = initial;
        for _ in 0..1000 {
            level = detector.process(0.0, 1.0);
            detector.end_block();
        }
        assert!(level < 0.01 * initial);
    }

    #[test]
    fn coefficient_cache() {
        let mut detector = LevelDetector::new(0.015, 48000);
        let alpha = detector.rms_alpha;
        detector.configure(0.015, 48000);
        assert_eq!(detector.rms_alpha, alpha);
        detector.configure(0.030, 48000);
        assert!(detector.rms_alpha > alpha);
    }
}
