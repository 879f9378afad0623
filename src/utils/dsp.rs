//! Common, shared DSP tools for effects.

pub mod detector;
pub mod grain;
pub mod loopbuffer;

// -------------------------------------------------------------------------------------------------

/// One-pole smoothing coefficient for the given time constant in seconds.
///
/// A coefficient of 0.0 (time <= 0) means "jump immediately".
pub fn smoothing_coeff(time_secs: f32, sample_rate: u32) -> f32 {
    if time_secs > 0.0 {
        (-1.0 / (time_secs * sample_rate as f32)).exp()
    } else {
        0.0
    }
}

/// Cubic soft clipper, exactly bounded to `[-1, 1]`.
#[inline]
pub fn soft_clip(value: f32) -> f32 {
    let x = value.clamp(-1.5, 1.5);
    x - x * x * x / 6.75
}

// -------------------------------------------------------------------------------------------------
