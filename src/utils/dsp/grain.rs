//! Grain read heads for granular pitch shifting.

// -------------------------------------------------------------------------------------------------

/// Hann window weight for a grain phase in range `[0, 1)`.
#[inline]
pub fn hann_window(phase: f32) -> f32 {
    0.5 * (1.0 - (2.0 * std::f32::consts::PI * phase).cos())
}

// -------------------------------------------------------------------------------------------------

/// A read head sliding over a circular capture buffer at a fractional rate.
///
/// Positions are fractional and wrap modulo the buffer capacity. Reads are linearly
/// interpolated and sign-safe, so heads may be anchored "behind" position zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrainHead {
    position: f64,
}

impl GrainHead {
    /// Re-anchor the head to the given buffer position.
    /// The position may be negative and gets wrapped into the capacity.
    pub fn anchor(&mut self, position: f64, capacity: usize) {
        self.position = position.rem_euclid(capacity as f64);
    }

    /// The head's current, wrapped buffer position.
    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Read the head's current sample from the buffer with linear interpolation.
    #[inline]
    pub fn read(&self, buffer: &[f32]) -> f32 {
        let capacity = buffer.len();
        let index = self.position as usize;
        let fraction = (self.position - index as f64) as f32;
        let a = buffer[index % capacity];
        let b = buffer[(index + 1) % capacity];
        a + (b - a) * fraction
    }

    /// Advance the head by the given playback rate, wrapping at the capacity.
    #[inline]
    pub fn advance(&mut self, rate: f64, capacity: usize) {
        self.position += rate;
        if self.position >= capacity as f64 {
            self.position -= capacity as f64;
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_shape() {
        assert!(hann_window(0.0).abs() < 1e-6);
        assert!((hann_window(0.5) - 1.0).abs() < 1e-6);
        assert!(hann_window(0.999).abs() < 1e-4);
    }

    #[test]
    fn interpolated_reads_wrap() {
        let buffer = vec![0.0, 1.0, 0.0, -1.0];
        let mut head = GrainHead::default();

        head.anchor(0.5, buffer.len());
        assert!((head.read(&buffer) - 0.5).abs() < 1e-6);

        // reads across the buffer end interpolate towards index 0
        head.anchor(3.5, buffer.len());
        assert!((head.read(&buffer) - (-0.5)).abs() < 1e-6);

        // negative anchors wrap sign-safe
        head.anchor(-0.5, buffer.len());
        assert!((head.read(&buffer) - (-0.5)).abs() < 1e-6);
    }

    #[test]
    fn advancing_wraps_at_capacity() {
        let mut head = GrainHead::default();
        head.anchor(1022.0, 1024);
        head.advance(1.5, 1024);
        assert!((head.position() - 1023.5).abs() < 1e-9);
        head.advance(1.5, 1024);
        assert!((head.position() - 1.0).abs() < 1e-9);
    }
}
