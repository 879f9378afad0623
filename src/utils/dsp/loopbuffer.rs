//! Capture and loop playback buffers for the looper and freeze effects.

// -------------------------------------------------------------------------------------------------

/// A static, seamlessly loopable stereo buffer, materialized from a linear capture span.
///
/// The buffer is allocated once to its maximum capacity and then rebuilt in place from capture
/// spans, so materialization is safe to run on the real-time thread. Loop boundaries are
/// crossfaded by overlapping the span's last ~5% into its first frames, which makes the
/// wrap-around from the last frame back to frame zero sample-continuous. The materialized
/// loop is shorter than the span by the overlap length.
#[derive(Debug, Clone)]
pub struct LoopBuffer {
    /// Interleaved stereo frames, pre-allocated to `capacity_frames * 2`.
    data: Vec<f32>,
    capacity_frames: usize,
    len_frames: usize,
}

impl LoopBuffer {
    /// Fraction of the span used as boundary crossfade.
    const CROSSFADE_RATIO: f32 = 0.05;

    /// Create a new, empty loop buffer with the given maximum capacity in frames.
    pub fn with_capacity(capacity_frames: usize) -> Self {
        Self {
            data: vec![0.0; capacity_frames * 2],
            capacity_frames,
            len_frames: 0,
        }
    }

    /// The buffer's maximum capacity in frames.
    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    /// The materialized loop length in frames. Zero when no loop is present.
    #[inline]
    pub fn len_frames(&self) -> usize {
        self.len_frames
    }

    /// Returns true when no loop got materialized yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len_frames == 0
    }

    /// Drop the materialized loop.
    pub fn clear(&mut self) {
        self.len_frames = 0;
    }

    /// Rebuild the loop from an interleaved stereo capture span, optionally time-reversed.
    ///
    /// Spans shorter than two frames produce an empty loop. The span is truncated to the
    /// buffer's capacity. Runs without allocating, so it may be called from the audio thread.
    pub fn materialize(&mut self, span: &[f32], reversed: bool) {
        debug_assert!(span.len() % 2 == 0, "Span must contain whole stereo frames");
        let span_frames = (span.len() / 2).min(self.capacity_frames);
        if span_frames < 2 {
            self.len_frames = 0;
            return;
        }
        let source = |frame: usize, channel: usize| -> f32 {
            let frame = if reversed {
                span_frames - 1 - frame
            } else {
                frame
            };
            span[frame * 2 + channel]
        };
        let fade_frames = ((span_frames as f32 * Self::CROSSFADE_RATIO) as usize)
            .clamp(1, span_frames / 2);
        let len_frames = span_frames - fade_frames;
        for frame in 0..len_frames {
            let (left, right) = if frame < fade_frames {
                // overlap the span's tail into its head, ramping the head in
                let ramp = frame as f32 / fade_frames as f32;
                let tail = len_frames + frame;
                (
                    source(frame, 0) * ramp + source(tail, 0) * (1.0 - ramp),
                    source(frame, 1) * ramp + source(tail, 1) * (1.0 - ramp),
                )
            } else {
                (source(frame, 0), source(frame, 1))
            };
            self.data[frame * 2] = left;
            self.data[frame * 2 + 1] = right;
        }
        self.len_frames = len_frames;
    }

    /// Read a stereo frame at an integer position. The position must be within the loop length.
    #[inline]
    pub fn frame(&self, frame: usize) -> (f32, f32) {
        debug_assert!(frame < self.len_frames);
        (self.data[frame * 2], self.data[frame * 2 + 1])
    }

    /// Mutable access to a stereo frame at an integer position, e.g. for overdubbing.
    #[inline]
    pub fn frame_mut(&mut self, frame: usize) -> &mut [f32] {
        debug_assert!(frame < self.len_frames);
        &mut self.data[frame * 2..frame * 2 + 2]
    }

    /// Read a stereo frame at a fractional position with linear interpolation,
    /// wrapping modulo the loop length.
    #[inline]
    pub fn frame_interpolated(&self, position: f64) -> (f32, f32) {
        debug_assert!(!self.is_empty());
        let len = self.len_frames;
        let index = position as usize;
        let fraction = (position - index as f64) as f32;
        let index = index % len;
        let next = (index + 1) % len;
        let left = self.data[index * 2] + (self.data[next * 2] - self.data[index * 2]) * fraction;
        let right = self.data[index * 2 + 1]
            + (self.data[next * 2 + 1] - self.data[index * 2 + 1]) * fraction;
        (left, right)
    }
}

// -------------------------------------------------------------------------------------------------

/// A continuously written stereo ring buffer, holding the most recent frames of the input
/// stream for freeze style capture.
#[derive(Debug, Clone)]
pub struct CaptureRing {
    /// Interleaved stereo frames.
    data: Vec<f32>,
    capacity_frames: usize,
    write_pos: usize,
    filled_frames: usize,
}

impl CaptureRing {
    /// Create a new ring with the given capacity in frames.
    pub fn with_capacity(capacity_frames: usize) -> Self {
        Self {
            data: vec![0.0; capacity_frames * 2],
            capacity_frames,
            write_pos: 0,
            filled_frames: 0,
        }
    }

    /// Number of valid frames captured so far, up to the ring's capacity.
    pub fn filled_frames(&self) -> usize {
        self.filled_frames
    }

    /// Forget all captured audio and restart capturing from position 0.
    pub fn reset(&mut self) {
        self.write_pos = 0;
        self.filled_frames = 0;
    }

    /// Append a stereo frame, overwriting the oldest frame when full.
    #[inline]
    pub fn write_frame(&mut self, left: f32, right: f32) {
        self.data[self.write_pos * 2] = left;
        self.data[self.write_pos * 2 + 1] = right;
        self.write_pos = (self.write_pos + 1) % self.capacity_frames;
        if self.filled_frames < self.capacity_frames {
            self.filled_frames += 1;
        }
    }

    /// Copy the most recent `window_frames` frames in chronological order into the given
    /// interleaved target slice. Returns the number of frames copied, which may be less than
    /// requested when the ring is not yet filled.
    pub fn copy_recent_into(&self, window_frames: usize, target: &mut [f32]) -> usize {
        let frames = window_frames
            .min(self.filled_frames)
            .min(target.len() / 2);
        let start =
            (self.write_pos + self.capacity_frames - frames) % self.capacity_frames;
        for frame in 0..frames {
            let src = (start + frame) % self.capacity_frames;
            target[frame * 2] = self.data[src * 2];
            target[frame * 2 + 1] = self.data[src * 2 + 1];
        }
        frames
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_span(frames: usize) -> Vec<f32> {
        let mut span = Vec::with_capacity(frames * 2);
        for frame in 0..frames {
            span.push(frame as f32);
            span.push(-(frame as f32));
        }
        span
    }

    #[test]
    fn materialize_crossfades_boundary() {
        let mut buffer = LoopBuffer::with_capacity(1000);
        let span = ramp_span(100);
        buffer.materialize(&span, false);

        // 5% overlap shortens the loop
        assert_eq!(buffer.len_frames(), 95);
        // past the fade region the span is copied verbatim
        assert_eq!(buffer.frame(50), (50.0, -50.0));
        // the wrap from the last frame to frame zero is sample-continuous
        let (last, _) = buffer.frame(94);
        let (first, _) = buffer.frame(0);
        assert!((last - (first - 1.0)).abs() < 1.0);
    }

    #[test]
    fn reverse_is_an_involution() {
        let mut forward = LoopBuffer::with_capacity(1000);
        let mut twice = LoopBuffer::with_capacity(1000);
        let span = ramp_span(100);

        forward.materialize(&span, false);
        // reversing the already reversed span restores the forward loop exactly
        let mut reversed_span = Vec::new();
        for frame in (0..100).rev() {
            reversed_span.push(span[frame * 2]);
            reversed_span.push(span[frame * 2 + 1]);
        }
        twice.materialize(&reversed_span, true);

        assert_eq!(forward.len_frames(), twice.len_frames());
        for frame in 0..forward.len_frames() {
            assert_eq!(forward.frame(frame), twice.frame(frame));
        }
    }

    #[test]
    fn empty_and_tiny_spans() {
        let mut buffer = LoopBuffer::with_capacity(1000);
        buffer.materialize(&[], false);
        assert!(buffer.is_empty());
        // a single frame is too short to crossfade and produces no loop
        buffer.materialize(&[1.0, 1.0], false);
        assert!(buffer.is_empty());
        // two frames are the smallest materializable span: one frame loop, one frame fade
        buffer.materialize(&[1.0, 1.0, 2.0, 2.0], false);
        assert_eq!(buffer.len_frames(), 1);
    }

    #[test]
    fn interpolated_reads() {
        let mut buffer = LoopBuffer::with_capacity(1000);
        buffer.materialize(&ramp_span(100), false);
        let (left, right) = buffer.frame_interpolated(50.5);
        assert!((left - 50.5).abs() < 1e-4);
        assert!((right + 50.5).abs() < 1e-4);
    }

    #[test]
    fn ring_keeps_most_recent_frames() {
        let mut ring = CaptureRing::with_capacity(8);
        for i in 0..12 {
            ring.write_frame(i as f32, 0.0);
        }
        assert_eq!(ring.filled_frames(), 8);

        let mut target = vec![0.0; 8];
        let copied = ring.copy_recent_into(4, &mut target);
        assert_eq!(copied, 4);
        assert_eq!(target[0], 8.0);
        assert_eq!(target[6], 11.0);

        // asking for more than captured clamps
        let mut ring = CaptureRing::with_capacity(8);
        ring.write_frame(1.0, 1.0);
        let copied = ring.copy_recent_into(4, &mut target);
        assert_eq!(copied, 1);
    }
}
