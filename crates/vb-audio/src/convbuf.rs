//! Conversion Buffer
//!
//! Per-channel `f64` scratch used by the realtime callback. Capacity only
//! grows, and each growth overshoots the request tenfold so that repeated
//! rate and size changes do not keep reallocating.

use std::mem::size_of;

use vb_core::{STEREO, Sample};

/// Growth multiplier applied to a request that does not fit
pub const GROWTH_FACTOR: usize = 10;

/// Extra bytes added to every allocation
pub const GUARD_BYTES: usize = 8192;

/// Bytes the callback needs for one invocation: the larger of the biggest
/// ring in `f64` stereo frames and twice the device block in `f32` samples.
pub fn required_bytes(max_ring_frames: usize, device_frames: usize) -> usize {
    let ring_bytes = max_ring_frames * STEREO * size_of::<Sample>();
    let device_bytes = 2 * device_frames * STEREO * size_of::<f32>();
    ring_bytes.max(device_bytes)
}

#[derive(Debug, Default)]
pub struct ConversionBuffer {
    samples: Vec<Sample>,
}

impl ConversionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow to hold at least `requested_bytes`.
    ///
    /// Returns `true` when storage was reallocated. A request that already
    /// fits costs one comparison.
    pub fn ensure_capacity(&mut self, requested_bytes: usize) -> bool {
        if requested_bytes <= self.capacity_bytes() {
            return false;
        }

        let bytes = GROWTH_FACTOR * requested_bytes + GUARD_BYTES;
        let samples = bytes.div_ceil(size_of::<Sample>());
        self.samples = vec![0.0; samples];
        true
    }

    #[inline]
    pub fn capacity_bytes(&self) -> usize {
        self.samples.len() * size_of::<Sample>()
    }

    /// First `len` samples, clamped to capacity
    #[inline]
    pub fn region(&mut self, len: usize) -> &mut [Sample] {
        let len = len.min(self.samples.len());
        &mut self.samples[..len]
    }
}
