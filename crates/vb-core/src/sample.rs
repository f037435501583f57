//! Sample types and interleaved block helpers

/// Type alias for audio samples (always f64 inside the bridge)
pub type Sample = f64;

/// Channel count of every interleaved block handled by the bridge.
///
/// Device streams are always opened with two channels, regardless of the
/// logical channel count configured on a channel.
pub const STEREO: usize = 2;

/// Number of interleaved samples needed to hold `frames` stereo frames
#[inline]
pub const fn interleaved_len(frames: usize) -> usize {
    frames * STEREO
}

/// Number of whole stereo frames held by an interleaved block
#[inline]
pub const fn frame_count(interleaved: &[Sample]) -> usize {
    interleaved.len() / STEREO
}
