//! Format conversion and small block operations
//!
//! All functions here operate on caller-provided slices and never allocate,
//! so they are safe to call from the audio callback.

use crate::Sample;

/// Widen device-native `f32` samples into `f64`.
///
/// Converts `min(input.len(), output.len())` samples and returns that count.
#[inline]
pub fn widen_f32(input: &[f32], output: &mut [Sample]) -> usize {
    let n = input.len().min(output.len());
    for (dst, &src) in output[..n].iter_mut().zip(&input[..n]) {
        *dst = Sample::from(src);
    }
    n
}

/// Narrow `f64` samples back to device-native `f32`.
///
/// Converts `min(input.len(), output.len())` samples and returns that count.
#[inline]
pub fn narrow_f32(input: &[Sample], output: &mut [f32]) -> usize {
    let n = input.len().min(output.len());
    for (dst, &src) in output[..n].iter_mut().zip(&input[..n]) {
        *dst = src as f32;
    }
    n
}

/// Mono-sum each interleaved stereo frame into both legs.
///
/// For `frames` frames of `input = [L0, R0, L1, R1, ...]` writes
/// `[L0+R0, L0+R0, L1+R1, L1+R1, ...]` into `output`. `input` and `output`
/// may be the same buffer via [`combine_in_place`].
pub fn combine(frames: usize, input: &[Sample], output: &mut [Sample]) {
    for (dst, src) in output
        .chunks_exact_mut(2)
        .zip(input.chunks_exact(2))
        .take(frames)
    {
        let sum = src[0] + src[1];
        dst[0] = sum;
        dst[1] = sum;
    }
}

/// In-place variant of [`combine`]
pub fn combine_in_place(frames: usize, buffer: &mut [Sample]) {
    for frame in buffer.chunks_exact_mut(2).take(frames) {
        let sum = frame[0] + frame[1];
        frame[0] = sum;
        frame[1] = sum;
    }
}

/// Scale `2 * frames` interleaved samples: `output[i] = k * input[i]`
pub fn scale(frames: usize, input: &[Sample], k: Sample, output: &mut [Sample]) {
    let n = (2 * frames).min(input.len()).min(output.len());
    for (dst, &src) in output[..n].iter_mut().zip(&input[..n]) {
        *dst = k * src;
    }
}

/// In-place variant of [`scale`]
pub fn scale_in_place(frames: usize, buffer: &mut [Sample], k: Sample) {
    let n = (2 * frames).min(buffer.len());
    for sample in &mut buffer[..n] {
        *sample *= k;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_combine_sums_each_frame_into_both_legs() {
        let input = [1.0, 2.0, 3.0, 4.0, -0.5, 0.25];
        let mut output = [0.0; 6];
        combine(3, &input, &mut output);
        assert_eq!(output, [3.0, 3.0, 7.0, 7.0, -0.25, -0.25]);
    }

    #[test]
    fn test_combine_in_place_matches_out_of_place() {
        let input = [0.1, 0.2, 0.3, 0.4];
        let mut expected = [0.0; 4];
        combine(2, &input, &mut expected);

        let mut buffer = input;
        combine_in_place(2, &mut buffer);
        assert_eq!(buffer, expected);
    }

    #[test]
    fn test_combine_respects_frame_count() {
        let mut buffer = [1.0, 1.0, 2.0, 2.0];
        combine_in_place(1, &mut buffer);
        assert_eq!(buffer, [2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_scale_zero_and_identity() {
        let input: Vec<Sample> = (0..8).map(|i| i as Sample * 0.3 - 1.0).collect();

        let mut zeros = vec![1.0; 8];
        scale(4, &input, 0.0, &mut zeros);
        assert!(zeros.iter().all(|&s| s == 0.0));

        let mut identity = vec![0.0; 8];
        scale(4, &input, 1.0, &mut identity);
        assert_eq!(identity, input);
    }

    #[test]
    fn test_scale_gain() {
        let input = [0.5, -0.5, 0.25, 1.0];
        let mut output = [0.0; 4];
        scale(2, &input, 2.0, &mut output);
        assert_eq!(output, [1.0, -1.0, 0.5, 2.0]);

        let mut buffer = input;
        scale_in_place(2, &mut buffer, 2.0);
        assert_eq!(buffer, output);
    }

    #[test]
    fn test_widen_narrow() {
        let device = [0.5f32, -0.25, 1.0, 0.0];
        let mut wide = [0.0; 4];
        assert_eq!(widen_f32(&device, &mut wide), 4);
        assert_relative_eq!(wide[1], -0.25);

        let mut narrow = [9.0f32; 4];
        assert_eq!(narrow_f32(&wide, &mut narrow), 4);
        assert_eq!(narrow, device);
    }
}
