//! Block resampler for interleaved stereo
//!
//! Wraps rubato's `FftFixedIn` so that callers can hand over blocks of any
//! length: input frames are staged until a full chunk is available, then the
//! resampled chunk is handed to an `emit` closure. All buffers are allocated
//! up front so `process` is allocation-free.

use rubato::{FftFixedIn, Resampler};
use vb_core::{STEREO, Sample};

use crate::{DspError, DspResult};

/// Stereo block resampler (passthrough when both rates are equal)
pub struct BlockResampler {
    /// rubato engine, `None` in passthrough mode
    engine: Option<FftFixedIn<Sample>>,
    /// Fixed number of input frames per rubato call
    chunk_frames: usize,
    /// Deinterleaved input staging (channels x chunk_frames)
    staging: Vec<Vec<Sample>>,
    /// Frames currently staged
    staged: usize,
    /// Deinterleaved rubato output (channels x output_frames_max)
    output: Vec<Vec<Sample>>,
    /// Interleaved copy of the last output chunk
    interleaved: Vec<Sample>,
}

impl BlockResampler {
    /// Create a resampler converting `input_rate` to `output_rate`,
    /// processing `chunk_frames` input frames at a time.
    pub fn new(input_rate: u32, output_rate: u32, chunk_frames: usize) -> DspResult<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(DspError::InvalidConfig(format!(
                "sample rates must be positive ({input_rate} -> {output_rate})"
            )));
        }
        if chunk_frames == 0 {
            return Err(DspError::InvalidConfig("chunk size must be positive".into()));
        }

        if input_rate == output_rate {
            return Ok(Self {
                engine: None,
                chunk_frames,
                staging: Vec::new(),
                staged: 0,
                output: Vec::new(),
                interleaved: Vec::new(),
            });
        }

        let engine = FftFixedIn::<Sample>::new(
            input_rate as usize,
            output_rate as usize,
            chunk_frames,
            1,
            STEREO,
        )
        .map_err(|e| DspError::Resampler(e.to_string()))?;

        let max_out = engine.output_frames_max();
        log::debug!(
            "Resampler {} Hz -> {} Hz: {} frames in, up to {} frames out",
            input_rate,
            output_rate,
            chunk_frames,
            max_out
        );

        Ok(Self {
            engine: Some(engine),
            chunk_frames,
            staging: vec![vec![0.0; chunk_frames]; STEREO],
            staged: 0,
            output: vec![vec![0.0; max_out]; STEREO],
            interleaved: vec![0.0; max_out * STEREO],
        })
    }

    /// Whether blocks are forwarded unchanged
    #[inline]
    pub fn is_passthrough(&self) -> bool {
        self.engine.is_none()
    }

    /// Frames staged but not yet resampled
    pub fn pending_frames(&self) -> usize {
        self.staged
    }

    /// Feed an interleaved block; `emit` receives each resampled interleaved chunk.
    pub fn process<F>(&mut self, input: &[Sample], mut emit: F) -> DspResult<()>
    where
        F: FnMut(&[Sample]),
    {
        let Some(engine) = self.engine.as_mut() else {
            let whole = input.len() - input.len() % STEREO;
            if whole > 0 {
                emit(&input[..whole]);
            }
            return Ok(());
        };

        for frame in input.chunks_exact(STEREO) {
            self.staging[0][self.staged] = frame[0];
            self.staging[1][self.staged] = frame[1];
            self.staged += 1;

            if self.staged == self.chunk_frames {
                self.staged = 0;
                let (_, produced) = engine
                    .process_into_buffer(&self.staging, &mut self.output, None)
                    .map_err(|e| DspError::Resampler(e.to_string()))?;

                for i in 0..produced {
                    self.interleaved[i * STEREO] = self.output[0][i];
                    self.interleaved[i * STEREO + 1] = self.output[1][i];
                }
                emit(&self.interleaved[..produced * STEREO]);
            }
        }

        Ok(())
    }
}
