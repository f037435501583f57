//! Channel Mixer
//!
//! Sums several engine-side streams, each at its own sample rate, into one
//! output stream of fixed block size. Every input owns a lane: a resampler to
//! the output rate and an SPSC ring. A block is emitted to the sink as soon as
//! every active lane holds one; inactive lanes are neither waited on nor kept.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use vb_core::{Sample, interleaved_len};

use crate::{AudioRingBuffer, BlockResampler, DspError, DspResult};

/// Upper bound on mixer inputs
pub const MAX_MIX_INPUTS: usize = 8;

/// Blocks of headroom per lane
const LANE_BLOCKS: usize = 8;

/// Receives each mixed interleaved block
pub type MixSink = Box<dyn Fn(&[Sample]) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct MixerConfig {
    /// One entry per input (Hz)
    pub input_rates: Vec<u32>,
    pub out_rate: u32,
    /// Frames per emitted block
    pub out_size: usize,
}

impl MixerConfig {
    pub fn validate(&self) -> DspResult<()> {
        if self.input_rates.is_empty() || self.input_rates.len() > MAX_MIX_INPUTS {
            return Err(DspError::InvalidConfig(format!(
                "mixer needs 1..={} inputs, got {}",
                MAX_MIX_INPUTS,
                self.input_rates.len()
            )));
        }
        if self.out_rate == 0 || self.input_rates.contains(&0) {
            return Err(DspError::InvalidConfig("mixer rates must be positive".into()));
        }
        if self.out_size == 0 {
            return Err(DspError::InvalidConfig("mixer block size must be positive".into()));
        }
        Ok(())
    }
}

/// Volume state, copied once per emitted block
#[derive(Debug, Clone, Copy)]
struct MixVolumes {
    master: f64,
    input: [f64; MAX_MIX_INPUTS],
    trim: [f64; MAX_MIX_INPUTS],
}

impl MixVolumes {
    #[inline]
    fn gain(&self, index: usize) -> f64 {
        self.input[index] * self.trim[index] * self.master
    }
}

impl Default for MixVolumes {
    fn default() -> Self {
        Self {
            master: 1.0,
            input: [1.0; MAX_MIX_INPUTS],
            trim: [1.0; MAX_MIX_INPUTS],
        }
    }
}

struct MixLane {
    /// Producer side; serialises writers of this input
    resampler: Mutex<BlockResampler>,
    ring: AudioRingBuffer,
    active: AtomicBool,
    /// Input frames handed to the resampler per step
    step_frames: usize,
}

struct MixScratch {
    block: Vec<Sample>,
    sum: Vec<Sample>,
}

/// N-input weighted summing mixer
pub struct ChannelMixer {
    config: MixerConfig,
    lanes: Vec<MixLane>,
    /// Consumer side of every lane; held while a block is assembled
    scratch: Mutex<MixScratch>,
    volumes: Mutex<MixVolumes>,
    sink: MixSink,
}

impl ChannelMixer {
    /// Build a mixer; all inputs start active at unity gain.
    pub fn new(config: MixerConfig, sink: MixSink) -> DspResult<Self> {
        config.validate()?;

        let block_frames = config.out_size;
        let lanes = config
            .input_rates
            .iter()
            .map(|&rate| {
                let step_frames =
                    ((block_frames as u64 * rate as u64) / config.out_rate as u64).max(1) as usize;
                Ok(MixLane {
                    resampler: Mutex::new(BlockResampler::new(rate, config.out_rate, step_frames)?),
                    ring: AudioRingBuffer::new(interleaved_len(block_frames * LANE_BLOCKS)),
                    active: AtomicBool::new(true),
                    step_frames,
                })
            })
            .collect::<DspResult<Vec<_>>>()?;

        log::debug!(
            "Mixer: {} inputs {:?} Hz -> {} Hz, {} frames/block",
            lanes.len(),
            config.input_rates,
            config.out_rate,
            block_frames
        );

        Ok(Self {
            scratch: Mutex::new(MixScratch {
                block: vec![0.0; interleaved_len(block_frames)],
                sum: vec![0.0; interleaved_len(block_frames)],
            }),
            config,
            lanes,
            volumes: Mutex::new(MixVolumes::default()),
            sink,
        })
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    fn lane(&self, index: usize) -> DspResult<&MixLane> {
        self.lanes.get(index).ok_or(DspError::InputOutOfRange {
            index,
            inputs: self.lanes.len(),
        })
    }

    /// Hand one interleaved block to input `index`.
    ///
    /// Data for an inactive input is discarded.
    pub fn mix_input(&self, index: usize, data: &[Sample]) -> DspResult<()> {
        let lane = self.lane(index)?;
        if !lane.active.load(Ordering::Acquire) {
            return Ok(());
        }

        for part in data.chunks(interleaved_len(lane.step_frames)) {
            lane.resampler.lock().process(part, |chunk| {
                // a lane that is not being drained drops its newest frames
                lane.ring.push(chunk);
            })?;
            self.emit_ready();
        }
        Ok(())
    }

    /// Emit every block that all active lanes can supply
    fn emit_ready(&self) {
        let mut scratch = self.scratch.lock();
        let block_len = interleaved_len(self.config.out_size);

        loop {
            let mut any_active = false;
            for lane in &self.lanes {
                if lane.active.load(Ordering::Acquire) {
                    any_active = true;
                    if lane.ring.available_read() < block_len {
                        return;
                    }
                }
            }
            if !any_active {
                return;
            }

            let volumes = *self.volumes.lock();
            let MixScratch { block, sum } = &mut *scratch;
            sum.fill(0.0);

            for (index, lane) in self.lanes.iter().enumerate() {
                if !lane.active.load(Ordering::Acquire) {
                    continue;
                }
                let got = lane.ring.pop(block);
                block[got..].fill(0.0);

                let gain = volumes.gain(index);
                for (acc, &sample) in sum.iter_mut().zip(block.iter()) {
                    *acc += gain * sample;
                }
            }

            (self.sink)(sum);
        }
    }

    /// Mute (inactive) or unmute an input. Muting discards what it holds.
    pub fn set_active(&self, index: usize, active: bool) -> DspResult<()> {
        let lane = self.lane(index)?;
        let _consumer = self.scratch.lock();
        lane.active.store(active, Ordering::Release);
        if !active {
            lane.ring.clear();
        }
        Ok(())
    }

    pub fn is_active(&self, index: usize) -> DspResult<bool> {
        Ok(self.lane(index)?.active.load(Ordering::Acquire))
    }

    pub fn set_input_volume(&self, index: usize, volume: f64) -> DspResult<()> {
        self.lane(index)?;
        self.volumes.lock().input[index] = volume;
        Ok(())
    }

    pub fn input_volume(&self, index: usize) -> DspResult<f64> {
        self.lane(index)?;
        Ok(self.volumes.lock().input[index])
    }

    /// Secondary per-input gain, multiplied with the input volume
    pub fn set_input_trim(&self, index: usize, trim: f64) -> DspResult<()> {
        self.lane(index)?;
        self.volumes.lock().trim[index] = trim;
        Ok(())
    }

    pub fn input_trim(&self, index: usize) -> DspResult<f64> {
        self.lane(index)?;
        Ok(self.volumes.lock().trim[index])
    }

    pub fn set_master_volume(&self, volume: f64) {
        self.volumes.lock().master = volume;
    }

    pub fn master_volume(&self) -> f64 {
        self.volumes.lock().master
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
