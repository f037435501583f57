//! Rate Matcher
//!
//! Elastic ring buffer between a writer and a reader running on independent
//! clocks, block sizes and sample rates. The reader always gets a full block:
//! a shortfall is counted as an underflow and filled with silence, a write
//! that does not fit is counted as an overflow and its excess is dropped.
//! Neither side ever waits on the other.
//!
//! The adaptive fill-variance control itself is not modelled here; its
//! tunables are accepted and stored so that a matcher can be swapped in that
//! uses them.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;
use portable_atomic::AtomicF64;
use vb_core::{STEREO, Sample, interleaved_len};

use crate::{AudioRingBuffer, BlockResampler, DspError, DspResult};

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

/// Construction parameters for one rate matcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateMatcherConfig {
    /// Writer block size (frames)
    pub in_size: usize,
    /// Reader block size (frames)
    pub out_size: usize,
    /// Writer sample rate (Hz)
    pub in_rate: u32,
    /// Reader sample rate (Hz)
    pub out_rate: u32,
    /// Ring capacity (frames)
    pub ring_frames: usize,
    /// Starting fill variance
    pub initial_variance: f64,
}

impl RateMatcherConfig {
    pub fn validate(&self) -> DspResult<()> {
        if self.in_size == 0 || self.out_size == 0 {
            return Err(DspError::InvalidConfig(format!(
                "block sizes must be positive ({} / {})",
                self.in_size, self.out_size
            )));
        }
        if self.in_rate == 0 || self.out_rate == 0 {
            return Err(DspError::InvalidConfig(format!(
                "sample rates must be positive ({} / {})",
                self.in_rate, self.out_rate
            )));
        }
        if self.ring_frames == 0 {
            return Err(DspError::InvalidConfig("ring capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Snapshot of a rate matcher's health counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateMatcherDiagnostics {
    pub underflows: u32,
    pub overflows: u32,
    pub fill_variance: f64,
    /// Ring capacity (frames)
    pub ring_capacity: usize,
    /// Frames currently buffered
    pub ring_occupancy: usize,
}

/// Elastic rate matcher
///
/// One writer calls [`feed`](RateMatcher::feed), one reader calls
/// [`drain`](RateMatcher::drain); both may run concurrently on different
/// threads. Tuning calls may come from any thread.
pub trait RateMatcher: Send + Sync {
    /// Parameters this instance was built with
    fn config(&self) -> &RateMatcherConfig;

    /// Push one interleaved block at the writer's rate
    fn feed(&self, block: &[Sample]);

    /// Pull one interleaved block at the reader's rate; always fills `block`
    fn drain(&self, block: &mut [Sample]);

    /// Pin the fill target instead of letting it self-tune
    fn force_variance(&self, enabled: bool, value: f64);

    fn set_feedback_gain(&self, gain: f64);

    /// Change slew time without discarding buffered content
    fn set_slew_time(&self, seconds: f64);

    fn set_proportional_ring_bounds(&self, min: usize, max: usize);

    fn set_feed_forward_ring_bounds(&self, min: usize, max: usize);

    fn set_feed_forward_alpha(&self, alpha: f64);

    fn diagnostics(&self) -> RateMatcherDiagnostics;

    fn reset_diagnostics(&self);

    fn control_flag(&self) -> bool;
}

/// Factory for rate matchers, so channels can be built against any implementation
pub trait RateMatcherBuilder: Send + Sync {
    fn build(&self, config: &RateMatcherConfig) -> DspResult<Box<dyn RateMatcher>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TUNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Tunables for one direction; `None` leaves the matcher's own default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateMatcherTuning {
    pub force_variance: bool,
    pub forced_variance: f64,
    pub feedback_gain: Option<f64>,
    pub slew_time: Option<f64>,
    pub prop_ring_min: Option<usize>,
    pub prop_ring_max: Option<usize>,
    pub ff_ring_min: Option<usize>,
    pub ff_ring_max: Option<usize>,
    pub ff_alpha: Option<f64>,
}

impl Default for RateMatcherTuning {
    fn default() -> Self {
        Self {
            force_variance: false,
            forced_variance: 1.0,
            feedback_gain: None,
            slew_time: None,
            prop_ring_min: None,
            prop_ring_max: None,
            ff_ring_min: None,
            ff_ring_max: None,
            ff_alpha: None,
        }
    }
}

impl RateMatcherTuning {
    /// Re-apply every stored knob to a freshly built matcher
    pub fn apply_to(&self, matcher: &dyn RateMatcher) {
        matcher.force_variance(self.force_variance, self.forced_variance);
        if let Some(gain) = self.feedback_gain {
            matcher.set_feedback_gain(gain);
        }
        if let Some(slew) = self.slew_time {
            matcher.set_slew_time(slew);
        }
        if self.prop_ring_min.is_some() || self.prop_ring_max.is_some() {
            let (min, max) = self.prop_bounds();
            matcher.set_proportional_ring_bounds(min, max);
        }
        if self.ff_ring_min.is_some() || self.ff_ring_max.is_some() {
            let (min, max) = self.ff_bounds();
            matcher.set_feed_forward_ring_bounds(min, max);
        }
        if let Some(alpha) = self.ff_alpha {
            matcher.set_feed_forward_alpha(alpha);
        }
    }

    /// Proportional bounds with unset ends open
    pub fn prop_bounds(&self) -> (usize, usize) {
        (
            self.prop_ring_min.unwrap_or(0),
            self.prop_ring_max.unwrap_or(usize::MAX),
        )
    }

    /// Feed-forward bounds with unset ends open
    pub fn ff_bounds(&self) -> (usize, usize) {
        (
            self.ff_ring_min.unwrap_or(0),
            self.ff_ring_max.unwrap_or(usize::MAX),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELASTIC RATE MATCHER
// ═══════════════════════════════════════════════════════════════════════════════

/// Knobs stored verbatim for inspection
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElasticKnobs {
    pub feedback_gain: Option<f64>,
    pub slew_time: Option<f64>,
    pub prop_bounds: Option<(usize, usize)>,
    pub ff_bounds: Option<(usize, usize)>,
    pub ff_alpha: Option<f64>,
}

/// Default rate matcher: rubato resampling in front of an exact-capacity ring
pub struct ElasticRateMatcher {
    config: RateMatcherConfig,
    /// Interleaved frames, capacity `2 * ring_frames` samples
    ring: AudioRingBuffer,
    /// Writer-side state; only the single feeder takes this lock
    writer: Mutex<BlockResampler>,
    underflows: AtomicU32,
    overflows: AtomicU32,
    forced: AtomicBool,
    forced_variance: AtomicF64,
    variance: AtomicF64,
    fed: AtomicBool,
    knobs: Mutex<ElasticKnobs>,
}

impl ElasticRateMatcher {
    pub fn new(config: RateMatcherConfig) -> DspResult<Self> {
        config.validate()?;

        let resampler = BlockResampler::new(config.in_rate, config.out_rate, config.in_size)?;
        let ring = AudioRingBuffer::new(interleaved_len(config.ring_frames));
        // Start half full so the reader has headroom before the writer catches up
        ring.push_silence(interleaved_len(config.ring_frames / 2));

        Ok(Self {
            config,
            ring,
            writer: Mutex::new(resampler),
            underflows: AtomicU32::new(0),
            overflows: AtomicU32::new(0),
            forced: AtomicBool::new(false),
            forced_variance: AtomicF64::new(config.initial_variance),
            variance: AtomicF64::new(config.initial_variance),
            fed: AtomicBool::new(false),
            knobs: Mutex::new(ElasticKnobs::default()),
        })
    }

    /// Stored tuning knobs
    pub fn knobs(&self) -> ElasticKnobs {
        *self.knobs.lock()
    }
}

impl RateMatcher for ElasticRateMatcher {
    fn config(&self) -> &RateMatcherConfig {
        &self.config
    }

    fn feed(&self, block: &[Sample]) {
        let mut resampler = self.writer.lock();
        let mut dropped = false;
        let result = resampler.process(block, |chunk| {
            if self.ring.push(chunk) < chunk.len() {
                dropped = true;
            }
        });
        if dropped || result.is_err() {
            self.overflows.fetch_add(1, Ordering::Relaxed);
        }
        self.fed.store(true, Ordering::Release);
    }

    fn drain(&self, block: &mut [Sample]) {
        let wanted = block.len() - block.len() % STEREO;
        let got = self.ring.pop(&mut block[..wanted]);
        if got < block.len() {
            block[got..].fill(0.0);
            if got < wanted {
                self.underflows.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn force_variance(&self, enabled: bool, value: f64) {
        self.forced_variance.store(value, Ordering::Relaxed);
        self.forced.store(enabled, Ordering::Release);
    }

    fn set_feedback_gain(&self, gain: f64) {
        self.knobs.lock().feedback_gain = Some(gain);
    }

    fn set_slew_time(&self, seconds: f64) {
        self.knobs.lock().slew_time = Some(seconds);
    }

    fn set_proportional_ring_bounds(&self, min: usize, max: usize) {
        self.knobs.lock().prop_bounds = Some((min, max));
    }

    fn set_feed_forward_ring_bounds(&self, min: usize, max: usize) {
        self.knobs.lock().ff_bounds = Some((min, max));
    }

    fn set_feed_forward_alpha(&self, alpha: f64) {
        self.knobs.lock().ff_alpha = Some(alpha);
    }

    fn diagnostics(&self) -> RateMatcherDiagnostics {
        let fill_variance = if self.forced.load(Ordering::Acquire) {
            self.forced_variance.load(Ordering::Relaxed)
        } else {
            self.variance.load(Ordering::Relaxed)
        };

        RateMatcherDiagnostics {
            underflows: self.underflows.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            fill_variance,
            ring_capacity: self.config.ring_frames,
            ring_occupancy: self.ring.available_read() / STEREO,
        }
    }

    fn reset_diagnostics(&self) {
        self.underflows.store(0, Ordering::Relaxed);
        self.overflows.store(0, Ordering::Relaxed);
    }

    fn control_flag(&self) -> bool {
        self.fed.load(Ordering::Acquire) && !self.forced.load(Ordering::Acquire)
    }
}

/// Builds [`ElasticRateMatcher`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticBuilder;

impl RateMatcherBuilder for ElasticBuilder {
    fn build(&self, config: &RateMatcherConfig) -> DspResult<Box<dyn RateMatcher>> {
        Ok(Box::new(ElasticRateMatcher::new(*config)?))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config(ring_frames: usize) -> RateMatcherConfig {
        RateMatcherConfig {
            in_size: 64,
            out_size: 64,
            in_rate: 48000,
            out_rate: 48000,
            ring_frames,
            initial_variance: 1.0,
        }
    }

    #[test]
    fn test_starts_half_full() {
        let matcher = ElasticRateMatcher::new(config(1000)).unwrap();
        let diags = matcher.diagnostics();
        assert_eq!(diags.ring_capacity, 1000);
        assert_eq!(diags.ring_occupancy, 500);
        assert_eq!(diags.underflows, 0);
        assert_eq!(diags.overflows, 0);
    }

    #[test]
    fn test_feed_then_drain_preserves_content() {
        let matcher = ElasticRateMatcher::new(config(4)).unwrap();
        // drop the priming silence
        let mut prime = [9.0; 4];
        matcher.drain(&mut prime);
        assert_eq!(prime, [0.0; 4]);

        let block = [0.1, 0.2, 0.3, 0.4];
        matcher.feed(&block);

        let mut out = [0.0; 4];
        matcher.drain(&mut out);
        assert_eq!(out, block);
        assert_eq!(matcher.diagnostics().underflows, 0);
    }

    #[test]
    fn test_starved_drain_fills_silence_and_counts_underflow() {
        let matcher = ElasticRateMatcher::new(config(4)).unwrap();
        let mut out = [1.0; 16];
        matcher.drain(&mut out);

        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(matcher.diagnostics().underflows, 1);
    }

    #[test]
    fn test_overfull_feed_counts_overflow() {
        let matcher = ElasticRateMatcher::new(config(8)).unwrap();
        matcher.feed(&[0.5; 32]);

        let diags = matcher.diagnostics();
        assert_eq!(diags.overflows, 1);
        assert_eq!(diags.ring_occupancy, 8);

        matcher.reset_diagnostics();
        assert_eq!(matcher.diagnostics().overflows, 0);
    }

    #[test]
    fn test_forced_variance_reported() {
        let matcher = ElasticRateMatcher::new(config(100)).unwrap();
        assert_relative_eq!(matcher.diagnostics().fill_variance, 1.0);

        matcher.force_variance(true, 0.75);
        assert_relative_eq!(matcher.diagnostics().fill_variance, 0.75);

        matcher.force_variance(false, 0.75);
        assert_relative_eq!(matcher.diagnostics().fill_variance, 1.0);
    }

    #[test]
    fn test_control_flag_follows_feed_and_force() {
        let matcher = ElasticRateMatcher::new(config(100)).unwrap();
        assert!(!matcher.control_flag());

        matcher.feed(&[0.0; 8]);
        assert!(matcher.control_flag());

        matcher.force_variance(true, 1.0);
        assert!(!matcher.control_flag());
    }

    #[test]
    fn test_tuning_reapplied() {
        let matcher = ElasticRateMatcher::new(config(100)).unwrap();
        let tuning = RateMatcherTuning {
            feedback_gain: Some(0.02),
            slew_time: Some(0.005),
            prop_ring_max: Some(4096),
            ff_alpha: Some(0.1),
            ..Default::default()
        };
        tuning.apply_to(&matcher);

        let knobs = matcher.knobs();
        assert_eq!(knobs.feedback_gain, Some(0.02));
        assert_eq!(knobs.slew_time, Some(0.005));
        assert_eq!(knobs.prop_bounds, Some((0, 4096)));
        assert_eq!(knobs.ff_bounds, None);
        assert_eq!(knobs.ff_alpha, Some(0.1));
    }

    #[test]
    fn test_rejects_empty_ring() {
        assert!(ElasticRateMatcher::new(config(0)).is_err());
    }
}
