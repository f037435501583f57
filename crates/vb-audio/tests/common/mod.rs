//! Shared test doubles: a scripted backend and a counting rate matcher.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use vb_audio::{
    Backend, DuplexCallback, DuplexStream, HostCapabilities, IoDirection, StreamError, StreamInfo,
    StreamRequest, capabilities_for, shared_capabilities_for,
};
use vb_core::Sample;
use vb_dsp::{
    DspResult, RateMatcher, RateMatcherBuilder, RateMatcherConfig, RateMatcherDiagnostics,
};

// ═══════════════════════════════════════════════════════════════════════════════
// COUNTING RATE MATCHER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct MatcherCounters {
    pub builds: AtomicUsize,
    pub feeds: AtomicUsize,
    pub drains: AtomicUsize,
}

impl MatcherCounters {
    pub fn calls(&self) -> usize {
        self.feeds.load(Ordering::SeqCst) + self.drains.load(Ordering::SeqCst)
    }
}

pub struct CountingMatcher {
    config: RateMatcherConfig,
    counters: Arc<MatcherCounters>,
}

impl RateMatcher for CountingMatcher {
    fn config(&self) -> &RateMatcherConfig {
        &self.config
    }

    fn feed(&self, _block: &[Sample]) {
        self.counters.feeds.fetch_add(1, Ordering::SeqCst);
    }

    fn drain(&self, block: &mut [Sample]) {
        self.counters.drains.fetch_add(1, Ordering::SeqCst);
        block.fill(0.25);
    }

    fn force_variance(&self, _enabled: bool, _value: f64) {}
    fn set_feedback_gain(&self, _gain: f64) {}
    fn set_slew_time(&self, _seconds: f64) {}
    fn set_proportional_ring_bounds(&self, _min: usize, _max: usize) {}
    fn set_feed_forward_ring_bounds(&self, _min: usize, _max: usize) {}
    fn set_feed_forward_alpha(&self, _alpha: f64) {}

    fn diagnostics(&self) -> RateMatcherDiagnostics {
        RateMatcherDiagnostics {
            underflows: 0,
            overflows: 0,
            fill_variance: self.config.initial_variance,
            ring_capacity: self.config.ring_frames,
            ring_occupancy: 0,
        }
    }

    fn reset_diagnostics(&self) {}

    fn control_flag(&self) -> bool {
        false
    }
}

#[derive(Default)]
pub struct CountingBuilder {
    pub counters: Arc<MatcherCounters>,
}

impl RateMatcherBuilder for CountingBuilder {
    fn build(&self, config: &RateMatcherConfig) -> DspResult<Box<dyn RateMatcher>> {
        self.counters.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingMatcher {
            config: *config,
            counters: Arc::clone(&self.counters),
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MOCK BACKEND
// ═══════════════════════════════════════════════════════════════════════════════

/// Stream state observable from the test after the backend handed it out
#[derive(Default)]
pub struct StreamStatus {
    pub started: AtomicBool,
    pub stops: AtomicUsize,
    pub fail_start: AtomicBool,
    /// Device went away
    pub dead: AtomicBool,
}

pub struct MockStream {
    info: StreamInfo,
    status: Arc<StreamStatus>,
}

impl DuplexStream for MockStream {
    fn start(&mut self) -> Result<(), StreamError> {
        if self.status.fail_start.load(Ordering::SeqCst) {
            return Err(StreamError::Backend {
                code: -99,
                message: "start refused".into(),
            });
        }
        self.status.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.status.started.store(false, Ordering::SeqCst);
        self.status.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn info(&self) -> StreamInfo {
        self.info.clone()
    }

    fn is_alive(&self) -> bool {
        !self.status.dead.load(Ordering::SeqCst)
    }
}

/// Backend with one host of a fixed name and a fixed number of devices
pub struct MockBackend {
    pub host_name: String,
    pub input_devices: usize,
    pub output_devices: usize,
    pub opens: AtomicUsize,
    pub last_request: Mutex<Option<StreamRequest>>,
    pub callback: Mutex<Option<DuplexCallback>>,
    pub status: Arc<StreamStatus>,
    /// Report hosts the way a shared-mode-only transport does
    pub shared_only: AtomicBool,
}

impl MockBackend {
    pub fn new(host_name: &str, input_devices: usize, output_devices: usize) -> Self {
        Self {
            host_name: host_name.to_string(),
            input_devices,
            output_devices,
            opens: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            callback: Mutex::new(None),
            status: Arc::new(StreamStatus::default()),
            shared_only: AtomicBool::new(false),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Run the captured realtime callback once, as the device thread would
    pub fn run_callback(&self, input: &mut [f32], output: &mut [f32]) -> bool {
        match self.callback.lock().as_mut() {
            Some(callback) => {
                callback(input, output);
                true
            }
            None => false,
        }
    }
}

impl Backend for MockBackend {
    fn host_capabilities(&self, host: usize) -> Option<Box<dyn HostCapabilities>> {
        (host == 0).then(|| {
            if self.shared_only.load(Ordering::SeqCst) {
                shared_capabilities_for(&self.host_name)
            } else {
                capabilities_for(&self.host_name)
            }
        })
    }

    fn resolve_device(&self, host: usize, device: usize, direction: IoDirection) -> Option<usize> {
        let count = match direction {
            IoDirection::Input => self.input_devices,
            IoDirection::Output => self.output_devices,
        };
        (host == 0 && device < count).then_some(device)
    }

    fn open_duplex(
        &self,
        request: &StreamRequest,
        callback: DuplexCallback,
    ) -> Result<Box<dyn DuplexStream>, StreamError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        *self.callback.lock() = Some(callback);

        Ok(Box::new(MockStream {
            info: StreamInfo {
                sample_rate: request.sample_rate,
                frames_per_buffer: request.frames_per_buffer,
                input_latency: request.input.suggested_latency,
                output_latency: request.output.suggested_latency,
                host: self.host_name.clone(),
            },
            status: Arc::clone(&self.status),
        }))
    }
}
