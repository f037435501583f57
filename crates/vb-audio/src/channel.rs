//! Channel: one virtual cable between a device stream and the engine
//!
//! A channel owns a [`Pipeline`] (inbound and outbound rate matchers), a
//! [`ChannelMixer`] in front of the outbound matcher, a [`ConversionBuffer`]
//! for the realtime callback and the device stream handle.
//!
//! Control calls may come from any thread. Parameter state sits behind a
//! mutex the realtime path never takes; the realtime path sees the pipeline
//! and mixer only through `ArcSwap`, so a reconfiguration builds complete
//! replacements and publishes each with a single pointer swap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use portable_atomic::AtomicF64;
use vb_core::{Sample, combine_in_place, frame_count, scale_in_place};
use vb_dsp::{
    ChannelMixer, MixerConfig, RateMatcherBuilder, RateMatcherDiagnostics, RateMatcherTuning,
};

use crate::callback;
use crate::convbuf::{ConversionBuffer, required_bytes};
use crate::routing::{MonitorRouting, RX_AUDIO_INPUT, TX_MONITOR_INPUT};
use crate::{
    ChannelConfig, ChannelResult, Direction, DuplexStream, Pipeline, PriorityState, StreamError,
    StreamInfo,
};

/// Engine-side stream handed to [`Channel::push_engine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSource {
    /// Raw IQ, used when the channel is in IQ mode
    Iq,
    /// Receive audio (mixer input 0)
    RxAudio,
    /// Transmit monitor (mixer input 1)
    TxMonitor,
}

/// Mixer gains kept by the channel and re-applied to every rebuilt mixer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerSettings {
    /// Volume per mixer input
    pub input_volume: [f64; 2],
    /// Extra gain on the transmit monitor input
    pub tx_monitor_trim: f64,
    pub master: f64,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            input_volume: [1.0; 2],
            tx_monitor_trim: 1.0,
            master: 1.0,
        }
    }
}

/// What a parameter change invalidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rebuild {
    Nothing,
    Matchers,
    Mixer,
    MixerAndMatchers,
}

/// Control-side parameter state
struct ChannelState {
    config: ChannelConfig,
    routing: MonitorRouting,
    tuning: [RateMatcherTuning; 2],
    mixer: MixerSettings,
}

/// State shared with the realtime callback
pub(crate) struct ChannelShared {
    pub(crate) run: AtomicBool,
    iq_type: AtomicBool,
    bypass: AtomicBool,
    combine_input: AtomicBool,
    preamp: AtomicF64,
    pub(crate) pipeline: Arc<ArcSwap<Pipeline>>,
    mixer: ArcSwap<ChannelMixer>,
    pub(crate) convbuf: Mutex<ConversionBuffer>,
    priority: Mutex<PriorityState>,
    priority_pending: AtomicBool,
    /// Sink for mic blocks pulled while bypassed
    discard: Mutex<Vec<Sample>>,
}

impl ChannelShared {
    /// Reset priority bookkeeping for a new stream.
    ///
    /// `lazy` arms a one-shot elevation on the first callback.
    pub(crate) fn arm_priority(&self, lazy: bool) {
        let mut state = self.priority.lock();
        state.release();
        if lazy {
            *state = PriorityState::Pending;
        }
        self.priority_pending.store(lazy, Ordering::Release);
    }

    #[inline]
    pub(crate) fn attempt_priority(&self) {
        if self.priority_pending.load(Ordering::Relaxed)
            && self.priority_pending.swap(false, Ordering::AcqRel)
        {
            self.priority.lock().attempt();
        }
    }

    pub(crate) fn release_priority(&self) {
        self.priority_pending.store(false, Ordering::Release);
        self.priority.lock().release();
    }
}

pub struct Channel {
    id: usize,
    builder: Arc<dyn RateMatcherBuilder>,
    shared: Arc<ChannelShared>,
    state: Mutex<ChannelState>,
    stream: Mutex<Option<Box<dyn DuplexStream>>>,
    stream_info: Mutex<Option<StreamInfo>>,
}

impl Channel {
    /// Build a channel with its rate matchers and mixer.
    ///
    /// Receive audio starts unmuted and the transmit monitor muted.
    pub fn new(
        id: usize,
        config: ChannelConfig,
        builder: Arc<dyn RateMatcherBuilder>,
    ) -> ChannelResult<Self> {
        config.validate()?;

        let state = ChannelState {
            config,
            routing: MonitorRouting::default(),
            tuning: [RateMatcherTuning::default(); 2],
            mixer: MixerSettings::default(),
        };

        let pipeline = Pipeline::build(builder.as_ref(), &state.config)?;
        let mut convbuf = ConversionBuffer::new();
        convbuf.ensure_capacity(required_bytes(
            pipeline.max_ring_size(),
            state.config.vac_size,
        ));
        let pipeline = Arc::new(ArcSwap::from_pointee(pipeline));
        let mixer = build_mixer(&state, &pipeline)?;

        log::info!(
            "Channel {} created: {} mode, vac {} Hz / {} frames, rings {} / {} frames",
            id,
            if state.config.iq_type { "IQ" } else { "audio" },
            state.config.vac_rate,
            state.config.vac_size,
            state.config.in_ring_size(),
            state.config.out_ring_size()
        );

        let shared = ChannelShared {
            run: AtomicBool::new(state.config.run),
            iq_type: AtomicBool::new(state.config.iq_type),
            bypass: AtomicBool::new(false),
            combine_input: AtomicBool::new(false),
            preamp: AtomicF64::new(1.0),
            pipeline,
            mixer: ArcSwap::from_pointee(mixer),
            convbuf: Mutex::new(convbuf),
            priority: Mutex::new(PriorityState::Inactive),
            priority_pending: AtomicBool::new(false),
            discard: Mutex::new(Vec::new()),
        };

        Ok(Self {
            id,
            builder,
            shared: Arc::new(shared),
            state: Mutex::new(state),
            stream: Mutex::new(None),
            stream_info: Mutex::new(None),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Snapshot of the current parameters
    pub fn config(&self) -> ChannelConfig {
        self.state.lock().config.clone()
    }

    pub fn routing(&self) -> MonitorRouting {
        self.state.lock().routing
    }

    pub fn tuning(&self, direction: Direction) -> RateMatcherTuning {
        self.state.lock().tuning[direction.index()]
    }

    pub fn mixer_settings(&self) -> MixerSettings {
        self.state.lock().mixer
    }

    /// Currently published mixer
    pub fn mixer(&self) -> Arc<ChannelMixer> {
        self.shared.mixer.load_full()
    }

    /// Currently published rate matcher pair
    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.shared.pipeline.load_full()
    }

    pub fn in_ring_size(&self) -> usize {
        self.shared.pipeline.load().in_ring_size
    }

    pub fn out_ring_size(&self) -> usize {
        self.shared.pipeline.load().out_ring_size
    }

    pub fn conversion_capacity_bytes(&self) -> usize {
        self.shared.convbuf.lock().capacity_bytes()
    }

    pub fn is_running(&self) -> bool {
        self.shared.run.load(Ordering::Acquire)
    }

    pub fn preamp(&self) -> f64 {
        self.shared.preamp.load(Ordering::Relaxed)
    }

    pub fn priority_label(&self) -> &'static str {
        self.shared.priority.lock().label()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RECONFIGURATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Apply `change` and rebuild whatever it reports as invalidated.
    ///
    /// An unchanged config rebuilds nothing. Every changed config is
    /// validated, including stored-only fields, and a rejected change leaves
    /// the previous parameters in place.
    fn update<F>(&self, change: F) -> ChannelResult<()>
    where
        F: FnOnce(&mut ChannelConfig) -> Rebuild,
    {
        let mut state = self.state.lock();
        let previous = state.config.clone();
        let rebuild = change(&mut state.config);
        if state.config == previous {
            return Ok(());
        }

        let result = state.config.validate().and_then(|_| match rebuild {
            Rebuild::Nothing => Ok(()),
            Rebuild::Matchers => self.rebuild_pipeline(&state),
            Rebuild::Mixer => self.rebuild_mixer(&state),
            Rebuild::MixerAndMatchers => self
                .rebuild_mixer(&state)
                .and_then(|_| self.rebuild_pipeline(&state)),
        });

        if result.is_err() {
            state.config = previous;
        }
        result
    }

    fn rebuild_pipeline(&self, state: &ChannelState) -> ChannelResult<()> {
        let pipeline = Pipeline::build(self.builder.as_ref(), &state.config)?;
        for direction in Direction::ALL {
            state.tuning[direction.index()].apply_to(pipeline.matcher(direction));
        }

        let bytes = required_bytes(pipeline.max_ring_size(), state.config.vac_size);
        log::info!(
            "Channel {}: rate matchers rebuilt (rings {} / {} frames)",
            self.id,
            pipeline.in_ring_size,
            pipeline.out_ring_size
        );
        self.shared.convbuf.lock().ensure_capacity(bytes);
        self.shared.pipeline.store(Arc::new(pipeline));
        Ok(())
    }

    fn rebuild_mixer(&self, state: &ChannelState) -> ChannelResult<()> {
        let mixer = build_mixer(state, &self.shared.pipeline)?;
        log::info!(
            "Channel {}: mixer rebuilt ({} / {} Hz -> {} frames)",
            self.id,
            state.config.audio_rate,
            state.config.txmon_rate,
            state.config.audio_size
        );
        self.shared.mixer.store(Arc::new(mixer));
        Ok(())
    }

    pub fn set_run(&self, run: bool) {
        self.state.lock().config.run = run;
        self.shared.run.store(run, Ordering::Release);
    }

    pub fn set_iq_type(&self, iq_type: bool) -> ChannelResult<()> {
        self.update(|c| {
            c.iq_type = iq_type;
            Rebuild::Matchers
        })?;
        self.shared.iq_type.store(iq_type, Ordering::Release);
        Ok(())
    }

    pub fn set_stereo(&self, stereo: bool) {
        self.state.lock().config.stereo = stereo;
    }

    pub fn set_exclusive(&self, exclusive: bool) {
        self.state.lock().config.exclusive = exclusive;
    }

    pub fn set_num_channels(&self, channels: u16) {
        self.state.lock().config.num_channels = channels;
    }

    pub fn set_host(&self, host: usize) {
        self.state.lock().config.devices.host = host;
    }

    pub fn set_input_device(&self, device: usize) {
        self.state.lock().config.devices.input = device;
    }

    pub fn set_output_device(&self, device: usize) {
        self.state.lock().config.devices.output = device;
    }

    pub fn set_iq_rate(&self, rate: u32) -> ChannelResult<()> {
        self.update(|c| {
            c.iq_rate = rate;
            if c.iq_type { Rebuild::Matchers } else { Rebuild::Nothing }
        })
    }

    pub fn set_mic_rate(&self, rate: u32) -> ChannelResult<()> {
        self.update(|c| {
            c.mic_rate = rate;
            Rebuild::Matchers
        })
    }

    pub fn set_audio_rate(&self, rate: u32) -> ChannelResult<()> {
        self.update(|c| {
            c.audio_rate = rate;
            Rebuild::MixerAndMatchers
        })
    }

    pub fn set_txmon_rate(&self, rate: u32) -> ChannelResult<()> {
        self.update(|c| {
            c.txmon_rate = rate;
            Rebuild::Mixer
        })
    }

    pub fn set_vac_rate(&self, rate: u32) -> ChannelResult<()> {
        self.update(|c| {
            c.vac_rate = rate;
            Rebuild::Matchers
        })
    }

    pub fn set_mic_size(&self, size: usize) -> ChannelResult<()> {
        self.update(|c| {
            c.mic_size = size;
            Rebuild::Matchers
        })
    }

    pub fn set_iq_size_and_rate(&self, size: usize, rate: u32) -> ChannelResult<()> {
        self.update(|c| {
            c.iq_size = size;
            c.iq_rate = rate;
            if c.iq_type { Rebuild::Matchers } else { Rebuild::Nothing }
        })
    }

    pub fn set_audio_size(&self, size: usize) -> ChannelResult<()> {
        self.update(|c| {
            c.audio_size = size;
            Rebuild::MixerAndMatchers
        })
    }

    /// Validated and stored; the monitor stream is resampled per block
    pub fn set_txmon_size(&self, size: usize) -> ChannelResult<()> {
        self.update(|c| {
            c.txmon_size = size;
            Rebuild::Nothing
        })
    }

    pub fn set_vac_size(&self, size: usize) -> ChannelResult<()> {
        self.update(|c| {
            c.vac_size = size;
            Rebuild::Matchers
        })
    }

    pub fn set_in_latency(&self, seconds: f64) -> ChannelResult<()> {
        self.update(|c| {
            c.in_latency = seconds;
            Rebuild::Matchers
        })
    }

    pub fn set_out_latency(&self, seconds: f64) -> ChannelResult<()> {
        self.update(|c| {
            c.out_latency = seconds;
            Rebuild::Matchers
        })
    }

    pub fn set_device_in_latency(&self, seconds: f64) {
        self.state.lock().config.device_in_latency = seconds;
    }

    pub fn set_device_out_latency(&self, seconds: f64) {
        self.state.lock().config.device_out_latency = seconds;
    }

    pub fn set_initial_variance(&self, direction: Direction, variance: f64) -> ChannelResult<()> {
        self.update(|c| {
            match direction {
                Direction::FromDevice => c.initial_variance_in = variance,
                Direction::ToDevice => c.initial_variance_out = variance,
            }
            Rebuild::Matchers
        })
    }

    pub fn set_initial_variances(&self, inbound: f64, outbound: f64) -> ChannelResult<()> {
        self.update(|c| {
            c.initial_variance_in = inbound;
            c.initial_variance_out = outbound;
            Rebuild::Matchers
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ROUTING AND GAIN
    // ═══════════════════════════════════════════════════════════════════════════

    fn set_routing<F: FnOnce(&mut MonitorRouting)>(&self, change: F) -> ChannelResult<()> {
        let mut state = self.state.lock();
        change(&mut state.routing);
        let mixer = self.shared.mixer.load();
        for (index, active) in state.routing.active_inputs().into_iter().enumerate() {
            mixer.set_active(index, active)?;
        }
        Ok(())
    }

    pub fn set_vox(&self, vox: bool) -> ChannelResult<()> {
        self.set_routing(|r| r.vox = vox)
    }

    /// Transmitting
    pub fn set_mox(&self, mox: bool) -> ChannelResult<()> {
        self.set_routing(|r| r.mox = mox)
    }

    /// Monitor transmit audio while transmitting
    pub fn set_mon(&self, mon: bool) -> ChannelResult<()> {
        self.set_routing(|r| r.mon = mon)
    }

    /// Volume of the transmit monitor input
    pub fn set_monitor_volume(&self, volume: f64) -> ChannelResult<()> {
        let mut state = self.state.lock();
        state.mixer.input_volume[TX_MONITOR_INPUT] = volume;
        self.shared
            .mixer
            .load()
            .set_input_volume(TX_MONITOR_INPUT, volume)?;
        Ok(())
    }

    /// Trim gain applied only to the transmit monitor input
    pub fn set_tx_monitor_gain(&self, gain: f64) -> ChannelResult<()> {
        let mut state = self.state.lock();
        state.mixer.tx_monitor_trim = gain;
        self.shared
            .mixer
            .load()
            .set_input_trim(TX_MONITOR_INPUT, gain)?;
        Ok(())
    }

    /// Output scale of the receive path (mixer master volume)
    pub fn set_rx_scale(&self, scale: f64) {
        self.set_master_volume(scale);
    }

    pub(crate) fn set_master_volume(&self, volume: f64) {
        let mut state = self.state.lock();
        state.mixer.master = volume;
        self.shared.mixer.load().set_master_volume(volume);
    }

    /// Gain applied to mic blocks handed to the engine
    pub fn set_preamp(&self, gain: f64) {
        self.shared.preamp.store(gain, Ordering::Relaxed);
    }

    pub fn set_bypass(&self, bypass: bool) {
        self.shared.bypass.store(bypass, Ordering::Release);
    }

    /// Mono-sum both input legs of mic blocks
    pub fn set_combine_input(&self, combine: bool) {
        self.shared.combine_input.store(combine, Ordering::Release);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RATE MATCHER TUNING
    // ═══════════════════════════════════════════════════════════════════════════

    fn tune<F>(&self, direction: Direction, change: F)
    where
        F: FnOnce(&mut RateMatcherTuning, &dyn vb_dsp::RateMatcher),
    {
        let mut state = self.state.lock();
        let pipeline = self.shared.pipeline.load();
        change(&mut state.tuning[direction.index()], pipeline.matcher(direction));
    }

    pub fn force_variance(&self, direction: Direction, enabled: bool, value: f64) {
        self.tune(direction, |t, m| {
            t.force_variance = enabled;
            t.forced_variance = value;
            m.force_variance(enabled, value);
        });
    }

    pub fn set_feedback_gain(&self, direction: Direction, gain: f64) {
        self.tune(direction, |t, m| {
            t.feedback_gain = Some(gain);
            m.set_feedback_gain(gain);
        });
    }

    pub fn set_slew_time(&self, direction: Direction, seconds: f64) {
        self.tune(direction, |t, m| {
            t.slew_time = Some(seconds);
            m.set_slew_time(seconds);
        });
    }

    pub fn set_prop_ring_min(&self, direction: Direction, frames: usize) {
        self.tune(direction, |t, m| {
            t.prop_ring_min = Some(frames);
            let (min, max) = t.prop_bounds();
            m.set_proportional_ring_bounds(min, max);
        });
    }

    pub fn set_prop_ring_max(&self, direction: Direction, frames: usize) {
        self.tune(direction, |t, m| {
            t.prop_ring_max = Some(frames);
            let (min, max) = t.prop_bounds();
            m.set_proportional_ring_bounds(min, max);
        });
    }

    pub fn set_ff_ring_min(&self, direction: Direction, frames: usize) {
        self.tune(direction, |t, m| {
            t.ff_ring_min = Some(frames);
            let (min, max) = t.ff_bounds();
            m.set_feed_forward_ring_bounds(min, max);
        });
    }

    pub fn set_ff_ring_max(&self, direction: Direction, frames: usize) {
        self.tune(direction, |t, m| {
            t.ff_ring_max = Some(frames);
            let (min, max) = t.ff_bounds();
            m.set_feed_forward_ring_bounds(min, max);
        });
    }

    pub fn set_ff_alpha(&self, direction: Direction, alpha: f64) {
        self.tune(direction, |t, m| {
            t.ff_alpha = Some(alpha);
            m.set_feed_forward_alpha(alpha);
        });
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DIAGNOSTICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn diagnostics(&self, direction: Direction) -> RateMatcherDiagnostics {
        self.shared.pipeline.load().matcher(direction).diagnostics()
    }

    pub fn reset_diagnostics(&self, direction: Direction) {
        self.shared.pipeline.load().matcher(direction).reset_diagnostics();
    }

    pub fn control_flag(&self, direction: Direction) -> bool {
        self.shared.pipeline.load().matcher(direction).control_flag()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DATA PATH
    // ═══════════════════════════════════════════════════════════════════════════

    /// One realtime callback invocation on interleaved stereo device blocks
    pub fn process_block(&self, input: &mut [f32], output: &mut [f32]) {
        callback::process(&self.shared, input, output);
    }

    /// Engine pulls one mic block from the inbound rate matcher.
    ///
    /// While bypassed the block is drained and dropped, leaving `buffer`
    /// untouched. Nothing happens while the channel is not running.
    pub fn pull_mic(&self, buffer: &mut [Sample], bypass: bool) {
        if !self.shared.run.load(Ordering::Acquire) {
            return;
        }

        let pipeline = self.shared.pipeline.load();
        if bypass || self.shared.bypass.load(Ordering::Acquire) {
            let mut discard = self.shared.discard.lock();
            if discard.len() < buffer.len() {
                discard.resize(buffer.len(), 0.0);
            }
            pipeline.inbound.drain(&mut discard[..buffer.len()]);
            return;
        }

        pipeline.inbound.drain(buffer);
        let frames = frame_count(buffer);
        if self.shared.combine_input.load(Ordering::Acquire) {
            combine_in_place(frames, buffer);
        }
        scale_in_place(frames, buffer, self.shared.preamp.load(Ordering::Relaxed));
    }

    /// Engine pushes one block towards the device.
    ///
    /// In IQ mode only [`EngineSource::Iq`] is accepted; in audio mode only
    /// the two mixer sources. Everything else, and everything while the
    /// channel is not running, is ignored.
    pub fn push_engine(&self, source: EngineSource, data: &[Sample]) -> ChannelResult<()> {
        if !self.shared.run.load(Ordering::Acquire) {
            return Ok(());
        }

        match (self.shared.iq_type.load(Ordering::Acquire), source) {
            (true, EngineSource::Iq) => self.shared.pipeline.load().outbound.feed(data),
            (false, EngineSource::RxAudio) => {
                self.shared.mixer.load().mix_input(RX_AUDIO_INPUT, data)?
            }
            (false, EngineSource::TxMonitor) => {
                self.shared.mixer.load().mix_input(TX_MONITOR_INPUT, data)?
            }
            _ => {}
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STREAM
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn shared(&self) -> Arc<ChannelShared> {
        Arc::clone(&self.shared)
    }

    /// A stream is open and its device has not gone away
    pub fn is_streaming(&self) -> bool {
        self.stream.lock().as_ref().is_some_and(|s| s.is_alive())
    }

    /// A stream is installed, live or not
    pub(crate) fn has_stream(&self) -> bool {
        self.stream.lock().is_some()
    }

    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.stream_info.lock().clone()
    }

    pub(crate) fn install_stream(&self, stream: Box<dyn DuplexStream>, info: StreamInfo) {
        *self.stream.lock() = Some(stream);
        *self.stream_info.lock() = Some(info);
    }

    /// Stop and close the device stream, reverting any priority elevation.
    pub fn stop_stream(&self) -> Result<(), StreamError> {
        let Some(mut stream) = self.stream.lock().take() else {
            return Ok(());
        };

        let result = stream.stop();
        self.shared.release_priority();
        drop(stream);
        self.stream_info.lock().take();

        log::info!("Channel {}: stream stopped", self.id);
        result
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Err(e) = self.stop_stream() {
            log::warn!("Channel {}: stream stop failed: {}", self.id, e);
        }
        log::info!("Channel {} destroyed", self.id);
    }
}

fn build_mixer(
    state: &ChannelState,
    pipeline: &Arc<ArcSwap<Pipeline>>,
) -> ChannelResult<ChannelMixer> {
    let config = &state.config;
    let sink_pipeline = Arc::clone(pipeline);
    let mixer = ChannelMixer::new(
        MixerConfig {
            input_rates: vec![config.audio_rate, config.txmon_rate],
            out_rate: config.audio_rate,
            out_size: config.audio_size,
        },
        Box::new(move |block: &[Sample]| sink_pipeline.load().outbound.feed(block)),
    )?;

    for (index, active) in state.routing.active_inputs().into_iter().enumerate() {
        mixer.set_active(index, active)?;
    }
    for (index, &volume) in state.mixer.input_volume.iter().enumerate() {
        mixer.set_input_volume(index, volume)?;
    }
    mixer.set_input_trim(TX_MONITOR_INPUT, state.mixer.tx_monitor_trim)?;
    mixer.set_master_volume(state.mixer.master);
    Ok(mixer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vb_dsp::ElasticBuilder;

    fn channel(config: ChannelConfig) -> Channel {
        Channel::new(0, config, Arc::new(ElasticBuilder)).unwrap()
    }

    #[test]
    fn test_new_applies_default_routing() {
        let channel = channel(ChannelConfig::default());
        let mixer = channel.mixer();
        assert!(mixer.is_active(RX_AUDIO_INPUT).unwrap());
        assert!(!mixer.is_active(TX_MONITOR_INPUT).unwrap());
    }

    #[test]
    fn test_rejected_change_keeps_previous_config() {
        let channel = channel(ChannelConfig::default());
        assert!(channel.set_vac_rate(0).is_err());
        assert_eq!(channel.config().vac_rate, 48000);
        assert_eq!(channel.out_ring_size(), 9600);
    }

    #[test]
    fn test_mixer_settings_survive_rebuild() {
        let channel = channel(ChannelConfig::default());
        channel.set_monitor_volume(0.3).unwrap();
        channel.set_tx_monitor_gain(0.5).unwrap();
        channel.set_rx_scale(0.8);
        channel.set_mox(true).unwrap();
        channel.set_mon(true).unwrap();

        channel.set_txmon_rate(24000).unwrap();

        let mixer = channel.mixer();
        assert_eq!(mixer.config().input_rates, vec![48000, 24000]);
        assert_eq!(mixer.input_volume(TX_MONITOR_INPUT).unwrap(), 0.3);
        assert_eq!(mixer.input_trim(TX_MONITOR_INPUT).unwrap(), 0.5);
        assert_eq!(mixer.master_volume(), 0.8);
        assert!(!mixer.is_active(RX_AUDIO_INPUT).unwrap());
        assert!(mixer.is_active(TX_MONITOR_INPUT).unwrap());
    }

    #[test]
    fn test_pull_mic_applies_combine_and_preamp() {
        let channel = channel(ChannelConfig {
            run: true,
            in_latency: 0.001,
            ..Default::default()
        });
        // 96 frames ring primed with 48 frames of silence
        let mut silence = vec![1.0; 96];
        channel.pull_mic(&mut silence, false);
        assert!(silence.iter().all(|&s| s == 0.0));

        let mut input = [0.25f32, 0.5, 0.25, 0.5];
        let mut output = [0.0f32; 4];
        channel.process_block(&mut input, &mut output);

        channel.set_combine_input(true);
        channel.set_preamp(2.0);
        let mut mic = [0.0; 4];
        channel.pull_mic(&mut mic, false);
        assert_eq!(mic, [1.5, 1.5, 1.5, 1.5]);
    }

    #[test]
    fn test_bypassed_pull_leaves_buffer_untouched() {
        let channel = channel(ChannelConfig {
            run: true,
            ..Default::default()
        });
        let before = channel.diagnostics(Direction::FromDevice).ring_occupancy;

        let mut mic = [7.0; 64];
        channel.pull_mic(&mut mic, true);
        assert!(mic.iter().all(|&s| s == 7.0));
        assert_eq!(
            channel.diagnostics(Direction::FromDevice).ring_occupancy,
            before - 32
        );
    }

    #[test]
    fn test_iq_push_feeds_outbound_directly() {
        let channel = channel(ChannelConfig {
            run: true,
            iq_type: true,
            ..Default::default()
        });
        let before = channel.diagnostics(Direction::ToDevice).ring_occupancy;

        channel.push_engine(EngineSource::Iq, &[0.1; 64]).unwrap();
        channel.push_engine(EngineSource::RxAudio, &[0.1; 64]).unwrap();

        assert_eq!(
            channel.diagnostics(Direction::ToDevice).ring_occupancy,
            before + 32
        );
    }
}
