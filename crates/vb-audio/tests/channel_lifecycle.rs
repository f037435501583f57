//! Channel Integration Tests
//!
//! Tests for:
//! - Ring sizing and rebuild on rate changes
//! - Realtime callback while inert and while running
//! - Monitor routing through the mixer into the outbound matcher
//! - Conversion buffer growth across reconfiguration
//! - Reconfiguration while the realtime callback runs
//! - Registry lifecycle

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use approx::assert_relative_eq;
use common::CountingBuilder;
use vb_audio::{
    Channel, ChannelConfig, ChannelError, Direction, EngineSource, Registry, TX_MONITOR_INPUT,
};
use vb_dsp::ElasticBuilder;

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn running() -> ChannelConfig {
    ChannelConfig {
        run: true,
        ..Default::default()
    }
}

fn elastic_channel(config: ChannelConfig) -> Channel {
    Channel::new(0, config, Arc::new(ElasticBuilder)).unwrap()
}

fn counting_channel(config: ChannelConfig) -> (Channel, Arc<CountingBuilder>) {
    let builder = Arc::new(CountingBuilder::default());
    let channel = Channel::new(0, config, builder.clone()).unwrap();
    (channel, builder)
}

// ═══════════════════════════════════════════════════════════════════════════════
// RING SIZING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_default_ring_sizes() {
    let channel = elastic_channel(ChannelConfig::default());
    assert_eq!(channel.in_ring_size(), 9600);
    assert_eq!(channel.out_ring_size(), 9600);
}

#[test]
fn test_vac_rate_change_rebuilds_with_fresh_diagnostics() {
    let channel = elastic_channel(running());

    // 4800 primed frames cannot satisfy a 5000 frame pull
    let mut mic = vec![0.0; 10_000];
    channel.pull_mic(&mut mic, false);
    assert_eq!(channel.diagnostics(Direction::FromDevice).underflows, 1);

    channel.set_vac_rate(96000).unwrap();

    assert_eq!(channel.in_ring_size(), 9600);
    assert_eq!(channel.out_ring_size(), 19200);
    assert_eq!(channel.diagnostics(Direction::FromDevice).underflows, 0);
    assert_eq!(channel.diagnostics(Direction::ToDevice).ring_capacity, 19200);

    let inbound = *channel.pipeline().matcher(Direction::FromDevice).config();
    assert_eq!((inbound.in_rate, inbound.out_rate), (96000, 48000));
}

#[test]
fn test_unchanged_value_does_not_rebuild() {
    let (channel, builder) = counting_channel(ChannelConfig::default());
    assert_eq!(builder.counters.builds.load(Ordering::SeqCst), 2);

    channel.set_vac_rate(48000).unwrap();
    channel.set_mic_size(1024).unwrap();
    assert_eq!(builder.counters.builds.load(Ordering::SeqCst), 2);

    channel.set_mic_size(512).unwrap();
    assert_eq!(builder.counters.builds.load(Ordering::SeqCst), 4);
}

#[test]
fn test_iq_rate_rebuilds_only_in_iq_mode() {
    let (channel, builder) = counting_channel(ChannelConfig::default());

    channel.set_iq_rate(192000).unwrap();
    assert_eq!(builder.counters.builds.load(Ordering::SeqCst), 2);
    assert_eq!(channel.config().iq_rate, 192000);

    channel.set_iq_type(true).unwrap();
    assert_eq!(builder.counters.builds.load(Ordering::SeqCst), 4);
    let outbound = *channel.pipeline().matcher(Direction::ToDevice).config();
    assert_eq!(outbound.in_rate, 192000);
}

#[test]
fn test_stored_only_values_are_validated() {
    let (channel, builder) = counting_channel(ChannelConfig::default());
    let before = channel.config();

    // audio mode: iq parameters rebuild nothing but are still checked
    assert!(matches!(channel.set_iq_rate(0), Err(ChannelError::InvalidConfig(_))));
    assert!(channel.set_iq_size_and_rate(0, 96000).is_err());
    assert!(channel.set_iq_size_and_rate(2048, 0).is_err());
    assert!(matches!(channel.set_txmon_size(0), Err(ChannelError::InvalidConfig(_))));

    assert_eq!(channel.config(), before);
    assert_eq!(builder.counters.builds.load(Ordering::SeqCst), 2);

    channel.set_txmon_size(2048).unwrap();
    assert_eq!(channel.config().txmon_size, 2048);
    assert_eq!(builder.counters.builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_rejected_value_does_not_block_later_rebuilds() {
    let (channel, builder) = counting_channel(ChannelConfig::default());

    channel.set_iq_rate(0).unwrap_err();
    channel.set_txmon_size(0).unwrap_err();

    // unrelated setters still rebuild
    channel.set_vac_rate(96000).unwrap();
    assert_eq!(builder.counters.builds.load(Ordering::SeqCst), 4);
    assert_eq!(channel.out_ring_size(), 19200);

    // switching to IQ mode uses the last accepted iq rate
    channel.set_iq_type(true).unwrap();
    let outbound = *channel.pipeline().matcher(Direction::ToDevice).config();
    assert_eq!(outbound.in_rate, ChannelConfig::default().iq_rate);
}

#[test]
fn test_tuning_survives_rebuild() {
    let channel = elastic_channel(ChannelConfig::default());
    channel.force_variance(Direction::ToDevice, true, 0.75);

    channel.set_out_latency(0.2).unwrap();

    let diags = channel.diagnostics(Direction::ToDevice);
    assert_eq!(diags.ring_capacity, 19200);
    assert_relative_eq!(diags.fill_variance, 0.75);
    assert!(channel.tuning(Direction::ToDevice).force_variance);
}

// ═══════════════════════════════════════════════════════════════════════════════
// REALTIME CALLBACK
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_inert_callback_zeroes_without_touching_matchers() {
    let (channel, builder) = counting_channel(ChannelConfig::default());

    let mut input = [0.5f32; 8];
    let mut output = [0.5f32; 8];
    channel.process_block(&mut input, &mut output);

    assert!(input.iter().all(|&s| s == 0.0));
    assert!(output.iter().all(|&s| s == 0.0));
    assert_eq!(builder.counters.calls(), 0);
}

#[test]
fn test_running_callback_feeds_and_drains_once() {
    let (channel, builder) = counting_channel(running());

    let mut input = [0.5f32; 8];
    let mut output = [0.0f32; 5];
    channel.process_block(&mut input, &mut output);

    assert_eq!(builder.counters.feeds.load(Ordering::SeqCst), 1);
    assert_eq!(builder.counters.drains.load(Ordering::SeqCst), 1);
    assert_eq!(output[..4], [0.25f32; 4]);
    // trailing half frame stays silent
    assert_eq!(output[4], 0.0);
}

#[test]
fn test_stopped_channel_ignores_engine_traffic() {
    let (channel, builder) = counting_channel(ChannelConfig::default());

    let mut mic = [3.0; 8];
    channel.pull_mic(&mut mic, false);
    channel.push_engine(EngineSource::RxAudio, &[0.1; 2048]).unwrap();

    assert_eq!(mic, [3.0; 8]);
    assert_eq!(builder.counters.calls(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Push one full mixer block on each source and count what reaches the outbound matcher
fn outbound_feeds(mox: bool, mon: bool) -> (usize, usize) {
    let (channel, builder) = counting_channel(running());
    channel.set_mox(mox).unwrap();
    channel.set_mon(mon).unwrap();
    let block = vec![0.1; 2 * channel.config().audio_size];

    channel.push_engine(EngineSource::RxAudio, &block).unwrap();
    let after_rx = builder.counters.feeds.load(Ordering::SeqCst);
    channel.push_engine(EngineSource::TxMonitor, &block).unwrap();
    let after_tx = builder.counters.feeds.load(Ordering::SeqCst);
    (after_rx, after_tx - after_rx)
}

#[test]
fn test_routing_combinations() {
    // (mox, mon) -> (blocks from rx audio, blocks from tx monitor)
    assert_eq!(outbound_feeds(false, false), (1, 0));
    assert_eq!(outbound_feeds(false, true), (1, 0));
    assert_eq!(outbound_feeds(true, true), (0, 1));
    assert_eq!(outbound_feeds(true, false), (0, 0));
}

#[test]
fn test_vox_does_not_change_routing() {
    let channel = elastic_channel(ChannelConfig::default());
    channel.set_vox(true).unwrap();
    let mixer = channel.mixer();
    assert!(mixer.is_active(0).unwrap());
    assert!(!mixer.is_active(TX_MONITOR_INPUT).unwrap());
    assert!(channel.routing().vox);
}

#[test]
fn test_iq_source_rejected_in_audio_mode() {
    let (channel, builder) = counting_channel(running());
    channel.push_engine(EngineSource::Iq, &[0.1; 64]).unwrap();
    assert_eq!(builder.counters.feeds.load(Ordering::SeqCst), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERSION BUFFER
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_conversion_buffer_only_grows() {
    let channel = elastic_channel(ChannelConfig::default());
    let initial = channel.conversion_capacity_bytes();
    assert!(initial >= 9600 * 2 * 8);

    channel.set_in_latency(2.0).unwrap();
    let grown = channel.conversion_capacity_bytes();
    assert!(grown > initial);
    assert!(grown >= 192_000 * 2 * 8);

    channel.set_in_latency(0.01).unwrap();
    assert_eq!(channel.conversion_capacity_bytes(), grown);
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONCURRENT RECONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_reconfigure_while_callback_runs() {
    let channel = elastic_channel(running());
    let done = AtomicBool::new(false);
    let blocks = AtomicUsize::new(0);

    thread::scope(|scope| {
        let realtime = scope.spawn(|| {
            let mut input: Vec<f32> = (0..512).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
            let mut output = vec![0.0f32; 512];
            while !done.load(Ordering::Acquire) {
                // NaN marks samples the callback failed to write
                output.fill(f32::NAN);
                channel.process_block(&mut input, &mut output);
                assert!(output.iter().all(|s| s.is_finite()));
                blocks.fetch_add(1, Ordering::Relaxed);
            }
        });

        let rates = [44100, 48000, 96000];
        let latencies = [0.05, 0.1, 0.2];
        let sizes = [256, 1024, 2048];
        for i in 0..60 {
            channel.set_vac_rate(rates[i % 3]).unwrap();
            channel.set_mic_rate(rates[(i + 1) % 3]).unwrap();
            channel.set_in_latency(latencies[i % 3]).unwrap();
            channel.set_out_latency(latencies[(i + 2) % 3]).unwrap();
            channel.set_audio_size(sizes[i % 3]).unwrap();

            let block = vec![0.1; 2 * sizes[i % 3]];
            channel.push_engine(EngineSource::RxAudio, &block).unwrap();
            let mut mic = vec![0.0; 2 * channel.config().mic_size];
            channel.pull_mic(&mut mic, false);
            assert!(mic.iter().all(|s| s.is_finite()));
        }

        channel.set_vac_rate(96000).unwrap();
        channel.set_mic_rate(44100).unwrap();
        channel.set_in_latency(0.1).unwrap();
        channel.set_out_latency(0.05).unwrap();
        channel.set_audio_size(512).unwrap();

        // let the callback see the final pipeline before stopping
        let seen = blocks.load(Ordering::Relaxed);
        while blocks.load(Ordering::Relaxed) < seen + 4 && !realtime.is_finished() {
            thread::yield_now();
        }
        done.store(true, Ordering::Release);
    });

    assert!(blocks.load(Ordering::Relaxed) > 0);
    assert_eq!(channel.in_ring_size(), 8820);
    assert_eq!(channel.out_ring_size(), 9600);
    assert_eq!(channel.diagnostics(Direction::FromDevice).ring_capacity, 8820);
    assert_eq!(channel.diagnostics(Direction::ToDevice).ring_capacity, 9600);

    let outbound = *channel.pipeline().matcher(Direction::ToDevice).config();
    assert_eq!((outbound.in_size, outbound.out_rate), (512, 96000));
    assert!(channel.conversion_capacity_bytes() >= 9600 * 2 * 8);
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_registry_handles_outlive_destroy() {
    let registry = Registry::new(2, Arc::new(ElasticBuilder));
    let channel = registry.create(0, running()).unwrap();

    registry.destroy(0).unwrap();
    assert!(matches!(registry.get(0), Err(ChannelError::NotFound(0))));

    // the handle stays usable until dropped
    let mut mic = [1.0; 4];
    channel.pull_mic(&mut mic, false);
    assert_eq!(mic, [0.0; 4]);
}

#[test]
fn test_monitor_gain_reaches_both_channels() {
    let registry = Registry::new(2, Arc::new(ElasticBuilder));
    let first = registry.create(0, ChannelConfig::default()).unwrap();
    let second = registry.create(1, ChannelConfig::default()).unwrap();

    registry.set_monitor_gain(0.5);
    assert_relative_eq!(first.mixer().master_volume(), 0.5);
    assert_relative_eq!(second.mixer().master_volume(), 0.5);
}
