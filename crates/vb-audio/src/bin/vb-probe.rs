//! vb-probe: virtual cable diagnostics
//!
//! Usage:
//!   vb-probe list                          - List hosts and devices
//!   vb-probe run --host 0 --input 1 ...    - Loop channel 0 back through the engine side

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use vb_audio::{
    ChannelConfig, CpalBackend, DeviceSelection, Direction, EngineSource, IoDirection, Registry,
    StreamController, list_devices, list_hosts, precise_sleep,
};
use vb_core::interleaved_len;

#[derive(Parser)]
#[command(name = "vb-probe", about = "Virtual audio cable diagnostics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List hosts and their devices
    List,
    /// Run channel 0, looping mic blocks back as receive audio
    Run {
        /// Host index
        #[arg(long, default_value_t = 0)]
        host: usize,
        /// Input device index within the host
        #[arg(long, default_value_t = 0)]
        input: usize,
        /// Output device index within the host
        #[arg(long, default_value_t = 0)]
        output: usize,
        /// Device sample rate (Hz)
        #[arg(short, long, default_value_t = 48000)]
        rate: u32,
        /// Device buffer size (frames)
        #[arg(short, long, default_value_t = 512)]
        frames: usize,
        /// Engine block size (frames)
        #[arg(long, default_value_t = 1024)]
        block: usize,
        /// Run time (seconds)
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
        /// Request exclusive device access
        #[arg(long)]
        exclusive: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            list();
            Ok(())
        }
        Commands::Run {
            host,
            input,
            output,
            rate,
            frames,
            block,
            seconds,
            exclusive,
        } => run(
            ChannelConfig {
                run: true,
                exclusive,
                vac_rate: rate,
                vac_size: frames,
                mic_size: block,
                audio_size: block,
                devices: DeviceSelection {
                    host,
                    input,
                    output,
                },
                ..Default::default()
            },
            seconds,
        ),
    }
}

fn list() {
    for host in list_hosts() {
        println!("[{}] {}", host.index, host.name);
        for (label, direction) in [("in ", IoDirection::Input), ("out", IoDirection::Output)] {
            for device in list_devices(host.index, direction) {
                let marker = if device.is_default { " (default)" } else { "" };
                println!("    {} [{}] {}{}", label, device.index, device.name, marker);
            }
        }
    }
}

fn run(config: ChannelConfig, seconds: u64) -> Result<()> {
    let block = config.mic_size;
    let block_period = Duration::from_secs_f64(block as f64 / config.mic_rate as f64);

    let registry = Registry::global();
    let channel = registry.create(0, config).context("creating channel 0")?;
    let controller = StreamController::new(Arc::new(CpalBackend));

    let info = controller.start(&channel).context("starting stream")?;
    println!(
        "{} @ {} Hz, {} frames, latency in {:.1} ms / out {:.1} ms",
        info.host,
        info.sample_rate,
        info.frames_per_buffer,
        info.input_latency * 1000.0,
        info.output_latency * 1000.0
    );

    let stop = Arc::new(AtomicBool::new(false));
    let engine = {
        let channel = Arc::clone(&channel);
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut buffer = vec![0.0; interleaved_len(block)];
            while !stop.load(Ordering::Relaxed) {
                channel.pull_mic(&mut buffer, false);
                if let Err(e) = channel.push_engine(EngineSource::RxAudio, &buffer) {
                    log::warn!("Engine push failed: {}", e);
                }
                precise_sleep(block_period);
            }
        })
    };

    for second in 1..=seconds {
        let elapsed = precise_sleep(Duration::from_secs(1));
        if !channel.is_streaming() {
            log::warn!("Device stream lost after {}s", second);
            break;
        }
        for direction in Direction::ALL {
            let diags = channel.diagnostics(direction);
            println!(
                "{:>3}s ({:>6.1} ms) {:?}: ring {}/{} underflows {} overflows {} variance {:.3}",
                second,
                elapsed.as_secs_f64() * 1000.0,
                direction,
                diags.ring_occupancy,
                diags.ring_capacity,
                diags.underflows,
                diags.overflows,
                diags.fill_variance
            );
        }
    }

    stop.store(true, Ordering::Relaxed);
    let engine = engine.join();

    controller.stop(&channel).context("stopping stream")?;
    registry.destroy(0).context("destroying channel 0")?;
    engine.map_err(engine_panic)
}

fn engine_panic(payload: Box<dyn Any + Send>) -> anyhow::Error {
    anyhow!("engine thread panicked: {}", panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
