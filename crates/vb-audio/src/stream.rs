//! cpal duplex stream
//!
//! cpal opens input and output as two streams. The input callback pushes its
//! samples into an rtrb ring; the output callback pops whatever has arrived
//! and runs the duplex callback with both blocks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, Stream, StreamConfig};
use rtrb::{Consumer, Producer, RingBuffer};
use vb_core::{STEREO, interleaved_len};

use crate::device::{device_at, host_at};
use crate::{
    Backend, DuplexCallback, DuplexStream, HostCapabilities, IoDirection, StreamError, StreamInfo,
    StreamRequest, shared_capabilities_for,
};

/// Device periods of headroom between the input and output callbacks
const RING_BLOCKS: usize = 4;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

const CODE_DEVICE_NOT_AVAILABLE: i32 = -10;
const CODE_CONFIG_NOT_SUPPORTED: i32 = -11;
const CODE_INVALID_ARGUMENT: i32 = -12;
const CODE_BACKEND: i32 = -13;
const CODE_PLAY: i32 = -14;
const CODE_PAUSE: i32 = -15;

fn build_error(err: cpal::BuildStreamError) -> StreamError {
    let code = match &err {
        cpal::BuildStreamError::DeviceNotAvailable => CODE_DEVICE_NOT_AVAILABLE,
        cpal::BuildStreamError::StreamConfigNotSupported => CODE_CONFIG_NOT_SUPPORTED,
        cpal::BuildStreamError::InvalidArgument => CODE_INVALID_ARGUMENT,
        _ => CODE_BACKEND,
    };
    StreamError::Backend {
        code,
        message: err.to_string(),
    }
}

/// Refuse a request for exclusive access, which no cpal host can honour
fn check_shared(request: &StreamRequest) -> Result<(), StreamError> {
    if request.backend.is_some_and(|p| p.exclusive) {
        return Err(StreamError::Backend {
            code: CODE_CONFIG_NOT_SUPPORTED,
            message: "exclusive mode is not available through cpal".into(),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// STREAM HOLDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Wrapper to make Stream Send
struct StreamHolder(Stream);

// SAFETY: the stream is only touched by the channel that owns it, under its lock
unsafe impl Send for StreamHolder {}

/// Open cpal input/output pair
pub struct CpalDuplexStream {
    input: StreamHolder,
    output: StreamHolder,
    info: StreamInfo,
    /// Cleared by either error callback when the device disappears
    alive: Arc<AtomicBool>,
}

/// Error callback for one side of the pair
fn stream_error_handler(
    side: &'static str,
    alive: Arc<AtomicBool>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            alive.store(false, Ordering::Release);
        }
        log::error!("Audio {} stream error: {}", side, err);
    }
}

impl DuplexStream for CpalDuplexStream {
    fn start(&mut self) -> Result<(), StreamError> {
        for stream in [&self.input.0, &self.output.0] {
            stream.play().map_err(|e| StreamError::Backend {
                code: CODE_PLAY,
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        for stream in [&self.output.0, &self.input.0] {
            stream.pause().map_err(|e| StreamError::Backend {
                code: CODE_PAUSE,
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn info(&self) -> StreamInfo {
        self.info.clone()
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BACKEND
// ═══════════════════════════════════════════════════════════════════════════════

/// Backend over the hosts cpal was built with
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalBackend;

impl Backend for CpalBackend {
    fn host_capabilities(&self, host: usize) -> Option<Box<dyn HostCapabilities>> {
        // cpal 0.15 opens WASAPI in shared mode only
        crate::device::host_name(host).map(|name| shared_capabilities_for(&name))
    }

    fn resolve_device(&self, host: usize, device: usize, direction: IoDirection) -> Option<usize> {
        let host = host_at(host)?;
        device_at(&host, device, direction).map(|_| device)
    }

    fn open_duplex(
        &self,
        request: &StreamRequest,
        mut callback: DuplexCallback,
    ) -> Result<Box<dyn DuplexStream>, StreamError> {
        check_shared(request)?;
        let host = host_at(request.host).ok_or(StreamError::BadInputDevice)?;
        let input_device = device_at(&host, request.input.device, IoDirection::Input)
            .ok_or(StreamError::BadInputDevice)?;
        let output_device = device_at(&host, request.output.device, IoDirection::Output)
            .ok_or(StreamError::BadOutputDevice)?;

        let config = StreamConfig {
            channels: STEREO as u16,
            sample_rate: cpal::SampleRate(request.sample_rate),
            buffer_size: CpalBufferSize::Fixed(request.frames_per_buffer as u32),
        };

        let ring_len = interleaved_len(request.frames_per_buffer) * RING_BLOCKS;
        let (mut producer, mut consumer): (Producer<f32>, Consumer<f32>) =
            RingBuffer::new(ring_len);

        let alive = Arc::new(AtomicBool::new(true));
        let input_stream = input_device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        if producer.push(sample).is_err() {
                            break;
                        }
                    }
                },
                stream_error_handler("input", Arc::clone(&alive)),
                None,
            )
            .map_err(build_error)?;

        let mut input_block = vec![0.0f32; ring_len];
        let output_stream = output_device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if input_block.len() < data.len() {
                        input_block.resize(data.len(), 0.0);
                    }

                    let mut received = 0;
                    for slot in input_block[..data.len()].iter_mut() {
                        match consumer.pop() {
                            Ok(sample) => *slot = sample,
                            Err(_) => break,
                        }
                        received += 1;
                    }
                    // hand over whole frames only
                    let received = received - received % STEREO;

                    callback(&mut input_block[..received], data);
                },
                stream_error_handler("output", Arc::clone(&alive)),
                None,
            )
            .map_err(build_error)?;

        let period = request.frames_per_buffer as f64 / request.sample_rate as f64;
        let info = StreamInfo {
            sample_rate: request.sample_rate,
            frames_per_buffer: request.frames_per_buffer,
            input_latency: period + request.input.suggested_latency,
            output_latency: period + request.output.suggested_latency,
            host: format!("{:?}", host.id()),
        };

        log::info!(
            "Opened duplex stream on {}: {} Hz, {} frames",
            info.host,
            info.sample_rate,
            info.frames_per_buffer
        );

        Ok(Box::new(CpalDuplexStream {
            input: StreamHolder(input_stream),
            output: StreamHolder(output_stream),
            info,
            alive,
        }))
    }
}
