//! Stream Controller
//!
//! Opens, starts and stops the duplex device stream of a channel.

use std::sync::Arc;

use vb_core::STEREO;

use crate::{
    Backend, Channel, DirectionParams, IoDirection, StreamError, StreamInfo, StreamRequest,
    callback, suggested_latency,
};

pub struct StreamController {
    backend: Arc<dyn Backend>,
}

impl StreamController {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Resolve the channel's devices, open a duplex stream on them and start it.
    ///
    /// Both devices are resolved before anything is opened; a bad selection
    /// fails with [`StreamError::BadInputDevice`] or
    /// [`StreamError::BadOutputDevice`] and leaves no stream behind.
    pub fn start(&self, channel: &Channel) -> Result<StreamInfo, StreamError> {
        if channel.is_streaming() {
            return Err(StreamError::AlreadyRunning);
        }
        if channel.has_stream() {
            log::warn!("Channel {}: closing stream whose device went away", channel.id());
            if let Err(e) = channel.stop_stream() {
                log::warn!("Channel {}: dead stream stop failed: {}", channel.id(), e);
            }
        }

        let config = channel.config();
        let devices = config.devices;

        let input = self
            .backend
            .resolve_device(devices.host, devices.input, IoDirection::Input)
            .ok_or(StreamError::BadInputDevice)?;
        let output = self
            .backend
            .resolve_device(devices.host, devices.output, IoDirection::Output)
            .ok_or(StreamError::BadOutputDevice)?;

        let capabilities = self.backend.host_capabilities(devices.host);
        let backend_params = capabilities
            .as_ref()
            .and_then(|caps| caps.backend_params(config.exclusive, config.vac_size));
        if config.exclusive && !backend_params.is_some_and(|p| p.exclusive) {
            log::warn!(
                "Channel {}: exclusive mode requested but not offered by this host",
                channel.id()
            );
        }

        let request = StreamRequest {
            host: devices.host,
            input: DirectionParams {
                device: input,
                channels: STEREO as u16,
                suggested_latency: suggested_latency(config.device_in_latency),
            },
            output: DirectionParams {
                device: output,
                channels: STEREO as u16,
                suggested_latency: suggested_latency(config.device_out_latency),
            },
            sample_rate: config.vac_rate,
            frames_per_buffer: backend_params
                .and_then(|p| p.frames_per_buffer)
                .unwrap_or(config.vac_size),
            backend: backend_params,
        };

        let shared = channel.shared();
        let process_shared = Arc::clone(&shared);
        let mut stream = self.backend.open_duplex(
            &request,
            Box::new(move |input: &mut [f32], output: &mut [f32]| {
                callback::process(&process_shared, input, output)
            }),
        )?;

        // A host that takes a priority hint schedules its own thread
        let lazy_priority = backend_params.is_none_or(|p| p.priority.is_none());
        shared.arm_priority(lazy_priority);

        if let Err(e) = stream.start() {
            shared.release_priority();
            log::warn!("Channel {}: stream start failed: {}", channel.id(), e);
            return Err(e);
        }

        let info = stream.info();
        log::info!(
            "Channel {}: stream started on {} at {} Hz, {} frames, latency in {:.1} ms / out {:.1} ms",
            channel.id(),
            info.host,
            info.sample_rate,
            info.frames_per_buffer,
            info.input_latency * 1000.0,
            info.output_latency * 1000.0
        );
        channel.install_stream(stream, info.clone());
        Ok(info)
    }

    /// Stop and close the channel's stream; a channel without one is left alone.
    pub fn stop(&self, channel: &Channel) -> Result<(), StreamError> {
        channel.stop_stream()
    }
}
