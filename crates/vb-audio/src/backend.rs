//! Backend abstraction
//!
//! The stream controller talks to the OS audio transport through [`Backend`].
//! What a particular host can do beyond a plain shared duplex stream is
//! described once, at open time, by its [`HostCapabilities`].

use crate::StreamError;

/// Device-side direction of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDirection {
    Input,
    Output,
}

/// Thread priority requested from a backend that schedules its own thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityHint {
    ProAudio,
}

/// Host-specific stream parameters; absent for hosts that take none
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendParams {
    pub exclusive: bool,
    pub priority: Option<PriorityHint>,
    /// Frames per buffer imposed on the transport
    pub frames_per_buffer: Option<usize>,
}

/// What a host offers beyond a plain shared stream
pub trait HostCapabilities: Send + Sync {
    fn name(&self) -> &str;

    /// Backend parameters for a stream on this host, `None` when the host
    /// takes no backend-specific parameters.
    fn backend_params(&self, _exclusive: bool, _frames_per_buffer: usize) -> Option<BackendParams> {
        None
    }
}

/// Windows host with its own pro-audio thread
#[derive(Debug, Clone, Copy, Default)]
pub struct WasapiHost {
    /// The transport can open devices in exclusive mode
    pub exclusive_mode: bool,
}

impl HostCapabilities for WasapiHost {
    fn name(&self) -> &str {
        "WASAPI"
    }

    fn backend_params(&self, exclusive: bool, _frames_per_buffer: usize) -> Option<BackendParams> {
        Some(BackendParams {
            exclusive: exclusive && self.exclusive_mode,
            priority: Some(PriorityHint::ProAudio),
            frames_per_buffer: None,
        })
    }
}

/// Driver-level host that needs the buffer size spelled out
#[derive(Debug, Clone, Copy, Default)]
pub struct AsioHost;

impl HostCapabilities for AsioHost {
    fn name(&self) -> &str {
        "ASIO"
    }

    fn backend_params(&self, _exclusive: bool, frames_per_buffer: usize) -> Option<BackendParams> {
        Some(BackendParams {
            exclusive: false,
            priority: None,
            frames_per_buffer: Some(frames_per_buffer),
        })
    }
}

/// Any other host
#[derive(Debug, Clone, Default)]
pub struct GenericHost {
    pub name: String,
}

impl HostCapabilities for GenericHost {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Capabilities for a host identified by name
pub fn capabilities_for(host_name: &str) -> Box<dyn HostCapabilities> {
    match host_name.to_ascii_lowercase().as_str() {
        "wasapi" => Box::new(WasapiHost {
            exclusive_mode: true,
        }),
        "asio" => Box::new(AsioHost),
        _ => Box::new(GenericHost {
            name: host_name.to_string(),
        }),
    }
}

/// Capabilities for a host reached through a transport that only opens
/// shared-mode streams
pub fn shared_capabilities_for(host_name: &str) -> Box<dyn HostCapabilities> {
    match host_name.to_ascii_lowercase().as_str() {
        "wasapi" => Box::new(WasapiHost {
            exclusive_mode: false,
        }),
        _ => capabilities_for(host_name),
    }
}

/// Parameters of one side of a duplex stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionParams {
    /// Host-local device index
    pub device: usize,
    /// Always 2
    pub channels: u16,
    /// Seconds, strictly positive
    pub suggested_latency: f64,
}

/// Everything a backend needs to open a 32-bit float duplex stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub host: usize,
    pub input: DirectionParams,
    pub output: DirectionParams,
    pub sample_rate: u32,
    pub frames_per_buffer: usize,
    pub backend: Option<BackendParams>,
}

/// Metadata of an open stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub frames_per_buffer: usize,
    /// Seconds
    pub input_latency: f64,
    /// Seconds
    pub output_latency: f64,
    pub host: String,
}

/// Realtime duplex callback: interleaved stereo `f32` input and output
pub type DuplexCallback = Box<dyn FnMut(&mut [f32], &mut [f32]) + Send + 'static>;

/// An opened duplex stream
pub trait DuplexStream: Send {
    fn start(&mut self) -> Result<(), StreamError>;

    /// Pause; the stream stays allocated until dropped
    fn stop(&mut self) -> Result<(), StreamError>;

    fn info(&self) -> StreamInfo;

    /// `false` once the device has gone away; the stream still needs closing
    fn is_alive(&self) -> bool {
        true
    }
}

/// OS audio transport
pub trait Backend: Send + Sync {
    /// `None` when `host` is not a valid host index
    fn host_capabilities(&self, host: usize) -> Option<Box<dyn HostCapabilities>>;

    /// Validate a host-local device index for the given direction
    fn resolve_device(&self, host: usize, device: usize, direction: IoDirection) -> Option<usize>;

    fn open_duplex(
        &self,
        request: &StreamRequest,
        callback: DuplexCallback,
    ) -> Result<Box<dyn DuplexStream>, StreamError>;
}
