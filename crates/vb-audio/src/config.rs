//! Channel configuration

use serde::{Deserialize, Serialize};

use crate::{ChannelError, ChannelResult};

/// Host and device indices handed to the backend.
///
/// Device indices are local to the selected host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSelection {
    pub host: usize,
    pub input: usize,
    pub output: usize,
}

/// Every creation parameter of a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub run: bool,
    /// Raw IQ (true) or demodulated audio (false) towards the device
    pub iq_type: bool,
    pub stereo: bool,
    pub exclusive: bool,
    /// Logical channel count; device streams are always stereo
    pub num_channels: u16,

    // Sample rates (Hz)
    pub iq_rate: u32,
    pub mic_rate: u32,
    pub audio_rate: u32,
    pub txmon_rate: u32,
    pub vac_rate: u32,

    // Block sizes (frames)
    pub mic_size: usize,
    pub iq_size: usize,
    pub audio_size: usize,
    pub txmon_size: usize,
    pub vac_size: usize,

    /// Inbound ring depth (seconds)
    pub in_latency: f64,
    /// Outbound ring depth (seconds)
    pub out_latency: f64,
    /// Latency requested from the input device (seconds)
    pub device_in_latency: f64,
    /// Latency requested from the output device (seconds)
    pub device_out_latency: f64,

    pub initial_variance_in: f64,
    pub initial_variance_out: f64,

    pub devices: DeviceSelection,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            run: false,
            iq_type: false,
            stereo: true,
            exclusive: false,
            num_channels: 2,
            iq_rate: 48000,
            mic_rate: 48000,
            audio_rate: 48000,
            txmon_rate: 48000,
            vac_rate: 48000,
            mic_size: 1024,
            iq_size: 1024,
            audio_size: 1024,
            txmon_size: 1024,
            vac_size: 512,
            in_latency: 0.1,
            out_latency: 0.1,
            device_in_latency: 0.01,
            device_out_latency: 0.01,
            initial_variance_in: 1.0,
            initial_variance_out: 1.0,
            devices: DeviceSelection::default(),
        }
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> ChannelResult<()> {
        let rates = [
            ("iq", self.iq_rate),
            ("mic", self.mic_rate),
            ("audio", self.audio_rate),
            ("txmon", self.txmon_rate),
            ("vac", self.vac_rate),
        ];
        if let Some((name, _)) = rates.iter().find(|(_, rate)| *rate == 0) {
            return Err(ChannelError::InvalidConfig(format!("{name} rate must be positive")));
        }

        let sizes = [
            ("mic", self.mic_size),
            ("iq", self.iq_size),
            ("audio", self.audio_size),
            ("txmon", self.txmon_size),
            ("vac", self.vac_size),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, size)| *size == 0) {
            return Err(ChannelError::InvalidConfig(format!("{name} size must be positive")));
        }

        for (name, latency) in [("input", self.in_latency), ("output", self.out_latency)] {
            if !(latency.is_finite() && latency > 0.0) {
                return Err(ChannelError::InvalidConfig(format!(
                    "{name} latency must be positive, got {latency}"
                )));
            }
        }

        if self.in_ring_size() == 0 || self.out_ring_size() == 0 {
            return Err(ChannelError::InvalidConfig("latency too small for a ring".into()));
        }
        Ok(())
    }

    /// Inbound ring capacity: `2 * mic_rate * in_latency` frames
    pub fn in_ring_size(&self) -> usize {
        ring_size(self.mic_rate, self.in_latency)
    }

    /// Outbound ring capacity: `2 * vac_rate * out_latency` frames
    pub fn out_ring_size(&self) -> usize {
        ring_size(self.vac_rate, self.out_latency)
    }

    /// Block size and rate feeding the outbound ring
    pub fn outbound_source(&self) -> (usize, u32) {
        if self.iq_type {
            (self.iq_size, self.iq_rate)
        } else {
            (self.audio_size, self.audio_rate)
        }
    }
}

/// Fractional frames are truncated; `as` saturates negatives to zero
fn ring_size(rate: u32, latency: f64) -> usize {
    (2.0 * rate as f64 * latency) as usize
}

/// Requested device latency, with non-positive values replaced by one second
pub fn suggested_latency(seconds: f64) -> f64 {
    if seconds > 0.0 { seconds } else { 1.0 }
}
