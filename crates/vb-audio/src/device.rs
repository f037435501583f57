//! Host and device enumeration
//!
//! Hosts are addressed by their position in `cpal::available_hosts()`,
//! devices by their position within one host's input or output list.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

use crate::IoDirection;

/// Audio host (backend) information
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub index: usize,
    pub name: String,
}

/// Audio device information
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Host-local index
    pub index: usize,
    pub name: String,
    pub is_default: bool,
}

/// List available audio hosts
pub fn list_hosts() -> Vec<HostInfo> {
    cpal::available_hosts()
        .into_iter()
        .enumerate()
        .map(|(index, id)| HostInfo {
            index,
            name: format!("{:?}", id),
        })
        .collect()
}

/// Name of the host at `index`
pub fn host_name(index: usize) -> Option<String> {
    cpal::available_hosts()
        .get(index)
        .map(|id| format!("{:?}", id))
}

pub(crate) fn host_at(index: usize) -> Option<Host> {
    let id = *cpal::available_hosts().get(index)?;
    match cpal::host_from_id(id) {
        Ok(host) => Some(host),
        Err(e) => {
            log::debug!("Host {:?} unavailable: {}", id, e);
            None
        }
    }
}

pub(crate) fn device_at(host: &Host, index: usize, direction: IoDirection) -> Option<Device> {
    match direction {
        IoDirection::Input => host.input_devices().ok()?.nth(index),
        IoDirection::Output => host.output_devices().ok()?.nth(index),
    }
}

/// List devices of one host in one direction
pub fn list_devices(host_index: usize, direction: IoDirection) -> Vec<DeviceInfo> {
    let Some(host) = host_at(host_index) else {
        return Vec::new();
    };

    let default_name = match direction {
        IoDirection::Input => host.default_input_device(),
        IoDirection::Output => host.default_output_device(),
    }
    .and_then(|d| d.name().ok());

    let devices = match direction {
        IoDirection::Input => host.input_devices(),
        IoDirection::Output => host.output_devices(),
    };
    let Ok(devices) = devices else {
        return Vec::new();
    };

    devices
        .enumerate()
        .map(|(index, device)| {
            let name = device.name().unwrap_or_else(|_| format!("device {}", index));
            DeviceInfo {
                index,
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
            }
        })
        .collect()
}
