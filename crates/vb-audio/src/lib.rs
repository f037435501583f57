//! vb-audio: Virtual audio cable channels
//!
//! Bridges a duplex device stream and the engine through a pair of elastic
//! rate matchers per channel.
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────────────── Channel ─────────────────────┐
//! device in  ──▶ │ callback ─▶ ConversionBuffer ─▶ inbound matcher  │ ──▶ pull_mic()
//!                │                                                  │
//! device out ◀── │ callback ◀─ ConversionBuffer ◀─ outbound matcher │ ◀── push_engine(Iq)
//!                │                                      ▲           │
//!                │                               ChannelMixer       │ ◀── push_engine(RxAudio)
//!                │                                                  │ ◀── push_engine(TxMonitor)
//!                └──────────────────────────────────────────────────┘
//! ```
//!
//! [`Registry`] holds the channels, [`StreamController`] opens their device
//! streams through a [`Backend`].

mod backend;
mod callback;
mod channel;
mod config;
mod controller;
mod convbuf;
mod device;
mod error;
mod pipeline;
mod priority;
mod registry;
mod routing;
mod sleep;
mod stream;

pub use backend::*;
pub use channel::{Channel, EngineSource, MixerSettings};
pub use config::*;
pub use controller::*;
pub use convbuf::*;
pub use device::{DeviceInfo, HostInfo, host_name, list_devices, list_hosts};
pub use error::*;
pub use pipeline::*;
pub use priority::*;
pub use registry::*;
pub use routing::*;
pub use sleep::*;
pub use stream::*;
