//! vb-dsp: Elastic rate matching and channel mixing
//!
//! # Architecture
//!
//! ```text
//!  writer block @ rate A                               reader block @ rate B
//! ┌──────────────┐    ┌────────────────┐    ┌──────────────────┐    ┌─────────┐
//! │ feed(block)  │───▶│ BlockResampler │───▶│ AudioRingBuffer  │───▶│ drain() │
//! └──────────────┘    │  (rubato)      │    │ (SPSC, frames)   │    └─────────┘
//!                     └────────────────┘    └──────────────────┘
//! ```
//!
//! A [`ChannelMixer`] sits in front of an outbound rate matcher and sums
//! several engine-side sources, each at its own rate, into one stream.

mod error;
mod mixer;
mod resample;
mod ringbuf;
mod rmatch;

pub use error::*;
pub use mixer::*;
pub use resample::*;
pub use ringbuf::*;
pub use rmatch::*;
