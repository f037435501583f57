//! vb-core: Shared sample types and format conversion for vacbridge
//!
//! Every block that crosses a crate boundary is interleaved stereo `f64`:
//! `[L0, R0, L1, R1, ...]`. Device I/O happens in 32-bit float and is widened
//! into this representation on entry and narrowed back on exit.

mod convert;
mod sample;

pub use convert::*;
pub use sample::*;
