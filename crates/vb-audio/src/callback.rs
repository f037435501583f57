//! Realtime callback
//!
//! CRITICAL: runs on the device thread. Never blocks: the only lock it waits
//! on is the one-shot priority attempt, and the conversion buffer is taken
//! with `try_lock`.

use std::sync::atomic::Ordering;

use vb_core::{STEREO, narrow_f32, widen_f32};

use crate::channel::ChannelShared;
use crate::convbuf::required_bytes;

/// Process one device period of interleaved stereo `f32`.
///
/// Inert: both regions are zeroed and no rate matcher is touched.
/// Active: input is widened into the conversion buffer and fed to the
/// inbound matcher, then the outbound matcher is drained into the same
/// region and narrowed into `output`.
pub(crate) fn process(shared: &ChannelShared, input: &mut [f32], output: &mut [f32]) {
    shared.attempt_priority();

    if !shared.run.load(Ordering::Acquire) {
        input.fill(0.0);
        output.fill(0.0);
        return;
    }

    // Held only by a control-side resize
    let Some(mut convbuf) = shared.convbuf.try_lock() else {
        output.fill(0.0);
        return;
    };

    let pipeline = shared.pipeline.load();
    let in_len = input.len() - input.len() % STEREO;
    let out_len = output.len() - output.len() % STEREO;
    let len = in_len.max(out_len);

    convbuf.ensure_capacity(required_bytes(pipeline.max_ring_size(), len / STEREO));
    let scratch = convbuf.region(len);

    let widened = widen_f32(&input[..in_len], scratch);
    pipeline.inbound.feed(&scratch[..widened]);

    pipeline.outbound.drain(&mut scratch[..out_len]);
    narrow_f32(&scratch[..out_len], output);
    output[out_len..].fill(0.0);
}
