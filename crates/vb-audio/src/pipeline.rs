//! Rate matcher pair of one channel

use vb_dsp::{RateMatcher, RateMatcherBuilder, RateMatcherConfig};

use crate::{ChannelConfig, ChannelResult};

/// Selects one of the two rate matchers of a channel.
///
/// Numeric selector 0 is `FromDevice` and addresses the inbound matcher.
/// Host integrations label selector 0 "from VAC" although it reads the ring
/// the device fills; the index follows the matcher, not that label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device to engine (inbound)
    FromDevice,
    /// Engine to device (outbound)
    ToDevice,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::FromDevice, Direction::ToDevice];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Direction::FromDevice => 0,
            Direction::ToDevice => 1,
        }
    }
}

/// Both rate matchers of a channel, built together and published as one unit
pub struct Pipeline {
    pub inbound: Box<dyn RateMatcher>,
    pub outbound: Box<dyn RateMatcher>,
    /// Inbound ring capacity (frames)
    pub in_ring_size: usize,
    /// Outbound ring capacity (frames)
    pub out_ring_size: usize,
}

impl Pipeline {
    pub fn build(builder: &dyn RateMatcherBuilder, config: &ChannelConfig) -> ChannelResult<Self> {
        let in_ring_size = config.in_ring_size();
        let out_ring_size = config.out_ring_size();

        let inbound = builder.build(&RateMatcherConfig {
            in_size: config.vac_size,
            out_size: config.mic_size,
            in_rate: config.vac_rate,
            out_rate: config.mic_rate,
            ring_frames: in_ring_size,
            initial_variance: config.initial_variance_in,
        })?;

        let (source_size, source_rate) = config.outbound_source();
        let outbound = builder.build(&RateMatcherConfig {
            in_size: source_size,
            out_size: config.vac_size,
            in_rate: source_rate,
            out_rate: config.vac_rate,
            ring_frames: out_ring_size,
            initial_variance: config.initial_variance_out,
        })?;

        Ok(Self {
            inbound,
            outbound,
            in_ring_size,
            out_ring_size,
        })
    }

    #[inline]
    pub fn matcher(&self, direction: Direction) -> &dyn RateMatcher {
        match direction {
            Direction::FromDevice => self.inbound.as_ref(),
            Direction::ToDevice => self.outbound.as_ref(),
        }
    }

    /// The larger of the two ring capacities (frames)
    #[inline]
    pub fn max_ring_size(&self) -> usize {
        self.in_ring_size.max(self.out_ring_size)
    }
}
