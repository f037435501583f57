//! Channel Registry
//!
//! Fixed-capacity table of channels indexed by small integer id. Lookups are
//! bounds-checked and report a missing channel instead of assuming one.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use vb_dsp::{ElasticBuilder, RateMatcherBuilder};

use crate::{Channel, ChannelConfig, ChannelError, ChannelResult};

/// Channel slots in the process-wide registry
pub const MAX_CHANNELS: usize = 2;

/// Channels whose master volume follows the global monitor gain
const MONITOR_GAIN_CHANNELS: [usize; 2] = [0, 1];

pub struct Registry {
    slots: RwLock<Vec<Option<Arc<Channel>>>>,
    builder: Arc<dyn RateMatcherBuilder>,
}

impl Registry {
    /// Registry with `capacity` slots building rate matchers with `builder`
    pub fn new(capacity: usize, builder: Arc<dyn RateMatcherBuilder>) -> Self {
        Self {
            slots: RwLock::new(vec![None; capacity]),
            builder,
        }
    }

    /// Process-wide registry using the default rate matcher
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(|| Registry::new(MAX_CHANNELS, Arc::new(ElasticBuilder)))
    }

    pub fn capacity(&self) -> usize {
        self.slots.read().len()
    }

    fn check_id(&self, id: usize, capacity: usize) -> ChannelResult<()> {
        if id >= capacity {
            return Err(ChannelError::InvalidId { id, capacity });
        }
        Ok(())
    }

    /// Build and install a channel; an occupied slot is rejected.
    pub fn create(&self, id: usize, config: ChannelConfig) -> ChannelResult<Arc<Channel>> {
        let mut slots = self.slots.write();
        self.check_id(id, slots.len())?;
        if slots[id].is_some() {
            return Err(ChannelError::SlotOccupied(id));
        }

        let channel = Arc::new(Channel::new(id, config, Arc::clone(&self.builder))?);
        slots[id] = Some(Arc::clone(&channel));
        Ok(channel)
    }

    /// Remove a channel. Its stream is stopped and its resources released
    /// once the last outstanding handle is dropped.
    pub fn destroy(&self, id: usize) -> ChannelResult<()> {
        let channel = {
            let mut slots = self.slots.write();
            self.check_id(id, slots.len())?;
            slots[id].take().ok_or(ChannelError::NotFound(id))?
        };

        if let Err(e) = channel.stop_stream() {
            log::warn!("Channel {}: stream stop failed during destroy: {}", id, e);
        }
        Ok(())
    }

    pub fn get(&self, id: usize) -> ChannelResult<Arc<Channel>> {
        let slots = self.slots.read();
        self.check_id(id, slots.len())?;
        slots[id].clone().ok_or(ChannelError::NotFound(id))
    }

    pub fn contains(&self, id: usize) -> bool {
        self.slots.read().get(id).is_some_and(Option::is_some)
    }

    /// Ids of live channels
    pub fn ids(&self) -> Vec<usize> {
        self.slots
            .read()
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|_| id))
            .collect()
    }

    /// Monitor gain: master volume of channels 0 and 1, where present
    pub fn set_monitor_gain(&self, gain: f64) {
        for id in MONITOR_GAIN_CHANNELS {
            if let Ok(channel) = self.get(id) {
                channel.set_master_volume(gain);
            }
        }
    }
}
