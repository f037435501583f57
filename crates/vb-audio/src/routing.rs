//! Monitor routing between the receive path and the transmit monitor

/// Mixer input carrying receive audio
pub const RX_AUDIO_INPUT: usize = 0;
/// Mixer input carrying the transmit monitor
pub const TX_MONITOR_INPUT: usize = 1;

/// Routing flags.
///
/// `vox` is stored but does not take part in routing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorRouting {
    pub vox: bool,
    /// Transmitting
    pub mox: bool,
    /// Monitor enabled
    pub mon: bool,
}

impl MonitorRouting {
    /// Which mixer inputs are unmuted, indexed by mixer input
    pub fn active_inputs(&self) -> [bool; 2] {
        match (self.mox, self.mon) {
            (false, _) => [true, false],
            (true, true) => [false, true],
            (true, false) => [false, false],
        }
    }
}
