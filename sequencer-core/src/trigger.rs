//! Trigger sources and the minimum-spacing gate used by wake collaborators.
//!
//! The orchestrator only consumes a parameterless "start sequence" request.
//! Button and remote collaborators pass raw requests through a [`TriggerGate`]
//! first so contact bounce or a burst of writes produces one arm call.

use core::fmt;
use core::time::Duration;

use crate::time::{Tick, ticks_between};

/// Origin of an arm request, kept for diagnostics only.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TriggerSource {
    Button,
    /// Recurring cycle epoch.
    Timer,
    /// Write on the remote trigger characteristic.
    Remote,
    Console,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Button => f.write_str("button"),
            TriggerSource::Timer => f.write_str("timer"),
            TriggerSource::Remote => f.write_str("remote"),
            TriggerSource::Console => f.write_str("console"),
        }
    }
}

/// Button debounce used alongside the software-stepped sequencer.
pub const STEPPED_BUTTON_DEBOUNCE: Duration = Duration::from_millis(300);

/// Button debounce used alongside the hardware-routed sequencer.
pub const ROUTED_BUTTON_DEBOUNCE: Duration = Duration::from_millis(50);

/// Drops requests that arrive closer than `min_spacing` ticks to the last
/// accepted one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TriggerGate {
    min_spacing: u64,
    width_bits: u32,
    last_accepted: Option<Tick>,
}

impl TriggerGate {
    /// Gate for a 64-bit tick source.
    #[must_use]
    pub const fn new(min_spacing: u64) -> Self {
        Self::with_width(min_spacing, 64)
    }

    /// Gate for a counter that wraps at `width_bits`.
    #[must_use]
    pub const fn with_width(min_spacing: u64, width_bits: u32) -> Self {
        Self {
            min_spacing,
            width_bits,
            last_accepted: None,
        }
    }

    #[must_use]
    pub const fn min_spacing(&self) -> u64 {
        self.min_spacing
    }

    /// Changes the spacing; the last accepted timestamp is kept.
    pub fn set_min_spacing(&mut self, min_spacing: u64) {
        self.min_spacing = min_spacing;
    }

    /// Returns `true` and records `now` when the request should be forwarded.
    pub fn admit(&mut self, now: Tick) -> bool {
        let admitted = self
            .last_accepted
            .is_none_or(|last| ticks_between(last, now, self.width_bits) >= self.min_spacing);
        if admitted {
            self.last_accepted = Some(now);
        }
        admitted
    }

    /// Forgets the last accepted request.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

/// Advertised name of the remote trigger peripheral.
pub const REMOTE_DEVICE_NAME: &str = "IOTrigger";

/// 16-bit UUID of the remote trigger service.
pub const REMOTE_SERVICE_UUID: u16 = 0x1234;

/// 16-bit UUID of the writable trigger characteristic.
pub const REMOTE_CHARACTERISTIC_UUID: u16 = 0x1235;

/// Connection parameters requested by the remote trigger peripheral.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LinkProfile {
    pub connection_interval: Duration,
    pub peripheral_latency: u16,
    pub supervision_timeout: Duration,
}

impl LinkProfile {
    /// Connection interval in 1.25 ms units.
    #[must_use]
    pub fn interval_units(&self) -> u16 {
        let units = self.connection_interval.as_micros() / 1_250;
        u16::try_from(units).unwrap_or(u16::MAX)
    }

    /// Supervision timeout in 10 ms units.
    #[must_use]
    pub fn timeout_units(&self) -> u16 {
        let units = self.supervision_timeout.as_millis() / 10;
        u16::try_from(units).unwrap_or(u16::MAX)
    }
}

/// Slow link: the peripheral wakes rarely and skips up to four intervals.
pub const REMOTE_LINK_PROFILE: LinkProfile = LinkProfile {
    connection_interval: Duration::from_millis(800),
    peripheral_latency: 4,
    supervision_timeout: Duration::from_secs(4),
};

/// Remote write endpoint. The payload is opaque: any accepted write is a
/// trigger request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RemoteTrigger {
    gate: TriggerGate,
}

impl RemoteTrigger {
    #[must_use]
    pub const fn new(gate: TriggerGate) -> Self {
        Self { gate }
    }

    /// Accepts `payload` and reports how many bytes were consumed, which is
    /// always all of them.
    pub fn write(&mut self, payload: &[u8]) -> usize {
        payload.len()
    }

    /// Changes the debounce spacing without forgetting the last accepted
    /// write.
    pub fn set_min_spacing(&mut self, min_spacing: u64) {
        self.gate.set_min_spacing(min_spacing);
    }

    /// Accepts a write at `now` and returns the trigger to forward, if any.
    pub fn on_write(&mut self, payload: &[u8], now: Tick) -> (usize, Option<TriggerSource>) {
        let accepted = self.write(payload);
        let trigger = self.gate.admit(now).then_some(TriggerSource::Remote);
        (accepted, trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{GRTC_TICK_RATE, counter_mask};

    #[test]
    fn gate_spacing_in_ticks() {
        let spacing = GRTC_TICK_RATE.ticks(ROUTED_BUTTON_DEBOUNCE);
        let mut gate = TriggerGate::new(spacing);

        assert!(gate.admit(1_000));
        assert!(!gate.admit(1_000 + spacing - 1));
        assert!(gate.admit(1_000 + spacing));
    }

    #[test]
    fn presses_100ms_apart_pass_a_50ms_gate() {
        let mut gate = TriggerGate::new(GRTC_TICK_RATE.ticks(ROUTED_BUTTON_DEBOUNCE));
        assert!(gate.admit(0));
        assert!(gate.admit(100_000));
    }

    #[test]
    fn gate_handles_counter_wrap() {
        let mut gate = TriggerGate::with_width(100, 24);
        let near_wrap = counter_mask(24) - 20;

        assert!(gate.admit(near_wrap));
        assert!(!gate.admit(30));
        assert!(gate.admit(80));
    }

    #[test]
    fn remote_write_ignores_payload() {
        let mut remote = RemoteTrigger::new(TriggerGate::new(0));
        assert_eq!(remote.write(&[0xde, 0xad, 0xbe]), 3);
        assert_eq!(remote.write(&[]), 0);
        assert_eq!(
            remote.on_write(b"go", 10),
            (2, Some(TriggerSource::Remote))
        );
    }

    #[test]
    fn remote_spacing_change_keeps_last_write() {
        let mut remote = RemoteTrigger::new(TriggerGate::new(0));
        assert_eq!(remote.on_write(&[0x01], 1_000).1, Some(TriggerSource::Remote));

        remote.set_min_spacing(300);
        assert_eq!(remote.on_write(&[0x01], 1_060).1, None);
        assert_eq!(remote.on_write(&[0x01], 1_300).1, Some(TriggerSource::Remote));
    }

    #[test]
    fn link_profile_units() {
        assert_eq!(REMOTE_LINK_PROFILE.interval_units(), 640);
        assert_eq!(REMOTE_LINK_PROFILE.timeout_units(), 400);
    }
}
