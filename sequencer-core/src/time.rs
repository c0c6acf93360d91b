//! Time source abstractions.
//!
//! Two flavours of timer are used by the sequencer. The software-stepped design
//! needs a free-running monotonic counter with one-shot compare channels; the
//! hardware-routed design needs a periodic timer whose "period elapsed" event
//! feeds the interconnect and a second timer running as an event counter.

use core::time::Duration;

/// Raw tick count read from a monotonic counter.
pub type Tick = u64;

/// Frequency of a monotonic counter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickRate {
    hz: u32,
}

/// Global real-time counter frequency on the reference board (1 tick == 1 µs).
pub const GRTC_TICK_RATE: TickRate = TickRate::from_hz(1_000_000);

/// Low-frequency RTC rate driven by the 32.768 kHz crystal.
pub const RTC_TICK_RATE: TickRate = TickRate::from_hz(32_768);

impl TickRate {
    #[must_use]
    pub const fn from_hz(hz: u32) -> Self {
        Self { hz }
    }

    #[must_use]
    pub const fn hz(self) -> u32 {
        self.hz
    }

    /// Converts a duration to ticks, rounding down and saturating at `u64::MAX`.
    #[must_use]
    pub fn ticks(self, duration: Duration) -> u64 {
        let ticks = duration.as_nanos() * u128::from(self.hz) / 1_000_000_000;
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// Converts a tick count back into a duration.
    #[must_use]
    pub fn duration(self, ticks: u64) -> Duration {
        if self.hz == 0 {
            return Duration::ZERO;
        }
        let nanos = u128::from(ticks) * 1_000_000_000 / u128::from(self.hz);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Mask selecting the valid bits of a counter `width_bits` wide.
#[must_use]
pub const fn counter_mask(width_bits: u32) -> u64 {
    if width_bits >= 64 {
        u64::MAX
    } else {
        (1u64 << width_bits) - 1
    }
}

/// Computes `now + delta` on a counter that wraps at `width_bits`.
#[must_use]
pub const fn deadline_after(now: Tick, delta: u64, width_bits: u32) -> Tick {
    now.wrapping_add(delta) & counter_mask(width_bits)
}

/// Ticks elapsed from `earlier` to `later` on a counter that wraps at `width_bits`.
#[must_use]
pub const fn ticks_between(earlier: Tick, later: Tick, width_bits: u32) -> u64 {
    later.wrapping_sub(earlier) & counter_mask(width_bits)
}

/// Read-only view of a monotonic counter.
pub trait Clock {
    /// Returns the current tick count.
    fn read(&self) -> Tick;

    /// Number of significant bits before the counter wraps.
    fn width_bits(&self) -> u32 {
        64
    }
}

/// Identifier of a compare channel on a [`OneShotTimer`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CompareId(pub u8);

/// Monotonic counter with one-shot compare channels.
///
/// A scheduled compare fires at most once; the driver reports it to the
/// sequencer as [`HardwareEvent::Compare`](crate::orchestrator::HardwareEvent)
/// carrying the channel and the programmed deadline.
pub trait OneShotTimer: Clock {
    /// Reserves a compare channel from the shared pool.
    fn allocate_channel(&mut self) -> Option<CompareId>;

    /// Arms a one-shot compare at `deadline` on `channel`, replacing any
    /// compare already pending there.
    fn schedule_at(&mut self, channel: CompareId, deadline: Tick);

    /// Clears a pending compare without firing it. A no-op when nothing is pending.
    fn cancel(&mut self, channel: CompareId);
}

/// Timer running in periodic mode whose compare event is routed by hardware.
pub trait PeriodicTimer {
    /// Starts (or restarts) the timer with the given period.
    fn start_periodic(&mut self, period: u64);

    /// Stops the timer. Idempotent.
    fn stop(&mut self);

    /// Resets the internal counter to zero. Idempotent.
    fn clear(&mut self);

    /// Moves a stopped timer into the mode with the lowest idle current.
    fn enter_low_power(&mut self);
}

/// Timer running as an event counter with a compare threshold.
pub trait EventCounter {
    /// Programs the compare threshold that raises the completion event.
    fn set_threshold(&mut self, count: u32);

    /// Enables or disables the processor interrupt on the threshold event.
    fn set_completion_interrupt(&mut self, enabled: bool);

    /// Starts accepting count tasks.
    fn start(&mut self);

    /// Stops accepting count tasks. Idempotent.
    fn stop(&mut self);

    /// Resets the count to zero. Idempotent.
    fn clear(&mut self);

    /// Captures the number of count tasks received since the last clear.
    fn count(&mut self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_rate_converts_milliseconds() {
        assert_eq!(GRTC_TICK_RATE.ticks(Duration::from_millis(300)), 300_000);
        assert_eq!(RTC_TICK_RATE.ticks(Duration::from_secs(1)), 32_768);
        assert_eq!(
            RTC_TICK_RATE.duration(16_384),
            Duration::from_millis(500),
        );
    }

    #[test]
    fn deadline_wraps_at_counter_width() {
        let now = counter_mask(24) - 10;
        let deadline = deadline_after(now, 25, 24);
        assert_eq!(deadline, 14);
        assert_eq!(ticks_between(now, deadline, 24), 25);
    }

    #[test]
    fn full_width_counter_wraps_like_u64() {
        let deadline = deadline_after(u64::MAX, 2, 64);
        assert_eq!(deadline, 1);
        assert_eq!(ticks_between(u64::MAX, deadline, 64), 2);
    }
}
