#![cfg_attr(any(not(target_os = "none"), feature = "routed"), allow(dead_code))]

//! One-shot compare channels on top of the embassy time driver.
//!
//! The RTC backing `embassy-time` already multiplexes alarms, so compare
//! channels here are slots in a table. The sequencer programs slots through
//! [`EmbassyCompare`]; the compare task sleeps until the earliest slot and
//! delivers it back as a compare event.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;
use sequencer_core::time::{Clock, CompareId, OneShotTimer, Tick};

/// Compare channels available to sequencers.
pub const COMPARE_CHANNELS: usize = 2;

/// Allocation and deadline state for a fixed pool of compare channels.
#[derive(Debug)]
pub struct CompareSlots<const N: usize> {
    allocated: [bool; N],
    deadlines: [Option<Tick>; N],
}

impl<const N: usize> CompareSlots<N> {
    pub const fn new() -> Self {
        Self {
            allocated: [false; N],
            deadlines: [None; N],
        }
    }

    pub fn allocate(&mut self) -> Option<CompareId> {
        let index = self.allocated.iter().position(|taken| !taken)?;
        self.allocated[index] = true;
        Some(CompareId(u8::try_from(index).ok()?))
    }

    /// Arms `channel`; ignored for channels that were never allocated.
    pub fn schedule(&mut self, channel: CompareId, deadline: Tick) {
        let index = usize::from(channel.0);
        if self.allocated.get(index).copied().unwrap_or(false) {
            self.deadlines[index] = Some(deadline);
        }
    }

    pub fn cancel(&mut self, channel: CompareId) {
        if let Some(slot) = self.deadlines.get_mut(usize::from(channel.0)) {
            *slot = None;
        }
    }

    /// Earliest pending deadline across all channels.
    pub fn earliest(&self) -> Option<(CompareId, Tick)> {
        self.pending().min_by_key(|(_, deadline)| *deadline)
    }

    /// Disarms and returns one channel whose deadline is at or before `now`.
    pub fn take_due(&mut self, now: Tick) -> Option<(CompareId, Tick)> {
        let (channel, deadline) = self
            .pending()
            .filter(|(_, deadline)| *deadline <= now)
            .min_by_key(|(_, deadline)| *deadline)?;
        self.cancel(channel);
        Some((channel, deadline))
    }

    fn pending(&self) -> impl Iterator<Item = (CompareId, Tick)> + '_ {
        self.deadlines
            .iter()
            .enumerate()
            .filter_map(|(index, deadline)| {
                let deadline = (*deadline)?;
                Some((CompareId(u8::try_from(index).ok()?), deadline))
            })
    }
}

impl<const N: usize> Default for CompareSlots<N> {
    fn default() -> Self {
        Self::new()
    }
}

static SLOTS: Mutex<CriticalSectionRawMutex, RefCell<CompareSlots<COMPARE_CHANNELS>>> =
    Mutex::new(RefCell::new(CompareSlots::new()));

/// Raised whenever a slot changes so the compare task re-evaluates its sleep.
pub static RESCHEDULED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Earliest armed deadline in the shared table.
pub fn earliest() -> Option<(CompareId, Tick)> {
    SLOTS.lock(|slots| slots.borrow().earliest())
}

/// Pops one due channel from the shared table.
pub fn take_due(now: Tick) -> Option<(CompareId, Tick)> {
    SLOTS.lock(|slots| slots.borrow_mut().take_due(now))
}

/// Handle implementing [`OneShotTimer`] over the shared slot table.
#[derive(Copy, Clone, Debug, Default)]
pub struct EmbassyCompare;

impl Clock for EmbassyCompare {
    fn read(&self) -> Tick {
        Instant::now().as_ticks()
    }
}

impl OneShotTimer for EmbassyCompare {
    fn allocate_channel(&mut self) -> Option<CompareId> {
        SLOTS.lock(|slots| slots.borrow_mut().allocate())
    }

    fn schedule_at(&mut self, channel: CompareId, deadline: Tick) {
        SLOTS.lock(|slots| slots.borrow_mut().schedule(channel, deadline));
        RESCHEDULED.signal(());
    }

    fn cancel(&mut self, channel: CompareId) {
        SLOTS.lock(|slots| slots.borrow_mut().cancel(channel));
        RESCHEDULED.signal(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_hands_out_each_slot_once() {
        let mut slots = CompareSlots::<2>::new();
        assert_eq!(slots.allocate(), Some(CompareId(0)));
        assert_eq!(slots.allocate(), Some(CompareId(1)));
        assert_eq!(slots.allocate(), None);
    }

    #[test]
    fn due_channels_come_out_in_deadline_order() {
        let mut slots = CompareSlots::<2>::new();
        let first = slots.allocate().unwrap_or(CompareId(0));
        let second = slots.allocate().unwrap_or(CompareId(1));
        slots.schedule(first, 500);
        slots.schedule(second, 200);

        assert_eq!(slots.earliest(), Some((second, 200)));
        assert_eq!(slots.take_due(100), None);
        assert_eq!(slots.take_due(600), Some((second, 200)));
        assert_eq!(slots.take_due(600), Some((first, 500)));
        assert_eq!(slots.take_due(600), None);
    }

    #[test]
    fn rescheduling_replaces_and_cancel_clears() {
        let mut slots = CompareSlots::<1>::new();
        let channel = slots.allocate().unwrap_or(CompareId(0));
        slots.schedule(channel, 100);
        slots.schedule(channel, 300);
        assert_eq!(slots.earliest(), Some((channel, 300)));

        slots.cancel(channel);
        assert_eq!(slots.earliest(), None);

        slots.schedule(CompareId(7), 50);
        assert_eq!(slots.earliest(), None, "unknown channels are ignored");
    }
}
