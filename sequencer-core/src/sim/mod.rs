//! Simulated peripherals for host tests and the emulator.
//!
//! Every model keeps its state in fixed-capacity `heapless` storage so the
//! module builds for `no_std` targets alongside the rest of the crate. Time is
//! kept as an absolute, never-wrapping tick count; models that stand in for a
//! narrower counter mask what they report through [`Clock::read`].

mod bench;

pub use bench::{Bench, RoutedBench, SimRouted, SimStepped, SteppedBench};

use heapless::Vec;

use crate::interconnect::{
    ChannelBinding, ChannelId, EventInterconnect, InterconnectError, Publisher, Subscriber,
};
use crate::output::{Level, OutputActuator};
use crate::time::{
    Clock, CompareId, EventCounter, OneShotTimer, PeriodicTimer, Tick, counter_mask, ticks_between,
};

/// Number of edges retained by [`SimOutput`].
pub const EDGE_CAPACITY: usize = 128;

const MAX_COMPARES: usize = 4;
const MAX_BINDINGS: usize = 8;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct PendingCompare {
    channel: CompareId,
    deadline: Tick,
    fires_at: u64,
}

/// Free-running counter with a small pool of one-shot compare channels.
#[derive(Clone, Debug)]
pub struct SimCompareTimer {
    now: u64,
    width_bits: u32,
    capacity: u8,
    allocated: u8,
    pending: Vec<PendingCompare, MAX_COMPARES>,
}

impl SimCompareTimer {
    /// Timer with `capacity` compare channels on a 64-bit counter.
    #[must_use]
    pub const fn new(capacity: u8) -> Self {
        Self::with_width(capacity, 64)
    }

    /// Timer whose reported counter wraps at `width_bits`.
    #[must_use]
    pub const fn with_width(capacity: u8, width_bits: u32) -> Self {
        Self {
            now: 0,
            width_bits,
            capacity,
            allocated: 0,
            pending: Vec::new(),
        }
    }

    /// Absolute simulated time, unaffected by counter wrap.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn set_now(&mut self, now: u64) {
        self.now = now;
    }

    /// Deadline armed on `channel`, as programmed.
    #[must_use]
    pub fn pending_deadline(&self, channel: CompareId) -> Option<Tick> {
        self.pending
            .iter()
            .find(|pending| pending.channel == channel)
            .map(|pending| pending.deadline)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Fires the earliest compare due at or before `until`, moving time to it.
    ///
    /// The compare is disarmed, matching one-shot hardware.
    pub fn take_next_due(&mut self, until: u64) -> Option<(CompareId, Tick)> {
        let (index, next) = self
            .pending
            .iter()
            .enumerate()
            .min_by_key(|(_, pending)| pending.fires_at)?;
        if next.fires_at > until {
            return None;
        }
        let next = *next;
        self.pending.swap_remove(index);
        self.now = next.fires_at;
        Some((next.channel, next.deadline))
    }
}

impl Clock for SimCompareTimer {
    fn read(&self) -> Tick {
        self.now & counter_mask(self.width_bits)
    }

    fn width_bits(&self) -> u32 {
        self.width_bits
    }
}

impl OneShotTimer for SimCompareTimer {
    fn allocate_channel(&mut self) -> Option<CompareId> {
        if self.allocated >= self.capacity {
            return None;
        }
        let channel = CompareId(self.allocated);
        self.allocated += 1;
        Some(channel)
    }

    fn schedule_at(&mut self, channel: CompareId, deadline: Tick) {
        self.cancel(channel);
        let wait = ticks_between(self.read(), deadline, self.width_bits);
        let entry = PendingCompare {
            channel,
            deadline,
            fires_at: self.now.saturating_add(wait),
        };
        // Pool is bounded by allocate_channel, so this cannot overflow.
        let _ = self.pending.push(entry);
    }

    fn cancel(&mut self, channel: CompareId) {
        self.pending.retain(|pending| pending.channel != channel);
    }
}

/// Level change observed on [`SimOutput`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Edge {
    pub at: u64,
    pub level: Level,
}

/// Output pin that records every level change.
#[derive(Clone, Debug, Default)]
pub struct SimOutput {
    level: Level,
    time: u64,
    toggles: u32,
    task: Option<ChannelId>,
    edges: Vec<Edge, EDGE_CAPACITY>,
}

impl SimOutput {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            level: Level::Low,
            time: 0,
            toggles: 0,
            task: None,
            edges: Vec::new(),
        }
    }

    /// Timestamp applied to edges recorded from now on.
    pub fn set_time(&mut self, time: u64) {
        self.time = time;
    }

    /// Toggles applied since the pin was last configured.
    #[must_use]
    pub fn toggle_count(&self) -> u32 {
        self.toggles
    }

    #[must_use]
    pub fn task_bound(&self) -> bool {
        self.task.is_some()
    }

    #[must_use]
    pub fn task_channel(&self) -> Option<ChannelId> {
        self.task
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn clear_edges(&mut self) {
        self.edges.clear();
    }

    /// Toggle task triggered through the interconnect. Ignored while unbound.
    pub fn hardware_toggle(&mut self) {
        if self.task.is_some() {
            self.toggles += 1;
            self.drive(self.level.toggled());
        }
    }

    fn drive(&mut self, level: Level) {
        if level != self.level {
            self.level = level;
            // Edges past capacity are dropped.
            let _ = self.edges.push(Edge {
                at: self.time,
                level,
            });
        }
    }
}

impl OutputActuator for SimOutput {
    fn configure_output(&mut self, initial: Level) {
        self.toggles = 0;
        self.drive(initial);
    }

    fn toggle_software(&mut self) {
        self.toggles += 1;
        self.drive(self.level.toggled());
    }

    fn clear(&mut self) {
        self.drive(Level::Low);
    }

    fn bind_toggle_task(&mut self, channel: ChannelId) {
        self.task = Some(channel);
    }

    fn release(&mut self) {
        self.task = None;
        self.drive(Level::Low);
    }

    fn level(&self) -> Level {
        self.level
    }
}

/// Bare monotonic clock.
#[derive(Copy, Clone, Debug, Default)]
pub struct SimClock {
    now: u64,
}

impl SimClock {
    #[must_use]
    pub const fn new() -> Self {
        Self { now: 0 }
    }

    #[must_use]
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn set_now(&mut self, now: u64) {
        self.now = now;
    }
}

impl Clock for SimClock {
    fn read(&self) -> Tick {
        self.now
    }
}

/// Periodic timer whose period event is published onto the interconnect.
#[derive(Copy, Clone, Debug, Default)]
pub struct SimPacer {
    period: Option<u64>,
    elapsed: u64,
    running: bool,
    low_power: bool,
}

impl SimPacer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            period: None,
            elapsed: 0,
            running: false,
            low_power: false,
        }
    }

    /// Period programmed by the last `start_periodic`.
    #[must_use]
    pub fn period(&self) -> Option<u64> {
        self.period
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn in_low_power(&self) -> bool {
        self.low_power
    }

    /// Ticks until the next period event, if running.
    #[must_use]
    pub fn ticks_to_next(&self) -> Option<u64> {
        match (self.running, self.period) {
            (true, Some(period)) if period > 0 => Some(period - self.elapsed),
            _ => None,
        }
    }

    /// Lets `ticks` pass; returns `true` when a period event fires.
    pub fn elapse(&mut self, ticks: u64) -> bool {
        let Some(period) = self.period.filter(|_| self.running) else {
            return false;
        };
        self.elapsed += ticks;
        if self.elapsed >= period {
            self.elapsed = 0;
            return true;
        }
        false
    }
}

impl PeriodicTimer for SimPacer {
    fn start_periodic(&mut self, period: u64) {
        self.period = Some(period);
        self.elapsed = 0;
        self.running = true;
        self.low_power = false;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn clear(&mut self) {
        self.elapsed = 0;
    }

    fn enter_low_power(&mut self) {
        if !self.running {
            self.low_power = true;
        }
    }
}

/// Timer in counter mode with one compare threshold.
#[derive(Copy, Clone, Debug, Default)]
pub struct SimCounter {
    threshold: Option<u32>,
    count: u32,
    running: bool,
    interrupt: bool,
}

impl SimCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threshold: None,
            count: 0,
            running: false,
            interrupt: false,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> Option<u32> {
        self.threshold
    }

    #[must_use]
    pub fn interrupt_enabled(&self) -> bool {
        self.interrupt
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Count task. Returns `true` when this increment reaches the threshold.
    pub fn increment(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.count += 1;
        self.threshold == Some(self.count)
    }
}

impl EventCounter for SimCounter {
    fn set_threshold(&mut self, count: u32) {
        self.threshold = Some(count);
    }

    fn set_completion_interrupt(&mut self, enabled: bool) {
        self.interrupt = enabled;
    }

    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn clear(&mut self) {
        self.count = 0;
    }

    fn count(&mut self) -> u32 {
        self.count
    }
}

/// Channel pool and route table.
#[derive(Clone, Debug)]
pub struct SimInterconnect {
    capacity: u8,
    allocated: u32,
    enabled: u32,
    bindings: Vec<ChannelBinding, MAX_BINDINGS>,
}

impl SimInterconnect {
    /// Pool of `capacity` channels, at most 32.
    #[must_use]
    pub fn new(capacity: u8) -> Self {
        Self {
            capacity: capacity.min(32),
            allocated: 0,
            enabled: 0,
            bindings: Vec::new(),
        }
    }

    #[must_use]
    pub fn allocated_count(&self) -> u32 {
        self.allocated.count_ones()
    }

    #[must_use]
    pub fn enabled_count(&self) -> u32 {
        self.enabled.count_ones()
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_enabled(&self, channel: ChannelId) -> bool {
        self.enabled & bit(channel) != 0
    }

    /// Every subscriber bound to `publisher`, enabled or not.
    #[must_use]
    pub fn subscribers_of(&self, publisher: Publisher) -> Vec<Subscriber, MAX_BINDINGS> {
        self.bindings
            .iter()
            .filter(|binding| binding.publisher == publisher)
            .map(|binding| binding.subscriber)
            .collect()
    }

    /// Subscribers that receive `publisher` right now, in binding order.
    #[must_use]
    pub fn routed_subscribers(&self, publisher: Publisher) -> Vec<Subscriber, MAX_BINDINGS> {
        self.bindings
            .iter()
            .filter(|binding| binding.publisher == publisher && self.is_enabled(binding.channel))
            .map(|binding| binding.subscriber)
            .collect()
    }
}

fn bit(channel: ChannelId) -> u32 {
    1u32.checked_shl(u32::from(channel.0)).unwrap_or(0)
}

impl EventInterconnect for SimInterconnect {
    fn allocate(&mut self) -> Result<ChannelId, InterconnectError> {
        let index = (0..self.capacity)
            .find(|index| self.allocated & (1 << index) == 0)
            .ok_or(InterconnectError::NoFreeChannel)?;
        self.allocated |= 1 << index;
        Ok(ChannelId(index))
    }

    fn free(&mut self, channel: ChannelId) {
        self.allocated &= !bit(channel);
        self.enabled &= !bit(channel);
    }

    fn bind(&mut self, binding: ChannelBinding) -> Result<(), InterconnectError> {
        let conflict = self.bindings.iter().any(|existing| {
            existing.publisher == binding.publisher && existing.channel != binding.channel
        });
        if conflict {
            return Err(InterconnectError::PublisherBusy(binding.publisher));
        }
        self.bindings
            .push(binding)
            .map_err(|_| InterconnectError::RouteTableFull)
    }

    fn unbind(&mut self, publisher: Publisher, subscriber: Subscriber) {
        self.bindings.retain(|binding| {
            !(binding.publisher == publisher && binding.subscriber == subscriber)
        });
    }

    fn enable(&mut self, channels: &[ChannelId]) {
        for channel in channels {
            self.enabled |= bit(*channel);
        }
    }

    fn disable(&mut self, channels: &[ChannelId]) {
        for channel in channels {
            self.enabled &= !bit(*channel);
        }
    }
}
