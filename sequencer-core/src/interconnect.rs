//! Event interconnect abstraction and the route graph owned by a sequence.
//!
//! The interconnect lets one peripheral's event trigger tasks on other
//! peripherals without the processor. A sequence describes the wiring it needs
//! as a static [`RoutePlan`]; [`RouteSet`] turns the plan into concrete
//! [`ChannelBinding`]s, enables them as a unit, and tears them down as a unit so
//! no channel outlives the sequence that allocated it.

use core::fmt;

use heapless::Vec;

/// Hardware channel identifier on the interconnect.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ChannelId(pub u8);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Events that may publish onto a channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Publisher {
    /// Periodic timer reached its period.
    PacerTick,
    /// Event counter reached its threshold.
    CounterThreshold,
}

/// Tasks that may subscribe to a channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Subscriber {
    /// Flip the output pin.
    OutputToggle,
    /// Increment the event counter.
    CounterIncrement,
    /// Stop the periodic timer.
    PacerStop,
    /// Stop the event counter.
    CounterStop,
}

/// One publisher-to-subscriber route carried on a channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelBinding {
    pub publisher: Publisher,
    pub subscriber: Subscriber,
    pub channel: ChannelId,
}

impl ChannelBinding {
    #[must_use]
    pub const fn new(publisher: Publisher, subscriber: Subscriber, channel: ChannelId) -> Self {
        Self {
            publisher,
            subscriber,
            channel,
        }
    }
}

/// Errors reported by an interconnect driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InterconnectError {
    /// Every channel in the pool is allocated.
    NoFreeChannel,
    /// The driver cannot hold another route.
    RouteTableFull,
    /// A publisher may only feed one channel at a time.
    PublisherBusy(Publisher),
}

impl fmt::Display for InterconnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterconnectError::NoFreeChannel => f.write_str("no free interconnect channel"),
            InterconnectError::RouteTableFull => f.write_str("interconnect route table full"),
            InterconnectError::PublisherBusy(publisher) => {
                write!(f, "publisher {publisher:?} already routed")
            }
        }
    }
}

/// Publish/subscribe routing fabric.
pub trait EventInterconnect {
    /// Reserves a channel from the pool.
    ///
    /// # Errors
    ///
    /// [`InterconnectError::NoFreeChannel`] when the pool is exhausted.
    fn allocate(&mut self) -> Result<ChannelId, InterconnectError>;

    /// Returns a channel to the pool. A no-op for channels not allocated.
    fn free(&mut self, channel: ChannelId);

    /// Connects `binding.publisher` to `binding.subscriber` through `binding.channel`.
    ///
    /// # Errors
    ///
    /// [`InterconnectError::PublisherBusy`] when the publisher already drives
    /// another channel, [`InterconnectError::RouteTableFull`] when no slot is
    /// left for the route.
    fn bind(&mut self, binding: ChannelBinding) -> Result<(), InterconnectError>;

    /// Removes the route between `publisher` and `subscriber`, if present.
    fn unbind(&mut self, publisher: Publisher, subscriber: Subscriber);

    /// Enables the listed channels. Already-enabled channels are left as is.
    fn enable(&mut self, channels: &[ChannelId]);

    /// Disables the listed channels. Already-disabled channels are left as is.
    fn disable(&mut self, channels: &[ChannelId]);
}

/// Maximum number of distinct channels a route plan may use.
pub const MAX_LANES: usize = 2;

/// Maximum number of bindings a route plan may contain.
pub const MAX_ROUTES: usize = 4;

/// Logical channel slot inside a [`RoutePlan`]; each lane maps to one
/// allocated [`ChannelId`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Lane(pub u8);

/// Route description independent of concrete channel numbers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RouteSpec {
    pub publisher: Publisher,
    pub subscriber: Subscriber,
    pub lane: Lane,
}

impl RouteSpec {
    #[must_use]
    pub const fn new(publisher: Publisher, subscriber: Subscriber, lane: Lane) -> Self {
        Self {
            publisher,
            subscriber,
            lane,
        }
    }
}

/// Static wiring graph for a sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RoutePlan {
    pub lanes: u8,
    pub routes: &'static [RouteSpec],
}

/// Lane carrying the pacer tick to the output and the counter.
pub const TICK_LANE: Lane = Lane(0);

/// Lane carrying the counter threshold to both stop tasks.
pub const STOP_LANE: Lane = Lane(1);

/// Two-timer chain: every pacer tick toggles the output and increments the
/// counter on the same channel; the counter threshold stops both timers.
pub const TOGGLE_CHAIN: RoutePlan = RoutePlan {
    lanes: 2,
    routes: &[
        RouteSpec::new(Publisher::PacerTick, Subscriber::OutputToggle, TICK_LANE),
        RouteSpec::new(Publisher::PacerTick, Subscriber::CounterIncrement, TICK_LANE),
        RouteSpec::new(Publisher::CounterThreshold, Subscriber::PacerStop, STOP_LANE),
        RouteSpec::new(Publisher::CounterThreshold, Subscriber::CounterStop, STOP_LANE),
    ],
};

/// Channels and bindings currently owned by a sequence.
#[derive(Clone, Debug, Default)]
pub struct RouteSet {
    channels: Vec<ChannelId, MAX_LANES>,
    bindings: Vec<ChannelBinding, MAX_ROUTES>,
}

impl RouteSet {
    /// Creates an empty set that owns nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channels: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Allocates one channel per lane and binds every route in `plan`.
    ///
    /// On failure everything allocated or bound so far is released again, so
    /// the interconnect is left exactly as it was found.
    ///
    /// # Errors
    ///
    /// Returns the first [`InterconnectError`] raised while allocating or
    /// binding.
    pub fn build<I>(interconnect: &mut I, plan: &RoutePlan) -> Result<Self, InterconnectError>
    where
        I: EventInterconnect + ?Sized,
    {
        let mut set = Self::new();
        if let Err(err) = set.populate(interconnect, plan) {
            set.teardown(interconnect);
            return Err(err);
        }
        Ok(set)
    }

    fn populate<I>(
        &mut self,
        interconnect: &mut I,
        plan: &RoutePlan,
    ) -> Result<(), InterconnectError>
    where
        I: EventInterconnect + ?Sized,
    {
        for _ in 0..plan.lanes {
            let channel = interconnect.allocate()?;
            if self.channels.push(channel).is_err() {
                interconnect.free(channel);
                return Err(InterconnectError::RouteTableFull);
            }
        }

        for spec in plan.routes {
            let channel = self
                .channel(spec.lane)
                .ok_or(InterconnectError::RouteTableFull)?;
            let binding = ChannelBinding::new(spec.publisher, spec.subscriber, channel);
            interconnect.bind(binding)?;
            if self.bindings.push(binding).is_err() {
                interconnect.unbind(binding.publisher, binding.subscriber);
                return Err(InterconnectError::RouteTableFull);
            }
        }

        Ok(())
    }

    /// Returns the channel assigned to `lane`, if allocated.
    #[must_use]
    pub fn channel(&self, lane: Lane) -> Option<ChannelId> {
        self.channels.get(usize::from(lane.0)).copied()
    }

    /// Enables every owned channel.
    pub fn enable<I>(&self, interconnect: &mut I)
    where
        I: EventInterconnect + ?Sized,
    {
        interconnect.enable(&self.channels);
    }

    /// Disables, unbinds, and frees everything owned by the set.
    ///
    /// Disable and unbind always happen together; calling this on an empty
    /// set is a no-op.
    pub fn teardown<I>(&mut self, interconnect: &mut I)
    where
        I: EventInterconnect + ?Sized,
    {
        interconnect.disable(&self.channels);
        for binding in self.bindings.iter().rev() {
            interconnect.unbind(binding.publisher, binding.subscriber);
        }
        for channel in &self.channels {
            interconnect.free(*channel);
        }
        self.bindings.clear();
        self.channels.clear();
    }

    /// Returns `true` when `channel` belongs to this set.
    #[must_use]
    pub fn owns(&self, channel: ChannelId) -> bool {
        self.channels.contains(&channel)
    }

    /// Channels owned by the set.
    #[must_use]
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    /// Bindings owned by the set.
    #[must_use]
    pub fn bindings(&self) -> &[ChannelBinding] {
        &self.bindings
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimInterconnect;

    #[test]
    fn toggle_chain_builds_two_lanes_and_four_routes() {
        let mut interconnect = SimInterconnect::new(4);
        let routes =
            RouteSet::build(&mut interconnect, &TOGGLE_CHAIN).expect("chain should build");

        assert_eq!(routes.channels().len(), 2);
        assert_eq!(routes.bindings().len(), 4);
        assert_eq!(interconnect.allocated_count(), 2);
        assert_eq!(interconnect.binding_count(), 4);

        let tick = routes.channel(TICK_LANE).expect("tick lane");
        let stop = routes.channel(STOP_LANE).expect("stop lane");
        assert_ne!(tick, stop);
        assert_eq!(
            interconnect.subscribers_of(Publisher::PacerTick).len(),
            2,
            "pacer tick fans out to toggle and count"
        );
    }

    #[test]
    fn build_rolls_back_when_pool_is_short() {
        let mut interconnect = SimInterconnect::new(1);
        let result = RouteSet::build(&mut interconnect, &TOGGLE_CHAIN);

        assert_eq!(result.err(), Some(InterconnectError::NoFreeChannel));
        assert_eq!(interconnect.allocated_count(), 0);
        assert_eq!(interconnect.binding_count(), 0);
    }

    #[test]
    fn teardown_releases_everything_and_is_repeatable() {
        let mut interconnect = SimInterconnect::new(4);
        let mut routes =
            RouteSet::build(&mut interconnect, &TOGGLE_CHAIN).expect("chain should build");
        routes.enable(&mut interconnect);
        assert_eq!(interconnect.enabled_count(), 2);

        routes.teardown(&mut interconnect);
        routes.teardown(&mut interconnect);

        assert!(routes.is_empty());
        assert_eq!(interconnect.enabled_count(), 0);
        assert_eq!(interconnect.binding_count(), 0);
        assert_eq!(interconnect.allocated_count(), 0);
    }
}
