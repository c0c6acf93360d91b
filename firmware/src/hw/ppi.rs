//! PPI channels as the sequencer's event interconnect.
//!
//! Each PPI channel carries one event endpoint, one task endpoint and one fork
//! task endpoint, so a lane can fan a publisher out to at most two
//! subscribers. The channel's [`Ppi`] handle is rebuilt whenever its routes
//! change and dropped, which clears the endpoints, when the channel is freed.

use embassy_nrf::Peri;
use embassy_nrf::ppi::{AnyConfigurableChannel, Event, Ppi, Task};
use sequencer_core::interconnect::{
    ChannelBinding, ChannelId, EventInterconnect, InterconnectError, Publisher, Subscriber,
};

use super::output::GpioteOutput;
use super::timer::{TimerCounter, TimerPacer};
use super::{PPI_POOL_SIZE, PPI_POOL_START};

const SUBSCRIBERS_PER_CHANNEL: usize = 2;

/// Hardware event and task endpoints the fabric can route between.
#[derive(Copy, Clone)]
pub struct Endpoints {
    pub pacer_tick: Event<'static>,
    pub counter_threshold: Event<'static>,
    pub output_toggle: Task<'static>,
    pub counter_increment: Task<'static>,
    pub pacer_stop: Task<'static>,
    pub counter_stop: Task<'static>,
}

impl Endpoints {
    pub fn new(pacer: &TimerPacer, counter: &TimerCounter, output: &GpioteOutput) -> Self {
        Self {
            pacer_tick: pacer.tick_event(),
            counter_threshold: counter.threshold_event(),
            output_toggle: output.toggle_task(),
            counter_increment: counter.count_task(),
            pacer_stop: pacer.stop_task(),
            counter_stop: counter.stop_task(),
        }
    }

    fn event(&self, publisher: Publisher) -> Event<'static> {
        match publisher {
            Publisher::PacerTick => self.pacer_tick,
            Publisher::CounterThreshold => self.counter_threshold,
        }
    }

    fn task(&self, subscriber: Subscriber) -> Task<'static> {
        match subscriber {
            Subscriber::OutputToggle => self.output_toggle,
            Subscriber::CounterIncrement => self.counter_increment,
            Subscriber::PacerStop => self.pacer_stop,
            Subscriber::CounterStop => self.counter_stop,
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct ChannelRoutes {
    publisher: Option<Publisher>,
    subscribers: [Option<Subscriber>; SUBSCRIBERS_PER_CHANNEL],
}

/// Programmed PPI channel, with or without the fork endpoint.
enum Wiring {
    Single(Ppi<'static, AnyConfigurableChannel, 1, 1>),
    Forked(Ppi<'static, AnyConfigurableChannel, 1, 2>),
}

impl Wiring {
    fn enable(&mut self) {
        match self {
            Wiring::Single(ppi) => ppi.enable(),
            Wiring::Forked(ppi) => ppi.enable(),
        }
    }

    fn disable(&mut self) {
        match self {
            Wiring::Single(ppi) => ppi.disable(),
            Wiring::Forked(ppi) => ppi.disable(),
        }
    }
}

struct Slot {
    channel: Peri<'static, AnyConfigurableChannel>,
    routes: ChannelRoutes,
    wiring: Option<Wiring>,
    allocated: bool,
    enabled: bool,
}

/// Contiguous block of PPI channels reserved for the sequencer.
pub struct PpiFabric {
    slots: [Slot; PPI_POOL_SIZE],
    endpoints: Endpoints,
}

impl PpiFabric {
    /// Takes ownership of the pooled channels, numbered from
    /// [`PPI_POOL_START`].
    pub fn new(
        channels: [Peri<'static, AnyConfigurableChannel>; PPI_POOL_SIZE],
        endpoints: Endpoints,
    ) -> Self {
        Self {
            slots: channels.map(|channel| Slot {
                channel,
                routes: ChannelRoutes::default(),
                wiring: None,
                allocated: false,
                enabled: false,
            }),
            endpoints,
        }
    }

    fn slot_index(channel: ChannelId) -> Option<usize> {
        let index = usize::from(channel.0.checked_sub(PPI_POOL_START)?);
        (index < PPI_POOL_SIZE).then_some(index)
    }

    /// Reprograms the channel behind `index` from its route table.
    fn rewire(&mut self, index: usize) {
        let endpoints = self.endpoints;
        let slot = &mut self.slots[index];
        // Dropping the previous handle disables the channel and clears its
        // endpoints before the new one is written.
        slot.wiring = None;

        let Some(publisher) = slot.routes.publisher else {
            return;
        };
        let event = endpoints.event(publisher);
        // SAFETY: at most one `Ppi` per slot is alive at a time; the previous
        // one was dropped above.
        let channel = unsafe { slot.channel.clone_unchecked() };
        let mut wiring = match slot.routes.subscribers {
            [Some(first), Some(second)] => Wiring::Forked(Ppi::new_one_to_two(
                channel,
                event,
                endpoints.task(first),
                endpoints.task(second),
            )),
            [Some(only), None] | [None, Some(only)] => {
                Wiring::Single(Ppi::new_one_to_one(channel, event, endpoints.task(only)))
            }
            [None, None] => return,
        };
        if slot.enabled {
            wiring.enable();
        }
        slot.wiring = Some(wiring);
    }

    fn set_enabled(&mut self, channels: &[ChannelId], enabled: bool) {
        for index in channels.iter().filter_map(|channel| Self::slot_index(*channel)) {
            let slot = &mut self.slots[index];
            if !slot.allocated {
                continue;
            }
            slot.enabled = enabled;
            if let Some(wiring) = slot.wiring.as_mut() {
                if enabled {
                    wiring.enable();
                } else {
                    wiring.disable();
                }
            }
        }
    }
}

impl EventInterconnect for PpiFabric {
    fn allocate(&mut self) -> Result<ChannelId, InterconnectError> {
        let (offset, slot) = (0u8..)
            .zip(self.slots.iter_mut())
            .find(|(_, slot)| !slot.allocated)
            .ok_or(InterconnectError::NoFreeChannel)?;
        slot.allocated = true;
        Ok(ChannelId(PPI_POOL_START + offset))
    }

    fn free(&mut self, channel: ChannelId) {
        let Some(index) = Self::slot_index(channel) else {
            return;
        };
        let slot = &mut self.slots[index];
        slot.wiring = None;
        slot.routes = ChannelRoutes::default();
        slot.allocated = false;
        slot.enabled = false;
    }

    fn bind(&mut self, binding: ChannelBinding) -> Result<(), InterconnectError> {
        let index = Self::slot_index(binding.channel)
            .filter(|index| self.slots[*index].allocated)
            .ok_or(InterconnectError::RouteTableFull)?;

        let busy = self.slots.iter().enumerate().any(|(other, slot)| {
            other != index && slot.routes.publisher == Some(binding.publisher)
        });
        if busy {
            return Err(InterconnectError::PublisherBusy(binding.publisher));
        }

        let mut routes = self.slots[index].routes;
        match routes.publisher {
            Some(publisher) if publisher != binding.publisher => {
                return Err(InterconnectError::RouteTableFull);
            }
            _ => routes.publisher = Some(binding.publisher),
        }
        let free = routes
            .subscribers
            .iter_mut()
            .find(|subscriber| subscriber.is_none())
            .ok_or(InterconnectError::RouteTableFull)?;
        *free = Some(binding.subscriber);

        self.slots[index].routes = routes;
        self.rewire(index);
        Ok(())
    }

    fn unbind(&mut self, publisher: Publisher, subscriber: Subscriber) {
        for index in 0..PPI_POOL_SIZE {
            let mut routes = self.slots[index].routes;
            if routes.publisher != Some(publisher) {
                continue;
            }
            for entry in &mut routes.subscribers {
                if *entry == Some(subscriber) {
                    *entry = None;
                }
            }
            if routes.subscribers.iter().all(Option::is_none) {
                routes.publisher = None;
            }
            self.slots[index].routes = routes;
            self.rewire(index);
        }
    }

    fn enable(&mut self, channels: &[ChannelId]) {
        self.set_enabled(channels, true);
    }

    fn disable(&mut self, channels: &[ChannelId]) {
        self.set_enabled(channels, false);
    }
}
