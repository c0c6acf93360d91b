//! Test benches pairing an [`Orchestrator`] with simulated hardware.
//!
//! A bench owns the only notion of time in the simulation. `advance` walks
//! forward event by event, delivering compare interrupts (stepped) or
//! propagating pacer ticks through the enabled routes (routed) exactly as the
//! hardware would, and hands every software-visible outcome to an observer.

use heapless::Vec;

use crate::config::{Repetition, SequenceConfig};
use crate::interconnect::{Publisher, Subscriber};
use crate::orchestrator::{
    EventOutcome, HardwareEvent, HardwareRoutedSequencer, Orchestrator, RoutedResources, Sequencer,
    SequencerError, SoftwareSteppedSequencer, SteppedResources,
};
use crate::time::{CompareId, EventCounter, PeriodicTimer, Tick};
use crate::trigger::TriggerSource;

use super::{SimClock, SimCompareTimer, SimCounter, SimInterconnect, SimOutput, SimPacer};

pub type SimStepped = SoftwareSteppedSequencer<SimCompareTimer, SimOutput>;
pub type SimRouted =
    HardwareRoutedSequencer<SimClock, SimPacer, SimCounter, SimOutput, SimInterconnect>;

/// Common surface of the simulation benches.
pub trait Bench {
    type Sequencer: Sequencer;

    /// Absolute simulated time.
    fn now(&self) -> u64;

    fn orchestrator(&self) -> &Orchestrator<Self::Sequencer>;

    fn orchestrator_mut(&mut self) -> &mut Orchestrator<Self::Sequencer>;

    fn output(&self) -> &SimOutput;

    fn output_mut(&mut self) -> &mut SimOutput;

    /// Runs simulated time forward by `ticks`, reporting each outcome.
    fn advance_with(&mut self, ticks: u64, observer: &mut dyn FnMut(u64, EventOutcome));

    fn advance(&mut self, ticks: u64) {
        self.advance_with(ticks, &mut |_, _| {});
    }

    /// Delivers a trigger at the current time.
    ///
    /// # Errors
    ///
    /// Propagates the orchestrator's arm error.
    fn trigger(&mut self, source: TriggerSource) -> Result<(), SequencerError> {
        let now = self.now();
        self.output_mut().set_time(now);
        self.orchestrator_mut().trigger(source)
    }

    fn cleanup(&mut self) {
        let now = self.now();
        self.output_mut().set_time(now);
        self.orchestrator_mut().cleanup();
    }
}

/// Software-stepped sequencer on a simulated compare timer.
pub struct SteppedBench {
    orchestrator: Orchestrator<SimStepped>,
}

impl SteppedBench {
    /// Bench with a single compare channel on a 64-bit counter.
    #[must_use]
    pub fn new(config: SequenceConfig, repetition: Repetition) -> Self {
        Self::with_timer(SimCompareTimer::new(1), config, repetition)
    }

    #[must_use]
    pub fn with_timer(
        timer: SimCompareTimer,
        config: SequenceConfig,
        repetition: Repetition,
    ) -> Self {
        let sequencer = SoftwareSteppedSequencer::new(
            SteppedResources {
                timer,
                output: SimOutput::new(),
            },
            repetition,
        );
        Self {
            orchestrator: Orchestrator::new(sequencer, config),
        }
    }

    #[must_use]
    pub fn sequencer(&self) -> &SimStepped {
        self.orchestrator.sequencer()
    }

    /// Delivers a compare event directly, bypassing the timer model.
    pub fn inject(&mut self, channel: CompareId, deadline: Tick) -> EventOutcome {
        self.orchestrator
            .handle_event(HardwareEvent::Compare { channel, deadline })
    }
}

impl Bench for SteppedBench {
    type Sequencer = SimStepped;

    fn now(&self) -> u64 {
        self.orchestrator.sequencer().resources().timer.now()
    }

    fn orchestrator(&self) -> &Orchestrator<SimStepped> {
        &self.orchestrator
    }

    fn orchestrator_mut(&mut self) -> &mut Orchestrator<SimStepped> {
        &mut self.orchestrator
    }

    fn output(&self) -> &SimOutput {
        &self.orchestrator.sequencer().resources().output
    }

    fn output_mut(&mut self) -> &mut SimOutput {
        &mut self.orchestrator.sequencer_mut().resources_mut().output
    }

    fn advance_with(&mut self, ticks: u64, observer: &mut dyn FnMut(u64, EventOutcome)) {
        let target = self.now().saturating_add(ticks);

        loop {
            let resources = self.orchestrator.sequencer_mut().resources_mut();
            let Some((channel, deadline)) = resources.timer.take_next_due(target) else {
                break;
            };
            let at = resources.timer.now();
            resources.output.set_time(at);

            let outcome = self
                .orchestrator
                .handle_event(HardwareEvent::Compare { channel, deadline });
            observer(at, outcome);
        }

        let resources = self.orchestrator.sequencer_mut().resources_mut();
        resources.timer.set_now(target);
        resources.output.set_time(target);
    }
}

/// Hardware-routed sequencer on a simulated interconnect fabric.
pub struct RoutedBench {
    orchestrator: Orchestrator<SimRouted>,
}

impl RoutedBench {
    /// Bench with a four-channel interconnect pool.
    #[must_use]
    pub fn new(config: SequenceConfig) -> Self {
        Self::with_pool(4, config)
    }

    #[must_use]
    pub fn with_pool(channels: u8, config: SequenceConfig) -> Self {
        let sequencer = HardwareRoutedSequencer::new(RoutedResources {
            clock: SimClock::new(),
            pacer: SimPacer::new(),
            counter: SimCounter::new(),
            output: SimOutput::new(),
            interconnect: SimInterconnect::new(channels),
        });
        Self {
            orchestrator: Orchestrator::new(sequencer, config),
        }
    }

    #[must_use]
    pub fn sequencer(&self) -> &SimRouted {
        self.orchestrator.sequencer()
    }

    pub fn sequencer_mut(&mut self) -> &mut SimRouted {
        self.orchestrator.sequencer_mut()
    }

    /// Propagates one pacer tick through the enabled routes. Returns `true`
    /// when the completion interrupt is raised.
    fn propagate_tick(&mut self) -> bool {
        let resources = self.orchestrator.sequencer_mut().resources_mut();
        let mut queue: Vec<Publisher, 4> = Vec::new();
        let _ = queue.push(Publisher::PacerTick);
        let mut interrupt = false;

        while let Some(publisher) = queue.pop() {
            for subscriber in resources.interconnect.routed_subscribers(publisher) {
                match subscriber {
                    Subscriber::OutputToggle => resources.output.hardware_toggle(),
                    Subscriber::CounterIncrement => {
                        if resources.counter.increment() {
                            interrupt |= resources.counter.interrupt_enabled();
                            let _ = queue.push(Publisher::CounterThreshold);
                        }
                    }
                    Subscriber::PacerStop => resources.pacer.stop(),
                    Subscriber::CounterStop => resources.counter.stop(),
                }
            }
        }

        interrupt
    }
}

impl Bench for RoutedBench {
    type Sequencer = SimRouted;

    fn now(&self) -> u64 {
        self.orchestrator.sequencer().resources().clock.now()
    }

    fn orchestrator(&self) -> &Orchestrator<SimRouted> {
        &self.orchestrator
    }

    fn orchestrator_mut(&mut self) -> &mut Orchestrator<SimRouted> {
        &mut self.orchestrator
    }

    fn output(&self) -> &SimOutput {
        &self.orchestrator.sequencer().resources().output
    }

    fn output_mut(&mut self) -> &mut SimOutput {
        &mut self.orchestrator.sequencer_mut().resources_mut().output
    }

    fn advance_with(&mut self, ticks: u64, observer: &mut dyn FnMut(u64, EventOutcome)) {
        let target = self.now().saturating_add(ticks);

        loop {
            let resources = self.orchestrator.sequencer_mut().resources_mut();
            let Some(wait) = resources.pacer.ticks_to_next() else {
                break;
            };
            let at = resources.clock.now().saturating_add(wait);
            if at > target {
                break;
            }
            resources.clock.set_now(at);
            resources.output.set_time(at);
            if !resources.pacer.elapse(wait) {
                continue;
            }

            if self.propagate_tick() {
                let outcome = self.orchestrator.handle_event(HardwareEvent::Completion);
                observer(at, outcome);
            }
        }

        let resources = self.orchestrator.sequencer_mut().resources_mut();
        let remaining = ticks_until(resources.clock.now(), target);
        resources.pacer.elapse(remaining);
        resources.clock.set_now(target);
        resources.output.set_time(target);
    }
}

fn ticks_until(now: u64, target: u64) -> u64 {
    target.saturating_sub(now)
}
