//! Hardware-routed strategy: the burst runs on the event interconnect.
//!
//! Wiring built per arm from [`TOGGLE_CHAIN`]:
//!
//! ```text
//! pacer tick ──┬─▶ output toggle        (tick lane)
//!              └─▶ counter increment
//! counter threshold ──┬─▶ pacer stop    (stop lane)
//!                     └─▶ counter stop
//! ```
//!
//! The counter only sees increments from the same channel event that toggles
//! the pin, so the threshold event lands after exactly N toggles. Its interrupt
//! is the only point where software runs during a sequence.

use crate::config::{Repetition, SequenceConfig};
use crate::interconnect::{ChannelId, EventInterconnect, RouteSet, TICK_LANE, TOGGLE_CHAIN};
use crate::output::{Level, OutputActuator};
use crate::telemetry::{SpuriousReason, TelemetryRecorder};
use crate::time::{Clock, EventCounter, PeriodicTimer};

use super::{EventOutcome, HardwareEvent, Resource, SequenceState, Sequencer, SequencerError};

/// Peripherals owned by a [`HardwareRoutedSequencer`].
pub struct RoutedResources<K, P, C, O, I> {
    /// Monotonic clock used for telemetry timestamps.
    pub clock: K,
    pub pacer: P,
    pub counter: C,
    pub output: O,
    pub interconnect: I,
}

/// One-shot burst per arm, driven entirely by routed hardware events.
pub struct HardwareRoutedSequencer<K, P, C, O, I> {
    resources: RoutedResources<K, P, C, O, I>,
    routes: RouteSet,
    config: SequenceConfig,
    state: SequenceState,
    telemetry: TelemetryRecorder,
}

impl<K, P, C, O, I> HardwareRoutedSequencer<K, P, C, O, I>
where
    K: Clock,
    P: PeriodicTimer,
    C: EventCounter,
    O: OutputActuator,
    I: EventInterconnect,
{
    #[must_use]
    pub fn new(resources: RoutedResources<K, P, C, O, I>) -> Self {
        Self {
            resources,
            routes: RouteSet::new(),
            config: SequenceConfig::DEFAULT,
            state: SequenceState::Idle,
            telemetry: TelemetryRecorder::new(),
        }
    }

    /// Toggles still outstanding, read back from the hardware counter.
    pub fn remaining(&mut self) -> u32 {
        if !self.state.is_active() {
            return 0;
        }
        self.config
            .toggle_count
            .saturating_sub(self.resources.counter.count())
    }

    /// Route graph currently wired for the sequence.
    #[must_use]
    pub fn routes(&self) -> &RouteSet {
        &self.routes
    }

    #[must_use]
    pub fn resources(&self) -> &RoutedResources<K, P, C, O, I> {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut RoutedResources<K, P, C, O, I> {
        &mut self.resources
    }

    fn reject(&mut self, error: SequencerError) -> Result<(), SequencerError> {
        let now = self.resources.clock.read();
        self.telemetry.record_arm_rejected(error, now);
        Err(error)
    }

    fn spurious(&mut self, reason: SpuriousReason) -> EventOutcome {
        let now = self.resources.clock.read();
        self.telemetry.record_spurious(reason, now);
        EventOutcome::Spurious
    }
}

impl<K, P, C, O, I> Sequencer for HardwareRoutedSequencer<K, P, C, O, I>
where
    K: Clock,
    P: PeriodicTimer,
    C: EventCounter,
    O: OutputActuator,
    I: EventInterconnect,
{
    fn arm(&mut self, config: &SequenceConfig) -> Result<(), SequencerError> {
        if let Err(err) = config.validate(Repetition::OneShot) {
            return self.reject(err.into());
        }

        if !self.state.is_idle() {
            self.cleanup();
        }

        let resources = &mut self.resources;
        resources.output.configure_output(Level::Low);

        let Ok(mut routes) = RouteSet::build(&mut resources.interconnect, &TOGGLE_CHAIN) else {
            resources.output.release();
            return self.reject(SequencerError::ResourceExhausted(
                Resource::InterconnectChannel,
            ));
        };
        let Some(tick) = routes.channel(TICK_LANE) else {
            routes.teardown(&mut resources.interconnect);
            resources.output.release();
            return self.reject(SequencerError::ResourceExhausted(
                Resource::InterconnectChannel,
            ));
        };

        resources.output.bind_toggle_task(tick);
        resources.counter.set_threshold(config.toggle_count);
        resources.counter.set_completion_interrupt(true);
        resources.counter.start();

        // Every binding is live before the first pacer tick can publish.
        routes.enable(&mut resources.interconnect);
        self.routes = routes;
        self.config = *config;
        self.state = SequenceState::Armed;
        let now = resources.clock.read();
        self.telemetry.record_armed(config.toggle_count, now);

        resources
            .pacer
            .start_periodic(config.toggle_interval_ticks);
        self.state = SequenceState::Running {
            remaining: config.toggle_count,
        };
        Ok(())
    }

    fn cleanup(&mut self) {
        let was_idle = self.state.is_idle();
        let resources = &mut self.resources;

        resources.pacer.stop();
        resources.counter.stop();
        resources.pacer.clear();
        resources.counter.clear();
        resources.counter.set_completion_interrupt(false);

        self.routes.teardown(&mut resources.interconnect);
        resources.output.release();
        resources.pacer.enter_low_power();
        self.state = SequenceState::Idle;

        if !was_idle {
            let now = resources.clock.read();
            self.telemetry.record_cleanup(now);
        }
    }

    fn handle_event(&mut self, event: HardwareEvent) -> EventOutcome {
        match event {
            HardwareEvent::Completion if self.state.is_active() => {
                self.state = SequenceState::Completing;
                let now = self.resources.clock.read();
                self.telemetry.record_sequence_complete(now);
                self.cleanup();
                EventOutcome::Completed
            }
            HardwareEvent::Completion => self.spurious(SpuriousReason::NotRunning),
            HardwareEvent::Compare { .. } => self.spurious(SpuriousReason::UnexpectedKind),
        }
    }

    fn state(&self) -> SequenceState {
        self.state
    }

    fn sample_state(&mut self) -> SequenceState {
        if let SequenceState::Running { .. } = self.state {
            self.state = SequenceState::Running {
                remaining: self.remaining(),
            };
        }
        self.state
    }

    fn owned_channels(&self) -> &[ChannelId] {
        self.routes.channels()
    }

    fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }
}
