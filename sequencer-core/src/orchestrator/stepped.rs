//! Software-stepped strategy: one compare interrupt per toggle.

use crate::config::{Repetition, SequenceConfig};
use crate::interconnect::ChannelId;
use crate::output::{Level, OutputActuator};
use crate::telemetry::{SpuriousReason, TelemetryRecorder};
use crate::time::{CompareId, OneShotTimer, Tick, deadline_after};

use super::{EventOutcome, HardwareEvent, Resource, SequenceState, Sequencer, SequencerError};

/// Peripherals owned by a [`SoftwareSteppedSequencer`].
pub struct SteppedResources<T, O> {
    pub timer: T,
    pub output: O,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum PendingKind {
    Toggle,
    CycleStart,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Pending {
    deadline: Tick,
    kind: PendingKind,
}

/// Drives the toggle burst from compare interrupts.
///
/// The compare channel is taken from the timer's shared pool on the first
/// successful arm and kept for the lifetime of the sequencer. Each deadline is
/// derived from the previous deadline rather than from the time the interrupt
/// was serviced, so interrupt latency never accumulates across a burst.
pub struct SoftwareSteppedSequencer<T, O> {
    resources: SteppedResources<T, O>,
    repetition: Repetition,
    channel: Option<CompareId>,
    config: SequenceConfig,
    state: SequenceState,
    remaining: u32,
    pending: Option<Pending>,
    cycle_started_at: Tick,
    telemetry: TelemetryRecorder,
}

impl<T, O> SoftwareSteppedSequencer<T, O>
where
    T: OneShotTimer,
    O: OutputActuator,
{
    #[must_use]
    pub fn new(resources: SteppedResources<T, O>, repetition: Repetition) -> Self {
        Self {
            resources,
            repetition,
            channel: None,
            config: SequenceConfig::DEFAULT,
            state: SequenceState::Idle,
            remaining: 0,
            pending: None,
            cycle_started_at: 0,
            telemetry: TelemetryRecorder::new(),
        }
    }

    #[must_use]
    pub fn repetition(&self) -> Repetition {
        self.repetition
    }

    /// Compare channel held by the sequencer, once allocated.
    #[must_use]
    pub fn compare_channel(&self) -> Option<CompareId> {
        self.channel
    }

    /// Deadline currently programmed on the compare channel.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Tick> {
        self.pending.map(|pending| pending.deadline)
    }

    /// Toggles still outstanding in the current burst.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn resources(&self) -> &SteppedResources<T, O> {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut SteppedResources<T, O> {
        &mut self.resources
    }

    fn reject(&mut self, error: SequencerError) -> Result<(), SequencerError> {
        let now = self.resources.timer.read();
        self.telemetry.record_arm_rejected(error, now);
        Err(error)
    }

    fn ensure_channel(&mut self) -> Option<CompareId> {
        if self.channel.is_none() {
            self.channel = self.resources.timer.allocate_channel();
        }
        self.channel
    }

    fn schedule(&mut self, channel: CompareId, deadline: Tick, kind: PendingKind) {
        self.resources.timer.schedule_at(channel, deadline);
        self.pending = Some(Pending { deadline, kind });
    }

    fn after(&self, base: Tick, delta: u64) -> Tick {
        deadline_after(base, delta, self.resources.timer.width_bits())
    }

    fn spurious(&mut self, reason: SpuriousReason) -> EventOutcome {
        let now = self.resources.timer.read();
        self.telemetry.record_spurious(reason, now);
        EventOutcome::Spurious
    }

    fn start_cycle(&mut self, channel: CompareId, deadline: Tick) -> EventOutcome {
        self.cycle_started_at = deadline;
        self.remaining = self.config.toggle_count;
        let first = self.after(deadline, self.config.toggle_interval_ticks);
        self.schedule(channel, first, PendingKind::Toggle);
        self.state = SequenceState::Armed;
        self.telemetry.record_cycle_started(deadline);
        EventOutcome::CycleStarted
    }

    fn step(&mut self, channel: CompareId, deadline: Tick) -> EventOutcome {
        self.resources.output.toggle_software();
        self.remaining = self.remaining.saturating_sub(1);
        self.telemetry.record_toggle(self.remaining, deadline);

        if self.remaining > 0 {
            let next = self.after(deadline, self.config.toggle_interval_ticks);
            self.schedule(channel, next, PendingKind::Toggle);
            self.state = SequenceState::Running {
                remaining: self.remaining,
            };
            return EventOutcome::Toggled {
                remaining: self.remaining,
            };
        }

        // Odd counts leave the pin high.
        self.resources.output.clear();
        self.state = SequenceState::Completing;
        self.telemetry.record_sequence_complete(deadline);

        match self.repetition {
            Repetition::Cyclic => {
                let next = self.after(self.cycle_started_at, self.config.cycle_interval_ticks);
                self.schedule(channel, next, PendingKind::CycleStart);
                self.state = SequenceState::Armed;
            }
            Repetition::OneShot => self.cleanup(),
        }

        EventOutcome::Completed
    }
}

impl<T, O> Sequencer for SoftwareSteppedSequencer<T, O>
where
    T: OneShotTimer,
    O: OutputActuator,
{
    fn arm(&mut self, config: &SequenceConfig) -> Result<(), SequencerError> {
        if let Err(err) = config.validate(self.repetition) {
            return self.reject(err.into());
        }

        if !self.state.is_idle() {
            self.cleanup();
        }

        let Some(channel) = self.ensure_channel() else {
            return self.reject(SequencerError::ResourceExhausted(Resource::CompareChannel));
        };

        self.resources.output.configure_output(Level::Low);
        self.config = *config;
        self.remaining = config.toggle_count;

        let now = self.resources.timer.read();
        self.cycle_started_at = now;
        let first = self.after(now, config.toggle_interval_ticks);
        self.schedule(channel, first, PendingKind::Toggle);

        self.state = SequenceState::Armed;
        self.telemetry.record_armed(config.toggle_count, now);
        Ok(())
    }

    fn cleanup(&mut self) {
        let was_idle = self.state.is_idle();

        if let Some(channel) = self.channel {
            self.resources.timer.cancel(channel);
        }
        self.pending = None;
        self.remaining = 0;
        self.resources.output.release();
        self.state = SequenceState::Idle;

        if !was_idle {
            let now = self.resources.timer.read();
            self.telemetry.record_cleanup(now);
        }
    }

    fn handle_event(&mut self, event: HardwareEvent) -> EventOutcome {
        let HardwareEvent::Compare { channel, deadline } = event else {
            return self.spurious(SpuriousReason::UnexpectedKind);
        };

        if !self.state.is_active() {
            return self.spurious(SpuriousReason::NotRunning);
        }
        if self.channel != Some(channel) {
            return self.spurious(SpuriousReason::ForeignChannel(channel));
        }
        let Some(pending) = self.pending else {
            return self.spurious(SpuriousReason::NotRunning);
        };
        if pending.deadline != deadline {
            return self.spurious(SpuriousReason::StaleDeadline {
                expected: pending.deadline,
                actual: deadline,
            });
        }

        self.pending = None;
        match pending.kind {
            PendingKind::CycleStart => self.start_cycle(channel, deadline),
            PendingKind::Toggle => self.step(channel, deadline),
        }
    }

    fn state(&self) -> SequenceState {
        self.state
    }

    fn owned_channels(&self) -> &[ChannelId] {
        &[]
    }

    fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::NoopOutput;
    use crate::sim::{SimCompareTimer, SimOutput};
    use crate::telemetry::TelemetryEventKind;

    fn sequencer(
        capacity: u8,
        repetition: Repetition,
    ) -> SoftwareSteppedSequencer<SimCompareTimer, SimOutput> {
        SoftwareSteppedSequencer::new(
            SteppedResources {
                timer: SimCompareTimer::new(capacity),
                output: SimOutput::new(),
            },
            repetition,
        )
    }

    fn fire(seq: &mut SoftwareSteppedSequencer<SimCompareTimer, SimOutput>) -> EventOutcome {
        let channel = seq.compare_channel().expect("channel allocated");
        let deadline = seq.next_deadline().expect("deadline pending");
        seq.resources_mut().timer.set_now(deadline);
        seq.handle_event(HardwareEvent::Compare { channel, deadline })
    }

    #[test]
    fn arm_programs_first_deadline() {
        let mut seq = sequencer(1, Repetition::OneShot);
        seq.resources_mut().timer.set_now(1_000);
        seq.arm(&SequenceConfig::new(10_000, 250, 4))
            .expect("arm succeeds");

        assert_eq!(seq.state(), SequenceState::Armed);
        assert_eq!(seq.next_deadline(), Some(1_250));
        assert_eq!(seq.resources().timer.pending_deadline(CompareId(0)), Some(1_250));
    }

    #[test]
    fn exhausted_compare_pool_leaves_idle_and_low() {
        let mut seq = sequencer(0, Repetition::OneShot);
        let result = seq.arm(&SequenceConfig::new(10_000, 250, 4));

        assert_eq!(
            result,
            Err(SequencerError::ResourceExhausted(Resource::CompareChannel))
        );
        assert_eq!(seq.state(), SequenceState::Idle);
        assert_eq!(seq.resources().output.level(), Level::Low);
        assert_eq!(
            seq.telemetry().latest().map(|record| record.event),
            Some(TelemetryEventKind::ArmRejected)
        );
    }

    #[test]
    fn odd_count_forces_low_and_one_shot_returns_idle() {
        let mut seq = sequencer(1, Repetition::OneShot);
        seq.arm(&SequenceConfig::new(10_000, 100, 3))
            .expect("arm succeeds");

        assert_eq!(fire(&mut seq), EventOutcome::Toggled { remaining: 2 });
        assert_eq!(seq.state(), SequenceState::Running { remaining: 2 });
        assert_eq!(fire(&mut seq), EventOutcome::Toggled { remaining: 1 });
        assert_eq!(fire(&mut seq), EventOutcome::Completed);

        assert_eq!(seq.state(), SequenceState::Idle);
        assert_eq!(seq.resources().output.level(), Level::Low);
        assert_eq!(seq.resources().output.toggle_count(), 3);
        assert_eq!(seq.next_deadline(), None);
    }

    #[test]
    fn cyclic_schedules_next_cycle_from_cycle_start() {
        let mut seq = sequencer(1, Repetition::Cyclic);
        seq.arm(&SequenceConfig::new(1_000, 100, 2))
            .expect("arm succeeds");

        fire(&mut seq);
        assert_eq!(fire(&mut seq), EventOutcome::Completed);
        assert_eq!(seq.state(), SequenceState::Armed);
        assert_eq!(seq.next_deadline(), Some(1_000));

        assert_eq!(fire(&mut seq), EventOutcome::CycleStarted);
        assert_eq!(seq.next_deadline(), Some(1_100));
        assert_eq!(seq.remaining(), 2);
    }

    #[test]
    fn stale_and_foreign_compares_are_spurious() {
        let mut seq = sequencer(2, Repetition::OneShot);
        seq.arm(&SequenceConfig::new(10_000, 100, 3))
            .expect("arm succeeds");
        let channel = seq.compare_channel().expect("channel allocated");

        assert_eq!(
            seq.handle_event(HardwareEvent::Compare {
                channel,
                deadline: 999
            }),
            EventOutcome::Spurious
        );
        assert_eq!(
            seq.handle_event(HardwareEvent::Compare {
                channel: CompareId(7),
                deadline: 100
            }),
            EventOutcome::Spurious
        );
        assert_eq!(seq.handle_event(HardwareEvent::Completion), EventOutcome::Spurious);
        assert_eq!(seq.state(), SequenceState::Armed);
        assert_eq!(seq.resources().output.toggle_count(), 0);
    }

    #[test]
    fn channel_is_kept_across_rearm() {
        let mut seq = sequencer(1, Repetition::OneShot);
        seq.arm(&SequenceConfig::new(10_000, 100, 3))
            .expect("first arm");
        let first = seq.compare_channel();
        seq.arm(&SequenceConfig::new(10_000, 100, 3))
            .expect("re-arm reuses the channel even with an empty pool");

        assert_eq!(seq.compare_channel(), first);
    }

    #[test]
    fn noop_output_drives_a_full_burst() {
        let mut seq = SoftwareSteppedSequencer::new(
            SteppedResources {
                timer: SimCompareTimer::new(1),
                output: NoopOutput::new(),
            },
            Repetition::OneShot,
        );
        seq.arm(&SequenceConfig::new(10_000, 10, 1))
            .expect("arm succeeds");

        let channel = seq.compare_channel().expect("channel allocated");
        let deadline = seq.next_deadline().expect("deadline pending");
        assert_eq!(
            seq.handle_event(HardwareEvent::Compare { channel, deadline }),
            EventOutcome::Completed
        );
        assert_eq!(seq.resources().output.level(), Level::Low);
        assert_eq!(seq.state(), SequenceState::Idle);
    }
}
