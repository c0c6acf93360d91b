//! Toggle-sequence orchestration.
//!
//! A [`Sequencer`] owns the hardware needed to produce exactly N toggles of one
//! output pin spaced by a fixed interval. Two strategies implement it:
//!
//! - [`SoftwareSteppedSequencer`] services one compare interrupt per toggle and
//!   reprograms the next deadline from the previous one.
//! - [`HardwareRoutedSequencer`] wires a pacer timer, an event counter, and the
//!   output's toggle task together through the event interconnect so the chain
//!   runs without the processor; only the completion interrupt reaches software.
//!
//! [`Orchestrator`] wraps either strategy with the pending configuration and the
//! trigger entry point used by wake-source collaborators.

pub mod routed;
pub mod stepped;

use core::fmt;

use crate::config::{ConfigError, SequenceConfig};
use crate::interconnect::ChannelId;
use crate::telemetry::TelemetryRecorder;
use crate::time::{CompareId, Tick};
use crate::trigger::TriggerSource;

pub use routed::{HardwareRoutedSequencer, RoutedResources};
pub use stepped::{SoftwareSteppedSequencer, SteppedResources};

/// Lifecycle of a toggle sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum SequenceState {
    /// No resources configured; pin low.
    #[default]
    Idle,
    /// Hardware programmed, first toggle not yet produced.
    Armed,
    /// Toggles in progress. `remaining` is the count outstanding; for the
    /// routed chain it is only current when read through
    /// [`Sequencer::sample_state`].
    Running { remaining: u32 },
    /// Final toggle produced; teardown or next-cycle scheduling in progress.
    Completing,
}

impl SequenceState {
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, SequenceState::Idle)
    }

    /// Returns `true` while the sequence accepts hardware events.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, SequenceState::Armed | SequenceState::Running { .. })
    }
}

impl fmt::Display for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceState::Idle => f.write_str("idle"),
            SequenceState::Armed => f.write_str("armed"),
            SequenceState::Running { remaining } => write!(f, "running ({remaining} remaining)"),
            SequenceState::Completing => f.write_str("completing"),
        }
    }
}

/// Hardware resource that ran out during `arm()`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Resource {
    CompareChannel,
    InterconnectChannel,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::CompareChannel => f.write_str("compare channel"),
            Resource::InterconnectChannel => f.write_str("interconnect channel"),
        }
    }
}

/// Errors returned by [`Sequencer::arm`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequencerError {
    ResourceExhausted(Resource),
    InvalidConfig(ConfigError),
}

impl fmt::Display for SequencerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerError::ResourceExhausted(resource) => write!(f, "no free {resource}"),
            SequencerError::InvalidConfig(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl From<ConfigError> for SequencerError {
    fn from(err: ConfigError) -> Self {
        SequencerError::InvalidConfig(err)
    }
}

/// Interrupt-level events delivered to a sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HardwareEvent {
    /// One-shot compare fired on `channel` for the programmed `deadline`.
    Compare { channel: CompareId, deadline: Tick },
    /// Event counter reached its threshold.
    Completion,
}

/// Result of feeding one [`HardwareEvent`] to a sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventOutcome {
    /// Pin flipped; `remaining` toggles still outstanding in this burst.
    Toggled { remaining: u32 },
    /// A new cycle epoch began; the first toggle is scheduled.
    CycleStarted,
    /// The burst finished and the pin is back at its inactive level.
    Completed,
    /// Event did not match the current state and was ignored.
    Spurious,
}

/// A toggle-sequence strategy.
pub trait Sequencer {
    /// Tears down any running sequence and configures a fresh one.
    ///
    /// An invalid `config` is rejected without touching the current state.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::InvalidConfig`] for a config that fails
    /// validation and [`SequencerError::ResourceExhausted`] when a compare or
    /// interconnect channel cannot be reserved.
    fn arm(&mut self, config: &SequenceConfig) -> Result<(), SequencerError>;

    /// Returns all hardware to a quiescent state. Idempotent.
    fn cleanup(&mut self);

    /// Advances the sequence in response to an interrupt-level event.
    fn handle_event(&mut self, event: HardwareEvent) -> EventOutcome;

    fn state(&self) -> SequenceState;

    /// Like [`Sequencer::state`], but refreshes any progress that only the
    /// hardware knows about before reporting.
    fn sample_state(&mut self) -> SequenceState {
        self.state()
    }

    /// Interconnect channels currently reserved by the sequencer.
    fn owned_channels(&self) -> &[ChannelId];

    fn telemetry(&self) -> &TelemetryRecorder;
}

/// Sequencer plus the configuration applied at the next arm.
pub struct Orchestrator<S> {
    sequencer: S,
    config: SequenceConfig,
    last_trigger: Option<TriggerSource>,
}

impl<S> Orchestrator<S>
where
    S: Sequencer,
{
    #[must_use]
    pub const fn new(sequencer: S, config: SequenceConfig) -> Self {
        Self {
            sequencer,
            config,
            last_trigger: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Replaces the pending configuration. A running sequence keeps the
    /// configuration it was armed with until the next trigger.
    pub fn set_config(&mut self, config: SequenceConfig) {
        self.config = config;
    }

    /// Arms a sequence with the pending configuration, restarting any sequence
    /// already in progress.
    ///
    /// # Errors
    ///
    /// Propagates the sequencer's [`Sequencer::arm`] error.
    pub fn trigger(&mut self, source: TriggerSource) -> Result<(), SequencerError> {
        self.last_trigger = Some(source);
        let config = self.config;
        self.sequencer.arm(&config)
    }

    pub fn handle_event(&mut self, event: HardwareEvent) -> EventOutcome {
        self.sequencer.handle_event(event)
    }

    pub fn cleanup(&mut self) {
        self.sequencer.cleanup();
    }

    #[must_use]
    pub fn state(&self) -> SequenceState {
        self.sequencer.state()
    }

    /// Current state with hardware-held progress folded in.
    pub fn sample_state(&mut self) -> SequenceState {
        self.sequencer.sample_state()
    }

    /// Source of the most recent trigger, for diagnostics.
    #[must_use]
    pub fn last_trigger(&self) -> Option<TriggerSource> {
        self.last_trigger
    }

    #[must_use]
    pub fn sequencer(&self) -> &S {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut S {
        &mut self.sequencer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Repetition;
    use crate::sim::{SimCompareTimer, SimOutput};

    fn orchestrator() -> Orchestrator<SoftwareSteppedSequencer<SimCompareTimer, SimOutput>> {
        let resources = SteppedResources {
            timer: SimCompareTimer::new(1),
            output: SimOutput::new(),
        };
        Orchestrator::new(
            SoftwareSteppedSequencer::new(resources, Repetition::OneShot),
            SequenceConfig::new(1_000, 100, 3),
        )
    }

    #[test]
    fn trigger_arms_with_pending_config() {
        let mut orchestrator = orchestrator();
        orchestrator
            .trigger(TriggerSource::Button)
            .expect("arm succeeds");

        assert_eq!(orchestrator.state(), SequenceState::Armed);
        assert_eq!(orchestrator.last_trigger(), Some(TriggerSource::Button));
    }

    #[test]
    fn config_change_applies_at_next_trigger() {
        let mut orchestrator = orchestrator();
        orchestrator
            .trigger(TriggerSource::Console)
            .expect("arm succeeds");
        orchestrator.set_config(SequenceConfig::new(1_000, 0, 3));

        assert_eq!(orchestrator.state(), SequenceState::Armed);
        assert_eq!(
            orchestrator.trigger(TriggerSource::Console),
            Err(SequencerError::InvalidConfig(ConfigError::ZeroToggleInterval))
        );
        assert_eq!(
            orchestrator.state(),
            SequenceState::Armed,
            "rejected config leaves the running sequence alone"
        );
    }

    #[test]
    fn errors_render_for_logs() {
        let mut text = heapless::String::<64>::new();
        core::fmt::write(
            &mut text,
            format_args!(
                "{}",
                SequencerError::ResourceExhausted(Resource::InterconnectChannel)
            ),
        )
        .expect("fits");
        assert_eq!(text.as_str(), "no free interconnect channel");
    }
}
