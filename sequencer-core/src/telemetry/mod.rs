//! Telemetry event catalog and the fixed-size recorder owned by each sequencer.
//!
//! Every state change a sequencer makes is written into a `HistoryBuf` ring so
//! host tooling and firmware logs can reconstruct what happened after the fact.
//! Event kinds encode to compact numeric codes for transport over diagnostics
//! channels; payloads carry the per-event metadata.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::orchestrator::SequencerError;
use crate::time::{CompareId, Tick};

/// Monotonic identifier assigned to each telemetry record.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events emitted by the sequencers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    Armed,
    CycleStarted,
    Toggled,
    SequenceComplete,
    CleanedUp,
    ArmRejected,
    SpuriousEvent,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::Armed => f.write_str("armed"),
            TelemetryEventKind::CycleStarted => f.write_str("cycle-started"),
            TelemetryEventKind::Toggled => f.write_str("toggled"),
            TelemetryEventKind::SequenceComplete => f.write_str("sequence-complete"),
            TelemetryEventKind::CleanedUp => f.write_str("cleaned-up"),
            TelemetryEventKind::ArmRejected => f.write_str("arm-rejected"),
            TelemetryEventKind::SpuriousEvent => f.write_str("spurious-event"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const ARMED_CODE: u16 = 0x0001;
    const CYCLE_STARTED_CODE: u16 = 0x0002;
    const TOGGLED_CODE: u16 = 0x0003;
    const SEQUENCE_COMPLETE_CODE: u16 = 0x0004;
    const CLEANED_UP_CODE: u16 = 0x0005;
    const ARM_REJECTED_CODE: u16 = 0x0010;
    const SPURIOUS_EVENT_CODE: u16 = 0x0011;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::Armed => Self::ARMED_CODE,
            TelemetryEventKind::CycleStarted => Self::CYCLE_STARTED_CODE,
            TelemetryEventKind::Toggled => Self::TOGGLED_CODE,
            TelemetryEventKind::SequenceComplete => Self::SEQUENCE_COMPLETE_CODE,
            TelemetryEventKind::CleanedUp => Self::CLEANED_UP_CODE,
            TelemetryEventKind::ArmRejected => Self::ARM_REJECTED_CODE,
            TelemetryEventKind::SpuriousEvent => Self::SPURIOUS_EVENT_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub const fn from_raw(code: u16) -> Self {
        match code {
            Self::ARMED_CODE => TelemetryEventKind::Armed,
            Self::CYCLE_STARTED_CODE => TelemetryEventKind::CycleStarted,
            Self::TOGGLED_CODE => TelemetryEventKind::Toggled,
            Self::SEQUENCE_COMPLETE_CODE => TelemetryEventKind::SequenceComplete,
            Self::CLEANED_UP_CODE => TelemetryEventKind::CleanedUp,
            Self::ARM_REJECTED_CODE => TelemetryEventKind::ArmRejected,
            Self::SPURIOUS_EVENT_CODE => TelemetryEventKind::SpuriousEvent,
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Why an incoming hardware event was ignored.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpuriousReason {
    /// Event arrived while the sequencer was idle or completing.
    NotRunning,
    /// Compare fired on a channel the sequencer does not own.
    ForeignChannel(CompareId),
    /// Compare deadline does not match the one currently programmed.
    StaleDeadline { expected: Tick, actual: Tick },
    /// Event type does not belong to this sequencer strategy.
    UnexpectedKind,
}

impl fmt::Display for SpuriousReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpuriousReason::NotRunning => f.write_str("not running"),
            SpuriousReason::ForeignChannel(channel) => {
                write!(f, "foreign compare channel {}", channel.0)
            }
            SpuriousReason::StaleDeadline { expected, actual } => {
                write!(f, "stale deadline {actual} (expected {expected})")
            }
            SpuriousReason::UnexpectedKind => f.write_str("unexpected event kind"),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryPayload {
    None,
    /// Toggle count captured at arm time.
    ToggleCount(u32),
    /// Toggles still outstanding after a step.
    Remaining(u32),
    Rejected(SequencerError),
    Spurious(SpuriousReason),
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::ToggleCount(count) => write!(f, "count={count}"),
            TelemetryPayload::Remaining(remaining) => write!(f, "remaining={remaining}"),
            TelemetryPayload::Rejected(err) => write!(f, "{err}"),
            TelemetryPayload::Spurious(reason) => write!(f, "{reason}"),
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp: Tick,
    /// Arm generation the event belongs to; bumps on every successful arm.
    pub generation: u32,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} t={} gen={} {}",
            self.id, self.timestamp, self.generation, self.event
        )?;
        match self.details {
            TelemetryPayload::None => Ok(()),
            details => write!(f, " {details}"),
        }
    }
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
    generation: u32,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
            generation: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    #[must_use]
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Current arm generation.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Counts records of `kind` belonging to the current generation.
    #[must_use]
    pub fn count_in_generation(&self, kind: TelemetryEventKind) -> usize {
        self.ring
            .oldest_ordered()
            .filter(|record| record.generation == self.generation && record.event == kind)
            .count()
    }

    /// Starts a new generation and records the arm.
    pub fn record_armed(&mut self, toggle_count: u32, timestamp: Tick) -> EventId {
        self.generation = self.generation.wrapping_add(1);
        self.record(
            TelemetryEventKind::Armed,
            TelemetryPayload::ToggleCount(toggle_count),
            timestamp,
        )
    }

    pub fn record_cycle_started(&mut self, timestamp: Tick) -> EventId {
        self.record(TelemetryEventKind::CycleStarted, TelemetryPayload::None, timestamp)
    }

    pub fn record_toggle(&mut self, remaining: u32, timestamp: Tick) -> EventId {
        self.record(
            TelemetryEventKind::Toggled,
            TelemetryPayload::Remaining(remaining),
            timestamp,
        )
    }

    pub fn record_sequence_complete(&mut self, timestamp: Tick) -> EventId {
        self.record(TelemetryEventKind::SequenceComplete, TelemetryPayload::None, timestamp)
    }

    pub fn record_cleanup(&mut self, timestamp: Tick) -> EventId {
        self.record(TelemetryEventKind::CleanedUp, TelemetryPayload::None, timestamp)
    }

    pub fn record_arm_rejected(&mut self, error: SequencerError, timestamp: Tick) -> EventId {
        self.record(
            TelemetryEventKind::ArmRejected,
            TelemetryPayload::Rejected(error),
            timestamp,
        )
    }

    pub fn record_spurious(&mut self, reason: SpuriousReason, timestamp: Tick) -> EventId {
        self.record(
            TelemetryEventKind::SpuriousEvent,
            TelemetryPayload::Spurious(reason),
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        details: TelemetryPayload,
        timestamp: Tick,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            generation: self.generation,
            event,
            details,
        });

        id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn raw_codes_decode_back_to_the_same_kind() {
        for kind in [
            TelemetryEventKind::Armed,
            TelemetryEventKind::Toggled,
            TelemetryEventKind::SpuriousEvent,
        ] {
            assert_eq!(TelemetryEventKind::from_raw(kind.to_raw()), kind);
        }
        assert_eq!(
            TelemetryEventKind::from_raw(0x7FFF),
            TelemetryEventKind::Custom(0x7FFF)
        );
    }

    #[test]
    fn generation_advances_only_on_arm() {
        let mut recorder: TelemetryRecorder<8> = TelemetryRecorder::new();
        recorder.record_cleanup(0);
        assert_eq!(recorder.generation(), 0);

        recorder.record_armed(6, 10);
        recorder.record_toggle(5, 20);
        recorder.record_toggle(4, 30);
        assert_eq!(recorder.generation(), 1);
        assert_eq!(recorder.count_in_generation(TelemetryEventKind::Toggled), 2);

        recorder.record_armed(6, 40);
        assert_eq!(recorder.count_in_generation(TelemetryEventKind::Toggled), 0);
    }

    #[test]
    fn ring_keeps_newest_records_when_full() {
        let mut recorder: TelemetryRecorder<4> = TelemetryRecorder::new();
        for tick in 0..6 {
            recorder.record_toggle(0, tick);
        }

        assert_eq!(recorder.len(), 4);
        let first = recorder.oldest_first().next().expect("ring is not empty");
        assert_eq!(first.id, 2);
        assert_eq!(recorder.latest().map(|record| record.timestamp), Some(5));
    }

    #[test]
    fn rejected_arm_formats_its_cause() {
        let mut recorder: TelemetryRecorder<4> = TelemetryRecorder::new();
        recorder.record_arm_rejected(
            SequencerError::InvalidConfig(ConfigError::ZeroToggleCount),
            7,
        );

        let record = recorder.latest().expect("record present");
        assert_eq!(record.event, TelemetryEventKind::ArmRejected);
        let mut text = heapless::String::<96>::new();
        core::fmt::write(&mut text, format_args!("{record}")).expect("fits");
        assert!(text.contains("arm-rejected"));
        assert!(text.contains("toggle count"));
    }
}
