#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Atomics mirror the sequencer state after every locked operation so the
//! status LED task can poll without contending for the orchestrator lock.

use portable_atomic::{AtomicU32, AtomicU8, Ordering};
use sequencer_core::orchestrator::{EventOutcome, SequenceState, SequencerError};

const STATE_IDLE: u8 = 0;
const STATE_ARMED: u8 = 1;
const STATE_RUNNING: u8 = 2;
const STATE_COMPLETING: u8 = 3;

static STATE: AtomicU8 = AtomicU8::new(STATE_IDLE);
/// Toggles outstanding as last seen by software.
static REMAINING: AtomicU32 = AtomicU32::new(0);
static COMPLETED_BURSTS: AtomicU32 = AtomicU32::new(0);
static REJECTED_ARMS: AtomicU32 = AtomicU32::new(0);
static SPURIOUS_EVENTS: AtomicU32 = AtomicU32::new(0);

/// Coarse sequencer phase without the per-burst counter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    Idle,
    Armed,
    Running,
    Completing,
}

/// Point-in-time copy of the status counters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub remaining: u32,
    pub completed_bursts: u32,
    pub rejected_arms: u32,
    pub spurious_events: u32,
}

fn encode_state(state: SequenceState) -> (u8, u32) {
    match state {
        SequenceState::Idle => (STATE_IDLE, 0),
        SequenceState::Armed => (STATE_ARMED, 0),
        SequenceState::Running { remaining } => (STATE_RUNNING, remaining),
        SequenceState::Completing => (STATE_COMPLETING, 0),
    }
}

fn decode_phase(raw: u8) -> Phase {
    match raw {
        STATE_ARMED => Phase::Armed,
        STATE_RUNNING => Phase::Running,
        STATE_COMPLETING => Phase::Completing,
        _ => Phase::Idle,
    }
}

/// Publishes the sequencer state.
pub fn record_state(state: SequenceState) {
    let (raw, remaining) = encode_state(state);
    STATE.store(raw, Ordering::Relaxed);
    REMAINING.store(remaining, Ordering::Relaxed);
}

/// Counts completions and spurious events.
pub fn record_outcome(outcome: EventOutcome) {
    match outcome {
        EventOutcome::Completed => {
            COMPLETED_BURSTS.fetch_add(1, Ordering::Relaxed);
        }
        EventOutcome::Spurious => {
            SPURIOUS_EVENTS.fetch_add(1, Ordering::Relaxed);
        }
        EventOutcome::Toggled { .. } | EventOutcome::CycleStarted => {}
    }
}

pub fn record_rejected_arm() {
    REJECTED_ARMS.fetch_add(1, Ordering::Relaxed);
}

/// Books the result of a trigger and returns whether it should be
/// acknowledged. `None` means no controller was installed to take it.
pub fn record_arm(result: Option<Result<(), SequencerError>>) -> bool {
    match result {
        Some(Ok(())) => true,
        Some(Err(_)) => {
            record_rejected_arm();
            false
        }
        None => false,
    }
}

/// Returns true while toggles are being emitted.
pub fn is_running() -> bool {
    decode_phase(STATE.load(Ordering::Relaxed)) == Phase::Running
}

pub fn snapshot() -> StatusSnapshot {
    StatusSnapshot {
        phase: decode_phase(STATE.load(Ordering::Relaxed)),
        remaining: REMAINING.load(Ordering::Relaxed),
        completed_bursts: COMPLETED_BURSTS.load(Ordering::Relaxed),
        rejected_arms: REJECTED_ARMS.load(Ordering::Relaxed),
        spurious_events: SPURIOUS_EVENTS.load(Ordering::Relaxed),
    }
}
