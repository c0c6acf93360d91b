//! Mirrors sequencer telemetry to defmt on the MCU and stdout on the host.
//!
//! The sequencer keeps its own ring; this module only remembers how far it has
//! already logged so each record is emitted exactly once. Collection happens
//! under the orchestrator lock, emission happens after it is released.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use heapless::Vec;
use sequencer_core::telemetry::{EventId, TelemetryEventKind, TelemetryRecord, TelemetryRecorder};

/// Maximum number of records carried out of one locked section.
pub const TELEMETRY_BATCH: usize = 16;

pub type TelemetryBatch = Vec<TelemetryRecord, TELEMETRY_BATCH>;

/// Cursor into a [`TelemetryRecorder`].
#[derive(Debug, Default)]
pub struct TelemetryLog {
    next_id: EventId,
}

impl TelemetryLog {
    pub const fn new() -> Self {
        Self { next_id: 0 }
    }

    /// Copies every record not yet logged, oldest first.
    ///
    /// Records that fall out of the batch stay pending for the next call.
    pub fn collect_new(&mut self, recorder: &TelemetryRecorder) -> TelemetryBatch {
        let mut batch = TelemetryBatch::new();
        let start = self.next_id;
        for record in recorder.oldest_first().filter(|record| record.id >= start) {
            if batch.push(*record).is_err() {
                break;
            }
            self.next_id = record.id.wrapping_add(1);
        }
        batch
    }
}

/// Logs a batch produced by [`TelemetryLog::collect_new`].
pub fn emit(batch: &TelemetryBatch) {
    for record in batch {
        match record.event {
            TelemetryEventKind::ArmRejected | TelemetryEventKind::SpuriousEvent => {
                log_warning(record);
            }
            _ => log_record(record),
        }
    }
}

#[cfg(target_os = "none")]
fn log_record(record: &TelemetryRecord) {
    defmt::info!("sequencer: {}", defmt::Display2Format(record));
}

#[cfg(not(target_os = "none"))]
fn log_record(record: &TelemetryRecord) {
    println!("sequencer: {record}");
}

#[cfg(target_os = "none")]
fn log_warning(record: &TelemetryRecord) {
    defmt::warn!("sequencer: {}", defmt::Display2Format(record));
}

#[cfg(not(target_os = "none"))]
fn log_warning(record: &TelemetryRecord) {
    println!("sequencer: WARN {record}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_record_is_collected_once() {
        let mut recorder = TelemetryRecorder::new();
        let mut log = TelemetryLog::new();

        recorder.record_armed(6, 10);
        recorder.record_toggle(5, 20);
        let first = log.collect_new(&recorder);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].event, TelemetryEventKind::Armed);

        assert!(log.collect_new(&recorder).is_empty());

        recorder.record_cleanup(30);
        let second = log.collect_new(&recorder);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].event, TelemetryEventKind::CleanedUp);
    }

    #[test]
    fn overflow_stays_pending_for_the_next_batch() {
        let mut recorder = TelemetryRecorder::new();
        let mut log = TelemetryLog::new();
        for step in 0..20u32 {
            recorder.record_toggle(20 - step, u64::from(step));
        }

        assert_eq!(log.collect_new(&recorder).len(), TELEMETRY_BATCH);
        let rest = log.collect_new(&recorder);
        assert_eq!(rest.len(), 20 - TELEMETRY_BATCH);
        assert_eq!(rest[0].id, 16);
    }
}
