use core::time::Duration;

use sequencer_core::config::SequenceConfig;
use sequencer_core::interconnect::Publisher;
use sequencer_core::orchestrator::{
    EventOutcome, Resource, SequenceState, Sequencer, SequencerError,
};
use sequencer_core::output::{Level, OutputActuator};
use sequencer_core::sim::{Bench, RoutedBench};
use sequencer_core::time::GRTC_TICK_RATE;
use sequencer_core::trigger::TriggerSource;

const MS: u64 = 1_000;

fn burst(toggle_ms: u64, count: u32) -> SequenceConfig {
    SequenceConfig::from_durations(
        GRTC_TICK_RATE,
        Duration::ZERO,
        Duration::from_millis(toggle_ms),
        count,
    )
}

fn run(bench: &mut RoutedBench, ticks: u64) -> Vec<(u64, EventOutcome)> {
    let mut seen = Vec::new();
    bench.advance_with(ticks, &mut |at, outcome| seen.push((at, outcome)));
    seen
}

#[test]
fn six_toggles_at_500ms_complete_once_at_three_seconds() {
    let mut bench = RoutedBench::new(burst(500, 6));
    bench
        .trigger(TriggerSource::Button)
        .expect("routed chain arms");

    let outcomes = run(&mut bench, 4_000 * MS);

    assert_eq!(outcomes, vec![(3_000 * MS, EventOutcome::Completed)]);
    let times: Vec<u64> = bench.output().edges().iter().map(|edge| edge.at).collect();
    assert_eq!(
        times,
        vec![500 * MS, 1_000 * MS, 1_500 * MS, 2_000 * MS, 2_500 * MS, 3_000 * MS]
    );
    assert_eq!(bench.output().level(), Level::Low);
}

#[test]
fn completion_leaves_no_channel_or_route_behind() {
    let mut bench = RoutedBench::new(burst(500, 6));
    bench
        .trigger(TriggerSource::Button)
        .expect("routed chain arms");
    assert_eq!(bench.sequencer().owned_channels().len(), 2);

    run(&mut bench, 3_000 * MS);

    let sequencer = bench.sequencer();
    let resources = sequencer.resources();
    assert_eq!(sequencer.state(), SequenceState::Idle);
    assert!(sequencer.owned_channels().is_empty());
    assert_eq!(resources.interconnect.allocated_count(), 0);
    assert_eq!(resources.interconnect.binding_count(), 0);
    assert!(!resources.pacer.is_running());
    assert!(resources.pacer.in_low_power());
    assert!(!resources.counter.is_running());
}

#[test]
fn remaining_tracks_hardware_progress() {
    let mut bench = RoutedBench::new(burst(500, 6));
    bench
        .trigger(TriggerSource::Remote)
        .expect("routed chain arms");

    run(&mut bench, 1_200 * MS);

    assert_eq!(bench.sequencer_mut().remaining(), 4);
    assert_eq!(bench.output().toggle_count(), 2);
    assert_eq!(
        bench.orchestrator_mut().sample_state(),
        SequenceState::Running { remaining: 4 }
    );
}

#[test]
fn every_count_produces_exactly_n_toggles_and_ends_low() {
    for count in 1..=7 {
        let mut bench = RoutedBench::new(burst(100, count));
        bench
            .trigger(TriggerSource::Button)
            .expect("routed chain arms");

        let outcomes = run(&mut bench, 2_000 * MS);

        assert_eq!(outcomes.len(), 1, "count {count}");
        assert_eq!(bench.output().toggle_count(), count, "count {count}");
        assert_eq!(bench.output().level(), Level::Low, "count {count}");
    }
}

#[test]
fn short_pool_fails_cleanly_and_recovers() {
    let mut bench = RoutedBench::with_pool(1, burst(500, 6));

    assert_eq!(
        bench.trigger(TriggerSource::Button),
        Err(SequencerError::ResourceExhausted(Resource::InterconnectChannel))
    );
    assert_eq!(bench.orchestrator().state(), SequenceState::Idle);
    assert_eq!(bench.output().level(), Level::Low);

    run(&mut bench, 1_000 * MS);
    assert!(bench.output().edges().is_empty(), "nothing runs after a failed arm");
    assert!(
        bench
            .sequencer()
            .resources()
            .interconnect
            .subscribers_of(Publisher::PacerTick)
            .is_empty()
    );
}

#[test]
fn manual_cleanup_stops_the_chain_mid_burst() {
    let mut bench = RoutedBench::new(burst(500, 6));
    bench
        .trigger(TriggerSource::Button)
        .expect("routed chain arms");
    run(&mut bench, 1_600 * MS);
    assert_eq!(bench.output().level(), Level::High);

    bench.cleanup();
    let after_cleanup = bench.output().edges().len();
    let outcomes = run(&mut bench, 5_000 * MS);

    assert!(outcomes.is_empty());
    assert_eq!(bench.output().edges().len(), after_cleanup);
    assert_eq!(bench.output().level(), Level::Low);
}
