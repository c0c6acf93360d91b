use core::time::Duration;

use sequencer_core::config::{Repetition, SequenceConfig};
use sequencer_core::orchestrator::{
    EventOutcome, Resource, SequenceState, Sequencer, SequencerError,
};
use sequencer_core::output::{Level, OutputActuator};
use sequencer_core::sim::{Bench, SimCompareTimer, SteppedBench};
use sequencer_core::telemetry::TelemetryEventKind;
use sequencer_core::time::{GRTC_TICK_RATE, counter_mask};
use sequencer_core::trigger::TriggerSource;

const MS: u64 = 1_000;

fn run(bench: &mut SteppedBench, ticks: u64) -> Vec<(u64, EventOutcome)> {
    let mut seen = Vec::new();
    bench.advance_with(ticks, &mut |at, outcome| seen.push((at, outcome)));
    seen
}

fn edge_times(bench: &SteppedBench) -> Vec<u64> {
    bench.output().edges().iter().map(|edge| edge.at).collect()
}

#[test]
fn default_cycle_toggles_six_times_then_rearms_at_three_seconds() {
    let mut bench = SteppedBench::new(SequenceConfig::DEFAULT, Repetition::Cyclic);
    bench
        .trigger(TriggerSource::Timer)
        .expect("default config arms");

    let outcomes = run(&mut bench, 3_000 * MS);

    assert_eq!(
        edge_times(&bench),
        vec![300 * MS, 600 * MS, 900 * MS, 1_200 * MS, 1_500 * MS, 1_800 * MS]
    );
    assert_eq!(bench.output().level(), Level::Low);
    assert_eq!(outcomes[0], (300 * MS, EventOutcome::Toggled { remaining: 5 }));
    assert_eq!(outcomes[5], (1_800 * MS, EventOutcome::Completed));
    assert_eq!(outcomes[6], (3_000 * MS, EventOutcome::CycleStarted));
    assert_eq!(outcomes.len(), 7);
    assert_eq!(bench.orchestrator().state(), SequenceState::Armed);

    bench.output_mut().clear_edges();
    run(&mut bench, 1_800 * MS);
    assert_eq!(
        edge_times(&bench),
        vec![3_300 * MS, 3_600 * MS, 3_900 * MS, 4_200 * MS, 4_500 * MS, 4_800 * MS],
        "second cycle repeats the burst relative to its own start"
    );
}

#[test]
fn pin_is_quiet_between_cycles() {
    let mut bench = SteppedBench::new(SequenceConfig::DEFAULT, Repetition::Cyclic);
    bench
        .trigger(TriggerSource::Timer)
        .expect("default config arms");

    run(&mut bench, 1_800 * MS);
    bench.output_mut().clear_edges();
    run(&mut bench, 1_199 * MS);

    assert!(bench.output().edges().is_empty());
    assert_eq!(bench.output().level(), Level::Low);
}

#[test]
fn single_toggle_runs_full_lifecycle() {
    let config = SequenceConfig::new(1_000 * MS, 300 * MS, 1);
    let mut bench = SteppedBench::new(config, Repetition::OneShot);
    bench
        .trigger(TriggerSource::Button)
        .expect("single toggle arms");

    let outcomes = run(&mut bench, 1_000 * MS);

    assert_eq!(outcomes, vec![(300 * MS, EventOutcome::Completed)]);
    let edges = bench.output().edges();
    assert_eq!(edges.len(), 2, "odd count is forced back low");
    assert_eq!(edges[0].level, Level::High);
    assert_eq!(edges[1].level, Level::Low);
    assert_eq!(bench.orchestrator().state(), SequenceState::Idle);

    let telemetry = bench.sequencer().telemetry();
    assert_eq!(telemetry.count_in_generation(TelemetryEventKind::SequenceComplete), 1);
    assert_eq!(telemetry.count_in_generation(TelemetryEventKind::CleanedUp), 1);
}

#[test]
fn every_count_produces_exactly_n_toggles_and_ends_low() {
    for count in 1..=7 {
        let config = SequenceConfig::new(10_000 * MS, 100 * MS, count);
        let mut bench = SteppedBench::new(config, Repetition::OneShot);
        bench
            .trigger(TriggerSource::Console)
            .expect("config arms");

        run(&mut bench, 1_000 * MS);

        let output = bench.output();
        assert_eq!(output.toggle_count(), count, "count {count}");
        assert_eq!(output.level(), Level::Low, "count {count}");
        let expected_edges = count + count % 2;
        assert_eq!(output.edges().len(), expected_edges as usize, "count {count}");
    }
}

#[test]
fn deadlines_survive_counter_wrap() {
    let mut timer = SimCompareTimer::with_width(1, 24);
    let start = counter_mask(24) - 100 * MS;
    timer.set_now(start);
    let mut bench = SteppedBench::with_timer(timer, SequenceConfig::DEFAULT, Repetition::OneShot);
    bench
        .trigger(TriggerSource::Timer)
        .expect("default config arms");

    run(&mut bench, 2_000 * MS);

    let offsets: Vec<u64> = edge_times(&bench)
        .into_iter()
        .map(|at| at - start)
        .collect();
    assert_eq!(
        offsets,
        vec![300 * MS, 600 * MS, 900 * MS, 1_200 * MS, 1_500 * MS, 1_800 * MS]
    );
}

#[test]
fn compare_pool_exhaustion_is_reported() {
    let mut bench = SteppedBench::with_timer(
        SimCompareTimer::new(0),
        SequenceConfig::DEFAULT,
        Repetition::Cyclic,
    );

    assert_eq!(
        bench.trigger(TriggerSource::Timer),
        Err(SequencerError::ResourceExhausted(Resource::CompareChannel))
    );
    assert_eq!(bench.orchestrator().state(), SequenceState::Idle);
    assert_eq!(bench.output().level(), Level::Low);
}

#[test]
fn durations_convert_at_the_reference_rate() {
    let config = SequenceConfig::from_durations(
        GRTC_TICK_RATE,
        Duration::from_secs(3),
        Duration::from_millis(300),
        6,
    );
    assert_eq!(config, SequenceConfig::DEFAULT);
}
