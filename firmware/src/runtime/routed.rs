//! Hardware-routed strategy: the PPI chain toggles the pin and stops itself;
//! the processor only services the completion interrupt.

use core::time::Duration;

use embassy_executor::Spawner;
use embassy_nrf::Peri;
use embassy_nrf::peripherals::{TIMER1, TIMER2};
use embassy_nrf::ppi::AnyConfigurableChannel;
use sequencer_core::config::SequenceConfig;
use sequencer_core::orchestrator::{HardwareEvent, HardwareRoutedSequencer, RoutedResources};
use sequencer_core::time::GRTC_TICK_RATE;
use sequencer_core::trigger::ROUTED_BUTTON_DEBOUNCE;

use crate::hw::{
    COMPLETION, EmbassyClock, Endpoints, GpioteOutput, PPI_POOL_SIZE, PpiFabric, TimerCounter,
    TimerPacer,
};

pub(super) type ActiveSequencer =
    HardwareRoutedSequencer<EmbassyClock, TimerPacer, TimerCounter, GpioteOutput, PpiFabric>;

pub(super) const NAME: &str = "routed";
pub(super) const BUTTON_DEBOUNCE: Duration = ROUTED_BUTTON_DEBOUNCE;

/// Peripherals the routed chain takes over besides the output.
pub(super) struct ChainResources {
    pub pacer: Peri<'static, TIMER1>,
    pub counter: Peri<'static, TIMER2>,
    pub ppi: [Peri<'static, AnyConfigurableChannel>; PPI_POOL_SIZE],
}

pub(super) fn sequencer(output: GpioteOutput, resources: ChainResources) -> ActiveSequencer {
    let pacer = TimerPacer::new(resources.pacer);
    let counter = TimerCounter::new(resources.counter);
    let endpoints = Endpoints::new(&pacer, &counter, &output);
    HardwareRoutedSequencer::new(RoutedResources {
        clock: EmbassyClock,
        pacer,
        counter,
        output,
        interconnect: PpiFabric::new(resources.ppi, endpoints),
    })
}

/// 500 ms toggles, 6 toggles, in 1 MHz pacer ticks.
pub(super) fn config() -> SequenceConfig {
    SequenceConfig::from_durations(
        GRTC_TICK_RATE,
        Duration::ZERO,
        Duration::from_millis(500),
        6,
    )
}

pub(super) fn start(spawner: &Spawner) {
    spawner
        .spawn(completion_task())
        .expect("failed to spawn completion task");
}

#[embassy_executor::task]
async fn completion_task() -> ! {
    loop {
        COMPLETION.wait().await;
        super::deliver(HardwareEvent::Completion);
    }
}
