use core::time::Duration;

use embassy_nrf::gpio::Input;
use embassy_time::Instant;
use sequencer_core::time::RTC_TICK_RATE;
use sequencer_core::trigger::{TriggerGate, TriggerSource};

/// Arms a burst on every falling edge that clears the debounce gate.
#[embassy_executor::task]
pub async fn run(mut button: Input<'static>, debounce: Duration) -> ! {
    let mut gate = TriggerGate::new(RTC_TICK_RATE.ticks(debounce));
    loop {
        button.wait_for_falling_edge().await;
        let now = Instant::now().as_ticks();
        if !gate.admit(now) {
            defmt::debug!("button: bounce ignored t={}", now);
            continue;
        }
        if let Err(err) = super::trigger(TriggerSource::Button) {
            defmt::warn!("button: arm rejected: {}", defmt::Display2Format(&err));
        }
    }
}
