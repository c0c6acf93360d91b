use embassy_nrf::gpio::Output;
use embassy_time::{Duration, Timer};

use crate::status;

const BLINK: Duration = Duration::from_millis(80);

/// Active-low status LED: one blink per accepted trigger, solid while a burst
/// is in flight.
#[embassy_executor::task]
pub async fn run(mut led: Output<'static>) -> ! {
    loop {
        let source = super::TRIGGER_ACCEPTED.wait().await;
        led.set_low();
        Timer::after(BLINK).await;
        led.set_high();
        Timer::after(BLINK).await;

        while status::is_running() {
            led.set_low();
            Timer::after(BLINK).await;
        }
        led.set_high();

        let snapshot = status::snapshot();
        defmt::debug!(
            "status: trigger={} remaining={} bursts={} rejected={} spurious={}",
            defmt::Display2Format(&source),
            snapshot.remaining,
            snapshot.completed_bursts,
            snapshot.rejected_arms,
            snapshot.spurious_events
        );
    }
}
