//! Software-stepped strategy: every toggle is a compare interrupt serviced by
//! the compare task.

use core::time::Duration;

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_time::{Instant, Timer};
use sequencer_core::config::{Repetition, SequenceConfig};
use sequencer_core::orchestrator::{HardwareEvent, SoftwareSteppedSequencer, SteppedResources};
use sequencer_core::time::RTC_TICK_RATE;
use sequencer_core::trigger::{STEPPED_BUTTON_DEBOUNCE, TriggerSource};

use crate::compare::{self, EmbassyCompare, RESCHEDULED};
use crate::hw::GpioteOutput;

pub(super) type ActiveSequencer = SoftwareSteppedSequencer<EmbassyCompare, GpioteOutput>;

pub(super) const NAME: &str = "stepped";
pub(super) const BUTTON_DEBOUNCE: Duration = STEPPED_BUTTON_DEBOUNCE;

pub(super) fn sequencer(output: GpioteOutput) -> ActiveSequencer {
    SoftwareSteppedSequencer::new(
        SteppedResources {
            timer: EmbassyCompare,
            output,
        },
        Repetition::Cyclic,
    )
}

/// 3 s cycle, 300 ms toggles, 6 toggles, in RTC ticks.
pub(super) fn config() -> SequenceConfig {
    SequenceConfig::from_durations(
        RTC_TICK_RATE,
        Duration::from_secs(3),
        Duration::from_millis(300),
        6,
    )
}

pub(super) fn start(spawner: &Spawner) {
    spawner
        .spawn(compare_task())
        .expect("failed to spawn compare task");
    if let Err(err) = super::trigger(TriggerSource::Timer) {
        defmt::error!("pulse: initial arm failed: {}", defmt::Display2Format(&err));
    }
}

#[embassy_executor::task]
async fn compare_task() -> ! {
    loop {
        let Some((_, deadline)) = compare::earliest() else {
            RESCHEDULED.wait().await;
            continue;
        };

        let alarm = Timer::at(Instant::from_ticks(deadline));
        if let Either::Second(()) = select(alarm, RESCHEDULED.wait()).await {
            continue;
        }

        while let Some((channel, deadline)) = compare::take_due(Instant::now().as_ticks()) {
            super::deliver(HardwareEvent::Compare { channel, deadline });
        }
    }
}
