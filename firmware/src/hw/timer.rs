//! TIMER1 as the periodic pacer and TIMER2 as the toggle counter.

use embassy_nrf::Peri;
use embassy_nrf::interrupt;
use embassy_nrf::interrupt::InterruptExt;
use embassy_nrf::pac;
use embassy_nrf::peripherals::{TIMER1, TIMER2};
use embassy_nrf::ppi::{Event, Task};
use embassy_nrf::timer::{Frequency, Timer};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use sequencer_core::time::{EventCounter, PeriodicTimer};

const THRESHOLD_CC: usize = 0;
const CAPTURE_CC: usize = 1;

/// Raised from the TIMER2 interrupt when the counter reaches its threshold.
pub static COMPLETION: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Free-running timer whose CC[0] event paces the burst.
pub struct TimerPacer {
    timer: Timer<'static>,
}

impl TimerPacer {
    /// One pacer tick per microsecond; CC[0] restarts the period.
    pub fn new(timer: Peri<'static, TIMER1>) -> Self {
        let timer = Timer::new(timer);
        timer.set_frequency(Frequency::F1MHz);
        timer.cc(THRESHOLD_CC).short_compare_clear();
        Self { timer }
    }

    pub fn tick_event(&self) -> Event<'static> {
        self.timer.cc(THRESHOLD_CC).event_compare()
    }

    pub fn stop_task(&self) -> Task<'static> {
        self.timer.task_stop()
    }
}

impl PeriodicTimer for TimerPacer {
    fn start_periodic(&mut self, period: u64) {
        let period = u32::try_from(period).unwrap_or(u32::MAX);
        let cc = self.timer.cc(THRESHOLD_CC);
        self.timer.stop();
        self.timer.clear();
        cc.clear_events();
        cc.write(period);
        self.timer.start();
    }

    fn stop(&mut self) {
        self.timer.stop();
    }

    fn clear(&mut self) {
        self.timer.clear();
        self.timer.cc(THRESHOLD_CC).clear_events();
    }

    fn enter_low_power(&mut self) {
        // SHUTDOWN releases the high-frequency clock request.
        pac::TIMER1.tasks_shutdown().write_value(1);
    }
}

/// Timer in counter mode counting pacer ticks up to the burst length.
pub struct TimerCounter {
    timer: Timer<'static>,
}

impl TimerCounter {
    pub fn new(timer: Peri<'static, TIMER2>) -> Self {
        let timer = Timer::new_counter(timer);
        pac::TIMER2
            .intenclr()
            .write(|w| w.set_compare(THRESHOLD_CC, true));
        interrupt::TIMER2.unpend();
        // SAFETY: the handler below only touches TIMER2 and a signal.
        unsafe {
            interrupt::TIMER2.enable();
        }
        Self { timer }
    }

    pub fn count_task(&self) -> Task<'static> {
        self.timer.task_count()
    }

    pub fn threshold_event(&self) -> Event<'static> {
        self.timer.cc(THRESHOLD_CC).event_compare()
    }

    pub fn stop_task(&self) -> Task<'static> {
        self.timer.task_stop()
    }
}

impl EventCounter for TimerCounter {
    fn set_threshold(&mut self, count: u32) {
        let cc = self.timer.cc(THRESHOLD_CC);
        cc.clear_events();
        cc.write(count);
    }

    fn set_completion_interrupt(&mut self, enabled: bool) {
        if enabled {
            pac::TIMER2
                .intenset()
                .write(|w| w.set_compare(THRESHOLD_CC, true));
        } else {
            pac::TIMER2
                .intenclr()
                .write(|w| w.set_compare(THRESHOLD_CC, true));
        }
    }

    fn start(&mut self) {
        self.timer.start();
    }

    fn stop(&mut self) {
        self.timer.stop();
    }

    fn clear(&mut self) {
        self.timer.clear();
        self.timer.cc(THRESHOLD_CC).clear_events();
    }

    fn count(&mut self) -> u32 {
        self.timer.cc(CAPTURE_CC).capture()
    }
}

#[interrupt]
fn TIMER2() {
    let regs = pac::TIMER2;
    if regs.events_compare(THRESHOLD_CC).read() != 0 {
        regs.events_compare(THRESHOLD_CC).write_value(0);
        COMPLETION.signal(());
    }
}
