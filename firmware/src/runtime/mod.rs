use core::cell::RefCell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Input, Level as PinLevel, Output, OutputDrive, Pull};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use sequencer_core::orchestrator::{
    EventOutcome, HardwareEvent, Orchestrator, Sequencer, SequencerError,
};
use sequencer_core::trigger::TriggerSource;

use crate::hw::{GpioteOutput, TOGGLE_PIN};
use crate::status;
use crate::telemetry::{self, TelemetryBatch, TelemetryLog};

mod button_task;
mod status_task;
#[cfg(not(feature = "routed"))]
mod stepped;
#[cfg(feature = "routed")]
mod routed;

#[cfg(not(feature = "routed"))]
use stepped as strategy;
#[cfg(feature = "routed")]
use routed as strategy;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

type FirmwareOrchestrator = Orchestrator<strategy::ActiveSequencer>;

/// Orchestrator plus the cursor of telemetry already logged.
struct Controller {
    orchestrator: FirmwareOrchestrator,
    log: TelemetryLog,
}

static CONTROLLER: Mutex<CriticalSectionRawMutex, RefCell<Option<Controller>>> =
    Mutex::new(RefCell::new(None));

/// Raised for every accepted trigger so the status LED can acknowledge it.
pub(super) static TRIGGER_ACCEPTED: Signal<CriticalSectionRawMutex, TriggerSource> =
    Signal::new();

/// Runs `f` with exclusive access to the orchestrator, then publishes status
/// and logs any new telemetry outside the lock.
fn with_orchestrator<R>(f: impl FnOnce(&mut FirmwareOrchestrator) -> R) -> Option<R> {
    let (result, batch): (R, TelemetryBatch) = CONTROLLER.lock(|cell| {
        let mut slot = cell.borrow_mut();
        let controller = slot.as_mut()?;
        let result = f(&mut controller.orchestrator);
        status::record_state(controller.orchestrator.sample_state());
        let batch = controller
            .log
            .collect_new(controller.orchestrator.sequencer().telemetry());
        Some((result, batch))
    })?;
    telemetry::emit(&batch);
    Some(result)
}

pub(super) fn trigger(source: TriggerSource) -> Result<(), SequencerError> {
    let result = with_orchestrator(|orchestrator| orchestrator.trigger(source));
    if status::record_arm(result) {
        TRIGGER_ACCEPTED.signal(source);
    }
    result.unwrap_or_else(|| {
        defmt::warn!(
            "pulse: {} trigger before the controller was installed",
            defmt::Display2Format(&source)
        );
        Ok(())
    })
}

pub(super) fn deliver(event: HardwareEvent) -> EventOutcome {
    let outcome = with_orchestrator(|orchestrator| orchestrator.handle_event(event))
        .unwrap_or(EventOutcome::Spurious);
    status::record_outcome(outcome);
    outcome
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(Default::default());

    let output = GpioteOutput::new(
        p.GPIOTE_CH0,
        Output::new(p.P0_13, PinLevel::Low, OutputDrive::Standard),
        TOGGLE_PIN,
    );
    #[cfg(feature = "routed")]
    let sequencer = strategy::sequencer(
        output,
        strategy::ChainResources {
            pacer: p.TIMER1,
            counter: p.TIMER2,
            ppi: [
                p.PPI_CH0.into(),
                p.PPI_CH1.into(),
                p.PPI_CH2.into(),
                p.PPI_CH3.into(),
            ],
        },
    );
    #[cfg(not(feature = "routed"))]
    let sequencer = strategy::sequencer(output);
    let orchestrator = Orchestrator::new(sequencer, strategy::config());
    CONTROLLER.lock(|cell| {
        cell.replace(Some(Controller {
            orchestrator,
            log: TelemetryLog::new(),
        }));
    });
    log_boot(strategy::NAME);

    let button = Input::new(p.P0_11, Pull::Up);
    let led = Output::new(p.P0_14, PinLevel::High, OutputDrive::Standard);

    spawner
        .spawn(button_task::run(button, strategy::BUTTON_DEBOUNCE))
        .expect("failed to spawn button task");
    spawner
        .spawn(status_task::run(led))
        .expect("failed to spawn status task");
    strategy::start(&spawner);

    core::future::pending::<()>().await;
}

fn log_boot(strategy: &str) {
    defmt::info!("pulse: sequencer ready ({})", strategy);
}
