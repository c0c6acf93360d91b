//! nRF52840 adapters for the sequencer's hardware traits.
//!
//! Peripheral ownership on the development kit:
//!
//! | Role                | Resource        |
//! |---------------------|-----------------|
//! | toggled output      | P0.13 (LED1)    |
//! | status indicator    | P0.14 (LED2)    |
//! | trigger button      | P0.11 (BUTTON1) |
//! | hardware toggle     | GPIOTE channel 0|
//! | pacer               | TIMER1, CC[0]   |
//! | event counter       | TIMER2, CC[0]   |
//! | interconnect pool   | PPI channels 0-3|
//!
//! The embassy time driver keeps RTC1. Every peripheral above is driven
//! through the embassy-nrf drivers in this module; raw registers are only used
//! for the TIMER2 interrupt enable, TIMER1 shutdown and the pin read-back.

pub mod output;
#[cfg(feature = "routed")]
pub mod ppi;
#[cfg(feature = "routed")]
pub mod timer;

#[cfg(feature = "routed")]
use embassy_time::Instant;
#[cfg(feature = "routed")]
use sequencer_core::time::{Clock, Tick};

pub use output::GpioteOutput;
#[cfg(feature = "routed")]
pub use ppi::{Endpoints, PpiFabric};
#[cfg(feature = "routed")]
pub use timer::{COMPLETION, TimerCounter, TimerPacer};

/// Port 0 pin number of the toggled output.
pub const TOGGLE_PIN: u8 = 13;

/// First PPI channel handed to the sequencer.
#[cfg(feature = "routed")]
pub const PPI_POOL_START: u8 = 0;

/// Number of PPI channels handed to the sequencer.
#[cfg(feature = "routed")]
pub const PPI_POOL_SIZE: usize = 4;

/// Monotonic clock backed by the embassy time driver.
#[cfg(feature = "routed")]
#[derive(Copy, Clone, Debug, Default)]
pub struct EmbassyClock;

#[cfg(feature = "routed")]
impl Clock for EmbassyClock {
    fn read(&self) -> Tick {
        Instant::now().as_ticks()
    }
}
