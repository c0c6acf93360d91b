//! Toggled output pin driven through a GPIOTE task channel.
//!
//! The pin stays in GPIOTE task mode for its whole life: software writes go
//! through the SET/CLR/OUT tasks and the interconnect triggers the same OUT
//! task, so both paths agree on the level.

use embassy_nrf::Peri;
use embassy_nrf::gpio::Output;
use embassy_nrf::gpiote::{self, OutputChannel, OutputChannelPolarity};
use embassy_nrf::pac;
use embassy_nrf::pac::gpio::vals::Input;
#[cfg(feature = "routed")]
use embassy_nrf::ppi::Task;
use sequencer_core::interconnect::ChannelId;
use sequencer_core::output::{Level, OutputActuator};

pub struct GpioteOutput {
    channel: OutputChannel<'static>,
    psel: u8,
}

impl GpioteOutput {
    /// Hands `pin`, which must be port 0 pin `psel`, to GPIOTE `channel` in
    /// toggle mode.
    pub fn new(
        channel: Peri<'static, impl gpiote::Channel>,
        pin: Output<'static>,
        psel: u8,
    ) -> Self {
        // GPIOTE overrides OUT, so the level is read back from IN.
        pac::P0
            .pin_cnf(usize::from(psel))
            .modify(|w| w.set_input(Input::CONNECT));
        Self {
            channel: OutputChannel::new(channel, pin, OutputChannelPolarity::Toggle),
            psel,
        }
    }

    /// OUT task of the channel, for routing through the interconnect.
    #[cfg(feature = "routed")]
    pub fn toggle_task(&self) -> Task<'static> {
        self.channel.task_out()
    }

    fn drive(&self, level: Level) {
        match level {
            Level::Low => self.channel.clear(),
            Level::High => self.channel.set(),
        }
    }
}

impl OutputActuator for GpioteOutput {
    fn configure_output(&mut self, initial: Level) {
        self.drive(initial);
    }

    fn toggle_software(&mut self) {
        self.channel.out();
    }

    fn clear(&mut self) {
        self.channel.clear();
    }

    fn bind_toggle_task(&mut self, _channel: ChannelId) {
        // The OUT task endpoint is wired by the PPI fabric; the channel is
        // already in toggle mode.
    }

    fn release(&mut self) {
        self.channel.clear();
    }

    fn level(&self) -> Level {
        if pac::P0.in_().read().pin(usize::from(self.psel)) {
            Level::High
        } else {
            Level::Low
        }
    }
}
