//! Digital output actuator abstraction.

use core::fmt;

use crate::interconnect::ChannelId;

/// Logical pin level.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Level {
    /// Inactive level. Every sequence starts and ends here.
    #[default]
    Low,
    High,
}

impl Level {
    /// Returns the opposite level.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }

    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => f.write_str("low"),
            Level::High => f.write_str("high"),
        }
    }
}

/// Single output pin with a software path and a hardware toggle task.
pub trait OutputActuator {
    /// Claims the pin for output and drives `initial`.
    fn configure_output(&mut self, initial: Level);

    /// Flips the pin immediately from software.
    fn toggle_software(&mut self);

    /// Forces the inactive level while keeping the pin configured.
    fn clear(&mut self);

    /// Attaches the pin's toggle task to `channel` so interconnect events flip
    /// it without processor involvement.
    fn bind_toggle_task(&mut self, channel: ChannelId);

    /// Detaches the toggle task and forces the inactive level. Safe to call in
    /// any state, including after an odd number of toggles.
    fn release(&mut self);

    /// Returns the level currently driven on the pin.
    fn level(&self) -> Level;
}

/// Output actuator that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopOutput {
    level: Level,
}

impl NoopOutput {
    #[must_use]
    pub const fn new() -> Self {
        Self { level: Level::Low }
    }
}

impl OutputActuator for NoopOutput {
    fn configure_output(&mut self, initial: Level) {
        self.level = initial;
    }

    fn toggle_software(&mut self) {
        self.level = self.level.toggled();
    }

    fn clear(&mut self) {
        self.level = Level::Low;
    }

    fn bind_toggle_task(&mut self, _: ChannelId) {}

    fn release(&mut self) {
        self.level = Level::Low;
    }

    fn level(&self) -> Level {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_forces_inactive_level_after_odd_toggles() {
        let mut output = NoopOutput::new();
        output.configure_output(Level::Low);
        output.toggle_software();
        output.toggle_software();
        output.toggle_software();
        assert_eq!(output.level(), Level::High);

        output.release();
        assert_eq!(output.level(), Level::Low);
    }
}
