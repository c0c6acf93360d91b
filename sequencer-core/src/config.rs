//! Sequence configuration and validation.

use core::fmt;
use core::time::Duration;

use crate::time::TickRate;

/// Whether a stepped sequence repeats on the cycle epoch or runs once per arm.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Repetition {
    /// Start a new burst `cycle_interval` after the previous burst started.
    #[default]
    Cyclic,
    /// Run one burst and return to idle.
    OneShot,
}

/// Timing and count for one toggle sequence.
///
/// Values are in ticks of the time source driving the sequencer. A config is
/// captured at `arm()` and never changes while the sequence runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequenceConfig {
    pub cycle_interval_ticks: u64,
    pub toggle_interval_ticks: u64,
    pub toggle_count: u32,
}

impl SequenceConfig {
    /// 3 s cycle, 300 ms between toggles, 6 toggles, at the 1 MHz reference rate.
    pub const DEFAULT: Self = Self::new(3_000_000, 300_000, 6);

    #[must_use]
    pub const fn new(
        cycle_interval_ticks: u64,
        toggle_interval_ticks: u64,
        toggle_count: u32,
    ) -> Self {
        Self {
            cycle_interval_ticks,
            toggle_interval_ticks,
            toggle_count,
        }
    }

    /// Builds a config from wall-clock durations at the given tick rate.
    #[must_use]
    pub fn from_durations(
        rate: TickRate,
        cycle_interval: Duration,
        toggle_interval: Duration,
        toggle_count: u32,
    ) -> Self {
        Self::new(rate.ticks(cycle_interval), rate.ticks(toggle_interval), toggle_count)
    }

    /// Ticks spanned by one full burst of toggles.
    #[must_use]
    pub fn sequence_span(&self) -> u64 {
        self.toggle_interval_ticks
            .saturating_mul(u64::from(self.toggle_count))
    }

    /// Checks the invariants required before a sequence may be armed.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] the configuration violates.
    pub fn validate(&self, repetition: Repetition) -> Result<(), ConfigError> {
        if self.toggle_count == 0 {
            return Err(ConfigError::ZeroToggleCount);
        }
        if self.toggle_interval_ticks == 0 {
            return Err(ConfigError::ZeroToggleInterval);
        }
        if repetition == Repetition::Cyclic {
            let required = self.sequence_span();
            if self.cycle_interval_ticks < required {
                return Err(ConfigError::CycleTooShort {
                    required,
                    actual: self.cycle_interval_ticks,
                });
            }
        }
        Ok(())
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Reasons a [`SequenceConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    ZeroToggleCount,
    ZeroToggleInterval,
    /// Burst would overrun the next cycle epoch.
    CycleTooShort { required: u64, actual: u64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroToggleCount => f.write_str("toggle count must be at least 1"),
            ConfigError::ZeroToggleInterval => f.write_str("toggle interval must be non-zero"),
            ConfigError::CycleTooShort { required, actual } => write!(
                f,
                "cycle interval {actual} ticks is shorter than the {required} ticks a burst needs"
            ),
        }
    }
}
