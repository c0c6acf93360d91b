//! Operator console shared by the emulator and diagnostics transports.

pub mod grammar;

pub use grammar::{ConsoleCommand, ConsoleError, Setting, parse};

use crate::config::SequenceConfig;
use crate::time::TickRate;

/// One entry in the console help catalog.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HelpEntry {
    pub topic: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
}

/// Help catalog in display order.
pub const HELP: &[HelpEntry] = &[
    HelpEntry {
        topic: "arm",
        usage: "arm",
        summary: "arm a sequence with the pending configuration",
    },
    HelpEntry {
        topic: "trigger",
        usage: "trigger [button|remote|timer]",
        summary: "deliver a trigger through its collaborator gate",
    },
    HelpEntry {
        topic: "cleanup",
        usage: "cleanup",
        summary: "tear down the running sequence",
    },
    HelpEntry {
        topic: "advance",
        usage: "advance <duration>",
        summary: "run simulated time forward, e.g. 300ms or 3s",
    },
    HelpEntry {
        topic: "set",
        usage: "set cycle-interval|toggle-interval|debounce <duration> | set toggle-count <n>",
        summary: "change a tunable; applies at the next arm",
    },
    HelpEntry {
        topic: "status",
        usage: "status",
        summary: "show state, pin level and pending configuration",
    },
    HelpEntry {
        topic: "trace",
        usage: "trace",
        summary: "dump recorded telemetry",
    },
    HelpEntry {
        topic: "help",
        usage: "help [topic]",
        summary: "list commands or describe one",
    },
];

/// Looks up a help entry by topic, ignoring ASCII case.
#[must_use]
pub fn help_entry(topic: &str) -> Option<&'static HelpEntry> {
    HELP.iter()
        .find(|entry| entry.topic.eq_ignore_ascii_case(topic))
}

/// Applies a `set` command to `config`, converting durations at `rate`.
///
/// Returns `false` for settings that do not live in [`SequenceConfig`]
/// (the trigger debounce belongs to the collaborator gates).
pub fn apply_setting(config: &mut SequenceConfig, setting: Setting, rate: TickRate) -> bool {
    match setting {
        Setting::CycleInterval(interval) => config.cycle_interval_ticks = rate.ticks(interval),
        Setting::ToggleInterval(interval) => config.toggle_interval_ticks = rate.ticks(interval),
        Setting::ToggleCount(count) => config.toggle_count = count,
        Setting::Debounce(_) => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;
    use crate::time::GRTC_TICK_RATE;

    #[test]
    fn every_command_has_help() {
        for topic in ["arm", "trigger", "cleanup", "advance", "set", "status", "trace", "help"] {
            assert!(help_entry(topic).is_some(), "missing help for {topic}");
        }
        assert_eq!(help_entry("SET").map(|entry| entry.topic), Some("set"));
        assert!(help_entry("reboot").is_none());
    }

    #[test]
    fn settings_update_pending_config() {
        let mut config = SequenceConfig::DEFAULT;
        assert!(apply_setting(
            &mut config,
            Setting::ToggleInterval(Duration::from_millis(500)),
            GRTC_TICK_RATE
        ));
        assert!(apply_setting(&mut config, Setting::ToggleCount(4), GRTC_TICK_RATE));
        assert!(!apply_setting(
            &mut config,
            Setting::Debounce(Duration::from_millis(50)),
            GRTC_TICK_RATE
        ));

        assert_eq!(config, SequenceConfig::new(3_000_000, 500_000, 4));
    }
}
