use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use sequencer_core::config::{Repetition, SequenceConfig};
use sequencer_core::console::{self, ConsoleCommand, HELP, Setting};
use sequencer_core::orchestrator::{EventOutcome, Sequencer};
use sequencer_core::output::OutputActuator;
use sequencer_core::sim::Bench;
use sequencer_core::time::{GRTC_TICK_RATE, TickRate};
use sequencer_core::trigger::{
    ROUTED_BUTTON_DEBOUNCE, RemoteTrigger, STEPPED_BUTTON_DEBOUNCE, TriggerGate, TriggerSource,
};

/// Payload the emulator writes on behalf of a remote peer.
const REMOTE_PAYLOAD: &[u8] = &[0x01];

/// Sequencer strategy driven by the session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Stepped(Repetition),
    Routed,
}

impl Mode {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("stepped") || tag.eq_ignore_ascii_case("cyclic") {
            Ok(Self::Stepped(Repetition::Cyclic))
        } else if tag.eq_ignore_ascii_case("oneshot") || tag.eq_ignore_ascii_case("one-shot") {
            Ok(Self::Stepped(Repetition::OneShot))
        } else if tag.eq_ignore_ascii_case("routed") {
            Ok(Self::Routed)
        } else {
            Err(format!("Unknown sequencer mode `{tag}`"))
        }
    }

    fn default_debounce(self) -> Duration {
        match self {
            Mode::Stepped(_) => STEPPED_BUTTON_DEBOUNCE,
            Mode::Routed => ROUTED_BUTTON_DEBOUNCE,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Stepped(Repetition::Cyclic) => f.write_str("stepped, cyclic"),
            Mode::Stepped(Repetition::OneShot) => f.write_str("stepped, one-shot"),
            Mode::Routed => f.write_str("routed"),
        }
    }
}

pub struct Session<B> {
    bench: B,
    mode: Mode,
    rate: TickRate,
    debounce: Duration,
    button: TriggerGate,
    remote: RemoteTrigger,
    transcript: Option<TranscriptLogger>,
}

impl<B: Bench> Session<B> {
    pub fn new(bench: B, mode: Mode, transcript: Option<&Path>) -> io::Result<Self> {
        let transcript = transcript
            .map(|path| TranscriptLogger::new(path, mode))
            .transpose()?;
        let rate = GRTC_TICK_RATE;
        let debounce = mode.default_debounce();
        let spacing = rate.ticks(debounce);

        Ok(Self {
            bench,
            mode,
            rate,
            debounce,
            button: TriggerGate::new(spacing),
            remote: RemoteTrigger::new(TriggerGate::new(spacing)),
            transcript,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let issued_at = self.bench.now();
        self.log(issued_at, TranscriptRole::Host, trimmed)?;

        let lines = match console::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR {err}")],
        };

        let finished_at = self.bench.now();
        for line in &lines {
            self.log(finished_at, TranscriptRole::Emulator, line)?;
        }
        Ok(lines)
    }

    fn execute(&mut self, command: ConsoleCommand<'_>) -> Vec<String> {
        match command {
            ConsoleCommand::Trigger(source) => self.handle_trigger(source),
            ConsoleCommand::Cleanup => {
                self.bench.cleanup();
                let mut lines = self.drain_edges();
                lines.push(format!("OK cleanup, state={}", self.bench.orchestrator().state()));
                lines
            }
            ConsoleCommand::Advance(duration) => self.handle_advance(duration),
            ConsoleCommand::Set(setting) => self.handle_set(setting),
            ConsoleCommand::Status => self.handle_status(),
            ConsoleCommand::Trace => self.handle_trace(),
            ConsoleCommand::Help(topic) => handle_help(topic),
        }
    }

    fn handle_trigger(&mut self, source: TriggerSource) -> Vec<String> {
        let now = self.bench.now();
        let admitted = match source {
            TriggerSource::Button => self.button.admit(now),
            TriggerSource::Remote => self.remote.on_write(REMOTE_PAYLOAD, now).1.is_some(),
            TriggerSource::Timer | TriggerSource::Console => true,
        };
        if !admitted {
            return vec![format!(
                "IGN {source} trigger inside {} debounce window",
                format_duration(self.debounce)
            )];
        }

        let mut lines = self.drain_edges();
        match self.bench.trigger(source) {
            Ok(()) => lines.push(format!(
                "OK armed by {source}: {}",
                describe_config(self.bench.orchestrator().config(), self.rate)
            )),
            Err(err) => lines.push(format!("ERR arm {err}")),
        }
        lines.extend(self.drain_edges());
        lines
    }

    fn handle_advance(&mut self, duration: Duration) -> Vec<String> {
        let ticks = self.rate.ticks(duration);
        let mut outcomes = Vec::new();
        self.bench
            .advance_with(ticks, &mut |at, outcome| outcomes.push((at, outcome)));

        let mut entries: Vec<(u64, u8, String)> = self
            .bench
            .output()
            .edges()
            .iter()
            .map(|edge| {
                let line = format!("EDGE {} {}", format_ticks(edge.at, self.rate), edge.level);
                (edge.at, 0, line)
            })
            .collect();
        entries.extend(outcomes.into_iter().map(|(at, outcome)| {
            let text = describe_outcome(outcome);
            (at, 1, format!("EVT  {} {text}", format_ticks(at, self.rate)))
        }));
        entries.sort_by_key(|(at, order, _)| (*at, *order));
        self.bench.output_mut().clear_edges();

        let mut lines: Vec<String> = entries.into_iter().map(|(_, _, line)| line).collect();
        let state = self.bench.orchestrator_mut().sample_state();
        lines.push(format!(
            "OK t={} state={state} pin={}",
            format_ticks(self.bench.now(), self.rate),
            self.bench.output().level()
        ));
        lines
    }

    fn handle_set(&mut self, setting: Setting) -> Vec<String> {
        if let Setting::Debounce(window) = setting {
            let spacing = self.rate.ticks(window);
            self.debounce = window;
            self.button.set_min_spacing(spacing);
            self.remote.set_min_spacing(spacing);
            return vec![format!("OK debounce {}", format_duration(window))];
        }

        let mut config = *self.bench.orchestrator().config();
        console::apply_setting(&mut config, setting, self.rate);
        self.bench.orchestrator_mut().set_config(config);
        vec![format!(
            "OK pending {} (applies at next arm)",
            describe_config(&config, self.rate)
        )]
    }

    fn handle_status(&mut self) -> Vec<String> {
        let state = self.bench.orchestrator_mut().sample_state();
        let orchestrator = self.bench.orchestrator();
        let sequencer = orchestrator.sequencer();
        let channels = sequencer
            .owned_channels()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let last_trigger = orchestrator
            .last_trigger()
            .map_or_else(|| "none".to_string(), |source| source.to_string());

        vec![
            format!(
                "STATUS mode={} t={} state={} pin={}",
                self.mode,
                format_ticks(self.bench.now(), self.rate),
                state,
                self.bench.output().level()
            ),
            format!(
                "STATUS pending {} debounce={}",
                describe_config(orchestrator.config(), self.rate),
                format_duration(self.debounce)
            ),
            format!("STATUS channels=[{channels}] last-trigger={last_trigger}"),
        ]
    }

    fn handle_trace(&self) -> Vec<String> {
        let telemetry = self.bench.orchestrator().sequencer().telemetry();
        if telemetry.is_empty() {
            return vec!["TRACE empty".to_string()];
        }
        telemetry
            .oldest_first()
            .map(|record| format!("TRACE {record}"))
            .collect()
    }

    fn drain_edges(&mut self) -> Vec<String> {
        let rate = self.rate;
        let lines = self
            .bench
            .output()
            .edges()
            .iter()
            .map(|edge| format!("EDGE {} {}", format_ticks(edge.at, rate), edge.level))
            .collect();
        self.bench.output_mut().clear_edges();
        lines
    }

    fn log(&mut self, at: u64, role: TranscriptRole, line: &str) -> io::Result<()> {
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(self.rate.duration(at), role, line),
            None => Ok(()),
        }
    }
}

fn handle_help(topic: Option<&str>) -> Vec<String> {
    match topic {
        None => HELP
            .iter()
            .map(|entry| format!("  {:<44} {}", entry.usage, entry.summary))
            .collect(),
        Some(topic) => match console::help_entry(topic) {
            Some(entry) => vec![format!("{}\n  {}", entry.usage, entry.summary)],
            None => vec![format!("ERR unknown help topic `{topic}`")],
        },
    }
}

fn describe_outcome(outcome: EventOutcome) -> String {
    match outcome {
        EventOutcome::Toggled { remaining } => format!("toggled, {remaining} remaining"),
        EventOutcome::CycleStarted => "cycle started".to_string(),
        EventOutcome::Completed => "sequence complete".to_string(),
        EventOutcome::Spurious => "spurious event ignored".to_string(),
    }
}

fn describe_config(config: &SequenceConfig, rate: TickRate) -> String {
    format!(
        "cycle={} toggle={} count={}",
        format_ticks(config.cycle_interval_ticks, rate),
        format_ticks(config.toggle_interval_ticks, rate),
        config.toggle_count
    )
}

fn format_ticks(ticks: u64, rate: TickRate) -> String {
    format_duration(rate.duration(ticks))
}

fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    let (millis, fraction) = (micros / 1_000, micros % 1_000);
    if fraction == 0 {
        format!("{millis}ms")
    } else {
        format!("{millis}.{fraction:03}ms")
    }
}

struct TranscriptLogger {
    writer: BufWriter<File>,
}

impl TranscriptLogger {
    fn new(path: &Path, mode: Mode) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(mode)?;
        Ok(logger)
    }

    fn write_header(&mut self, mode: Mode) -> io::Result<()> {
        writeln!(self.writer, "# Toggle sequencer emulator transcript ({mode})")?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since power-on"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, at: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>8} ms] {} {}",
            at.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_core::sim::{RoutedBench, SteppedBench};

    fn stepped() -> Session<SteppedBench> {
        let mode = Mode::Stepped(Repetition::Cyclic);
        let bench = SteppedBench::new(SequenceConfig::DEFAULT, Repetition::Cyclic);
        Session::new(bench, mode, None).expect("session without transcript")
    }

    fn routed() -> Session<RoutedBench> {
        let bench = RoutedBench::new(SequenceConfig::DEFAULT);
        Session::new(bench, Mode::Routed, None).expect("session without transcript")
    }

    fn run(session: &mut Session<impl Bench>, line: &str) -> Vec<String> {
        session.handle_command(line).expect("no transcript I/O")
    }

    #[test]
    fn stepped_burst_reports_six_edges_and_next_cycle() {
        let mut session = stepped();
        assert!(run(&mut session, "arm")[0].starts_with("OK armed by console"));

        let lines = run(&mut session, "advance 3s");
        let edges = lines.iter().filter(|line| line.starts_with("EDGE")).count();
        assert_eq!(edges, 6);
        assert!(lines.iter().any(|line| line.contains("3000ms cycle started")));
        assert!(lines.iter().any(|line| line.ends_with("pin=low")));
    }

    #[test]
    fn routed_button_bounce_is_ignored() {
        let mut session = routed();
        run(&mut session, "trigger button");
        run(&mut session, "advance 20ms");

        let lines = run(&mut session, "trigger button");
        assert!(lines[0].starts_with("IGN button"));

        run(&mut session, "advance 40ms");
        let lines = run(&mut session, "trigger button");
        assert!(lines[0].starts_with("OK armed by button"));
    }

    #[test]
    fn set_applies_at_next_arm() {
        let mut session = routed();
        run(&mut session, "set toggle-count 2");
        run(&mut session, "set toggle-interval 100ms");
        run(&mut session, "trigger timer");

        let lines = run(&mut session, "advance 1s");
        assert_eq!(lines.iter().filter(|line| line.starts_with("EDGE")).count(), 2);
        assert!(lines.iter().any(|line| line.contains("200ms sequence complete")));
    }

    #[test]
    fn debounce_change_applies_to_remote_writes() {
        let mut session = routed();
        assert!(run(&mut session, "set debounce 300ms")[0].starts_with("OK debounce"));
        assert!(run(&mut session, "trigger remote")[0].starts_with("OK armed by remote"));

        run(&mut session, "advance 60ms");
        let lines = run(&mut session, "trigger remote");
        assert!(lines[0].starts_with("IGN remote"));
    }

    #[test]
    fn routed_status_reads_progress_from_the_counter() {
        let mut session = routed();
        run(&mut session, "set toggle-interval 500ms");
        run(&mut session, "trigger timer");
        run(&mut session, "advance 1200ms");

        let lines = run(&mut session, "status");
        assert!(
            lines[0].contains("state=running (4 remaining)"),
            "unexpected status line: {}",
            lines[0]
        );
    }

    #[test]
    fn syntax_errors_are_reported() {
        let mut session = stepped();
        let lines = run(&mut session, "advance soon");
        assert!(lines[0].starts_with("ERR syntax error"));
    }
}
