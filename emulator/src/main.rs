mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use sequencer_core::config::{Repetition, SequenceConfig};
use sequencer_core::sim::{Bench, RoutedBench, SteppedBench};

use session::{Mode, Session};

struct Options {
    mode: Mode,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: sequencer-emulator [--mode <stepped|oneshot|routed>] [--transcript <path>]"
        );
        process::exit(2);
    });

    match options.mode {
        Mode::Stepped(repetition) => {
            let bench = SteppedBench::new(SequenceConfig::DEFAULT, repetition);
            run(Session::new(bench, options.mode, options.transcript.as_deref())?)
        }
        Mode::Routed => {
            let bench = RoutedBench::new(SequenceConfig::DEFAULT);
            run(Session::new(bench, options.mode, options.transcript.as_deref())?)
        }
    }
}

fn run<B: Bench>(mut session: Session<B>) -> io::Result<()> {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Toggle sequencer emulator ({}) ready. Type `help` for commands or `exit` to quit.",
        session.mode()
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        mode: Mode::Stepped(Repetition::Cyclic),
        transcript: None,
    };
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--mode=") {
            options.mode = Mode::from_tag(value)?;
        } else if arg == "--mode" {
            let value = args.next().ok_or("Expected value after --mode")?;
            options.mode = Mode::from_tag(&value)?;
        } else if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--transcript" {
            let value = args.next().ok_or("Expected path after --transcript")?;
            options.transcript = Some(PathBuf::from(value));
        } else {
            options.mode = Mode::from_tag(&arg)?;
        }
    }

    Ok(options)
}
