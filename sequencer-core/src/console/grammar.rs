#![allow(clippy::module_name_repetitions)]

//! Line grammar for the sequencer console.
//!
//! Parsers are `winnow` combinators running directly over the input `&str`.
//! Keywords match case-insensitively; durations take a `us`, `ms` or `s`
//! suffix.

use core::fmt;
use core::time::Duration;

use winnow::ascii::{Caseless, digit1, space0, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{literal, take_while};

use crate::trigger::TriggerSource;

/// Structured commands produced by the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    /// Arm a sequence; `arm` is shorthand for a console trigger.
    Trigger(TriggerSource),
    Cleanup,
    /// Move simulated time forward.
    Advance(Duration),
    Set(Setting),
    Status,
    Trace,
    Help(Option<&'a str>),
}

/// Tunable changed by `set`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Setting {
    CycleInterval(Duration),
    ToggleInterval(Duration),
    ToggleCount(u32),
    /// Minimum spacing between accepted button or remote triggers.
    Debounce(Duration),
}

/// Parse failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleError {
    /// Line contained only whitespace.
    Empty,
    /// Input stopped matching the grammar at byte `offset`.
    Syntax { offset: usize },
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Empty => f.write_str("empty command"),
            ConsoleError::Syntax { offset } => write!(f, "syntax error at column {}", offset + 1),
        }
    }
}

/// Parse one console line.
///
/// # Errors
///
/// [`ConsoleError::Empty`] for a blank line, [`ConsoleError::Syntax`] with the
/// failing column otherwise.
pub fn parse(line: &str) -> Result<ConsoleCommand<'_>, ConsoleError> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty() {
        return Err(ConsoleError::Empty);
    }

    command_line
        .parse(trimmed)
        .map_err(|err| ConsoleError::Syntax {
            offset: err.offset(),
        })
}

fn command_line<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    let (_, command, _) = (space0, command, space0).parse_next(input)?;
    Ok(command)
}

fn command<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    alt((
        keyword("arm").value(ConsoleCommand::Trigger(TriggerSource::Console)),
        trigger,
        keyword("cleanup").value(ConsoleCommand::Cleanup),
        preceded((keyword("advance"), space1), duration).map(ConsoleCommand::Advance),
        preceded((keyword("set"), space1), setting).map(ConsoleCommand::Set),
        keyword("status").value(ConsoleCommand::Status),
        keyword("trace").value(ConsoleCommand::Trace),
        help,
    ))
    .parse_next(input)
}

fn trigger<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    let source = preceded(keyword("trigger"), opt(preceded(space1, trigger_source)))
        .parse_next(input)?;
    Ok(ConsoleCommand::Trigger(
        source.unwrap_or(TriggerSource::Button),
    ))
}

fn trigger_source(input: &mut &str) -> ModalResult<TriggerSource> {
    alt((
        keyword("button").value(TriggerSource::Button),
        keyword("remote").value(TriggerSource::Remote),
        keyword("timer").value(TriggerSource::Timer),
    ))
    .parse_next(input)
}

fn setting(input: &mut &str) -> ModalResult<Setting> {
    alt((
        preceded((keyword("cycle-interval"), space1), duration).map(Setting::CycleInterval),
        preceded((keyword("toggle-interval"), space1), duration).map(Setting::ToggleInterval),
        preceded((keyword("toggle-count"), space1), integer).map(Setting::ToggleCount),
        preceded((keyword("debounce"), space1), duration).map(Setting::Debounce),
    ))
    .parse_next(input)
}

fn help<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    let topic = preceded(keyword("help"), opt(preceded(space1, word))).parse_next(input)?;
    Ok(ConsoleCommand::Help(topic))
}

fn keyword<'a>(name: &'static str) -> impl Parser<&'a str, &'a str, ErrMode<ContextError>> {
    literal(Caseless(name))
}

fn word<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-').parse_next(input)
}

fn integer(input: &mut &str) -> ModalResult<u32> {
    digit1.parse_to().parse_next(input)
}

fn duration(input: &mut &str) -> ModalResult<Duration> {
    let value: u64 = digit1.parse_to().parse_next(input)?;
    alt((
        keyword("us").value(Duration::from_micros(value)),
        keyword("ms").value(Duration::from_millis(value)),
        keyword("s").value(Duration::from_secs(value)),
    ))
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_is_a_console_trigger() {
        assert_eq!(
            parse("arm"),
            Ok(ConsoleCommand::Trigger(TriggerSource::Console))
        );
        assert_eq!(
            parse("  ARM \r\n"),
            Ok(ConsoleCommand::Trigger(TriggerSource::Console))
        );
    }

    #[test]
    fn trigger_defaults_to_button() {
        assert_eq!(
            parse("trigger"),
            Ok(ConsoleCommand::Trigger(TriggerSource::Button))
        );
        assert_eq!(
            parse("trigger remote"),
            Ok(ConsoleCommand::Trigger(TriggerSource::Remote))
        );
        assert_eq!(
            parse("trigger timer"),
            Ok(ConsoleCommand::Trigger(TriggerSource::Timer))
        );
    }

    #[test]
    fn durations_take_unit_suffixes() {
        assert_eq!(
            parse("advance 300ms"),
            Ok(ConsoleCommand::Advance(Duration::from_millis(300)))
        );
        assert_eq!(
            parse("advance 3s"),
            Ok(ConsoleCommand::Advance(Duration::from_secs(3)))
        );
        assert_eq!(
            parse("advance 250us"),
            Ok(ConsoleCommand::Advance(Duration::from_micros(250)))
        );
    }

    #[test]
    fn set_commands() {
        assert_eq!(
            parse("set toggle-count 9"),
            Ok(ConsoleCommand::Set(Setting::ToggleCount(9)))
        );
        assert_eq!(
            parse("set cycle-interval 5s"),
            Ok(ConsoleCommand::Set(Setting::CycleInterval(Duration::from_secs(5))))
        );
        assert_eq!(
            parse("set toggle-interval 500ms"),
            Ok(ConsoleCommand::Set(Setting::ToggleInterval(
                Duration::from_millis(500)
            )))
        );
        assert_eq!(
            parse("set debounce 50ms"),
            Ok(ConsoleCommand::Set(Setting::Debounce(Duration::from_millis(50))))
        );
    }

    #[test]
    fn help_topic_is_optional() {
        assert_eq!(parse("help"), Ok(ConsoleCommand::Help(None)));
        assert_eq!(parse("help set"), Ok(ConsoleCommand::Help(Some("set"))));
    }

    #[test]
    fn rejects_unknown_input() {
        assert_eq!(parse("   "), Err(ConsoleError::Empty));
        assert!(matches!(parse("launch"), Err(ConsoleError::Syntax { .. })));
        assert!(matches!(
            parse("advance 10"),
            Err(ConsoleError::Syntax { .. })
        ));
        assert!(matches!(
            parse("status now"),
            Err(ConsoleError::Syntax { .. })
        ));
    }
}
