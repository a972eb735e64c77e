//! Line commands read from stdin

use std::path::PathBuf;

use radiomusic_core::dsp::combine;
use radiomusic_core::ModuleCommand;

pub const HELP: &str = "\
commands:
  root <dir>      scan a new sample root
  bank            enter/leave bank select mode
  next            press reset (next bank while selecting)
  reset           press reset
  station <0-1> [cv]   station knob, plus optional CV in volts
  start <0-1> [cv]     start / pitch knob, plus optional CV in volts
  loop | xfade | sort | all | stereo | pitch   toggle a setting
  clear           release the current bank
  save            copy the current bank to patch storage
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Module(ModuleCommand),
    Station(f32),
    Start(f32),
    Reset,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("'{0}' is not a number between 0 and 1")]
    BadValue(String),
    #[error("'{0}' is not a voltage")]
    BadVoltage(String),
}

/// Knob position with an optional CV offset, as the module sums them
fn knob(arg: Option<&str>, name: &'static str) -> Result<f32, ParseError> {
    let mut words = arg.ok_or(ParseError::MissingArgument(name))?.split_whitespace();
    let text = words.next().ok_or(ParseError::MissingArgument(name))?;
    let value = match text.parse::<f32>() {
        Ok(v) if (0.0..=1.0).contains(&v) => v,
        _ => return Err(ParseError::BadValue(text.to_string())),
    };

    let cv = match words.next() {
        Some(text) => text
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParseError::BadVoltage(text.to_string()))?,
        None => 0.0,
    };
    Ok(combine(value, cv))
}

/// Parse one input line; empty lines yield `None`
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (line, None),
    };

    let command = match word {
        "" => return Ok(None),
        "root" => {
            let dir = rest.ok_or(ParseError::MissingArgument("root"))?;
            ConsoleCommand::Module(ModuleCommand::SetRootDir(PathBuf::from(dir)))
        }
        "bank" => ConsoleCommand::Module(ModuleCommand::ToggleBankSelect),
        "clear" => ConsoleCommand::Module(ModuleCommand::ClearBank),
        "save" => ConsoleCommand::Module(ModuleCommand::SaveBank),
        "loop" => ConsoleCommand::Module(ModuleCommand::ToggleLooping),
        "xfade" => ConsoleCommand::Module(ModuleCommand::ToggleCrossfade),
        "sort" => ConsoleCommand::Module(ModuleCommand::ToggleSort),
        "all" => ConsoleCommand::Module(ModuleCommand::ToggleAllowAllFiles),
        "stereo" => ConsoleCommand::Module(ModuleCommand::ToggleStereo),
        "pitch" => ConsoleCommand::Module(ModuleCommand::TogglePitch),
        "station" => ConsoleCommand::Station(knob(rest, "station")?),
        "start" => ConsoleCommand::Start(knob(rest, "start")?),
        "next" | "reset" => ConsoleCommand::Reset,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}
