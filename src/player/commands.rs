//! Control commands read from stdin

use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Position as a fraction of the media duration
    Fraction(f64),
    Seconds(f64),
}

impl SeekTarget {
    /// Resolve to seconds, `None` for a fraction of an unknown duration
    pub fn to_seconds(self, duration: Option<f64>) -> Option<f64> {
        match self {
            SeekTarget::Fraction(f) => duration.map(|d| f.clamp(0.0, 1.0) * d),
            SeekTarget::Seconds(s) => Some(s.max(0.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Seek(SeekTarget),
    Volume(f32),
    Mute(bool),
    QuickPreview(bool),
    Info,
    Unload,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseCommandError(String);

fn number<T: FromStr>(command: &str, arg: Option<&str>) -> Result<T, ParseCommandError> {
    let arg = arg.ok_or_else(|| ParseCommandError(format!("{} needs a value", command)))?;
    arg.parse()
        .map_err(|_| ParseCommandError(format!("{}: invalid value \"{}\"", command, arg)))
}

fn flag(command: &str, arg: Option<&str>) -> Result<bool, ParseCommandError> {
    match arg {
        Some("true") | Some("on") | Some("1") => Ok(true),
        Some("false") | Some("off") | Some("0") => Ok(false),
        // A bare flag command switches it on
        None => Ok(true),
        Some(other) => Err(ParseCommandError(format!(
            "{}: expected true or false, got \"{}\"",
            command, other
        ))),
    }
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Err(ParseCommandError("empty command".into()));
        };
        let name = name.to_lowercase();
        let arg = parts.next();

        let command = match name.as_str() {
            "play" => Command::Play,
            "pause" => Command::Pause,
            "seek" => {
                let raw = arg.ok_or_else(|| ParseCommandError("seek needs a position".into()))?;
                let target = match raw.strip_suffix('s') {
                    Some(secs) => SeekTarget::Seconds(number("seek", Some(secs))?),
                    None => SeekTarget::Fraction(number("seek", Some(raw))?),
                };
                match target {
                    SeekTarget::Fraction(f) | SeekTarget::Seconds(f) if !f.is_finite() || f < 0.0 => {
                        return Err(ParseCommandError(format!("seek: invalid position \"{}\"", raw)));
                    }
                    SeekTarget::Fraction(f) if f > 1.0 => {
                        return Err(ParseCommandError(format!(
                            "seek: fraction {} is past the end, use {}s for seconds",
                            f, f
                        )));
                    }
                    _ => {}
                }
                Command::Seek(target)
            }
            "volume" => Command::Volume(number("volume", arg)?),
            "mute" => Command::Mute(flag("mute", arg)?),
            "quickpreview" => Command::QuickPreview(flag("quickpreview", arg)?),
            "info" | "getinfo" => Command::Info,
            "unload" => Command::Unload,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseCommandError(format!("unknown command \"{}\"", other))),
        };
        Ok(command)
    }
}
