use crate::communication::{CommunicationError, Interface, Reading};
use std::{fmt, str::FromStr};

mod error;
pub use error::CommandError;
mod validation;
pub use validation::is_valid;

pub type CommandResult<T> = Result<T, CommandError>;

/// Terminates every line sent to the DUT
pub const DELIMITER: char = '\r';

/// A value the DUT accepts, between 0 and 2000 inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Command(u16);

impl Command {
    pub const MIN: u16 = 0;
    pub const MAX: u16 = 2000;
    /// Longest textual form the DUT reads
    pub const MAX_DIGITS: usize = 4;

    pub fn new(value: i64) -> CommandResult<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u16))
        } else {
            Err(CommandError::OutOfRange(value))
        }
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    /// Every command from `MIN` to `MAX` in ascending order
    pub fn all() -> impl Iterator<Item = Command> {
        (Self::MIN..=Self::MAX).map(Command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Command {
    type Error = CommandError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_valid(s) {
            return Err(CommandError::Invalid(s.to_string()));
        }
        let digits = s.trim_end_matches(['\r', '\n', '\0']);
        digits.parse::<u16>().map(Command).map_err(|_| CommandError::Invalid(s.to_string()))
    }
}

impl From<Command> for u16 {
    fn from(value: Command) -> Self {
        value.0
    }
}

/// Returns the line that transmits `command`: its decimal text followed by `\r`
pub fn encode(command: Command) -> String {
    format!("{command}{DELIMITER}")
}

/// Converts received bytes to characters one-to-one. Nothing is trimmed.
pub fn decode(raw: &[u8]) -> String {
    raw.iter().map(|&b| b as char).collect()
}

/// Strips NUL, CR, LF and space from both ends of `input`
pub fn remove_whitespace(input: &str) -> &str {
    input.trim_matches(['\0', '\r', '\n', ' '])
}

/// Writes a value to `interface`. Values outside of 0..=2000 are rejected before anything is sent.
pub fn write_value(interface: &mut dyn Interface, value: i64) -> CommandResult<Command> {
    let command = Command::new(value)?;
    write_command(interface, command)?;
    Ok(command)
}

pub fn write_command(interface: &mut dyn Interface, command: Command) -> CommandResult<()> {
    let line = encode(command);
    interface.write(&line)?;
    log::debug!("WRITE: {line:?}");
    Ok(())
}

/// Sends `text` followed by the delimiter without validating it first
pub fn write_raw(interface: &mut dyn Interface, text: &str) -> CommandResult<()> {
    let line = format!("{text}{DELIMITER}");
    interface.write(&line)?;
    log::debug!("WRITE: {line:?}");
    Ok(())
}

/// Reads one value from `interface` as a string
pub fn read_value(interface: &mut dyn Interface) -> CommandResult<String> {
    let value = match interface.read()? {
        Reading::Bytes(bytes) => decode(&bytes),
        Reading::Scalar(v) => v.to_string(),
    };
    log::debug!("READ: {value:?}");
    Ok(value)
}

/// Reads one scalar measurement from `interface`
pub fn read_voltage(interface: &mut dyn Interface) -> CommandResult<f64> {
    match interface.read()? {
        Reading::Scalar(v) => {
            log::debug!("READ: {v}V");
            Ok(v)
        }
        got => Err(CommunicationError::UnexpectedReading { expected: "scalar", got }.into()),
    }
}
