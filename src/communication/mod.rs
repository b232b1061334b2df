mod serial;
pub use serial::{SerialInterface, SerialLink, SerialSettings};
mod voltmeter;
pub use voltmeter::{Acquisition, Sampler, VoltMeter};

use std::time::Duration;

pub type ComResult<T> = Result<T, CommunicationError>;

/// What a single `read` on an interface produced
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Raw bytes drained from a byte-oriented link
    Bytes(Vec<u8>),
    /// One scalar measurement, e.g. the mean DC voltage of an acquisition
    Scalar(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Capability {
    ReadWrite,
    ReadOnly,
}

/// Generic interface for accessing a DUT or an instrument attached to it
pub trait Interface {
    /// Human readable name, e.g. `Serial=/dev/ttyACM0`
    fn name(&self) -> &str;

    /// Identifies the physical endpoint. Two live interfaces must never share one.
    fn endpoint(&self) -> &str;

    fn capability(&self) -> Capability;

    fn read(&mut self) -> ComResult<Reading>;

    /// Transmits `text`. Read-only interfaces keep this default.
    fn write(&mut self, _text: &str) -> ComResult<()> {
        Err(CommunicationError::ReadOnly(self.name().to_string()))
    }
}

/// Delays applied around every transmission. The DUT needs time to process each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub before_write: Duration,
    pub after_write: Duration,
    /// Interval between checks of the output buffer while waiting for it to drain
    pub drain_poll: Duration,
}

impl SettlePolicy {
    /// No delays at all, for simulated links
    pub const fn immediate() -> Self {
        Self {
            before_write: Duration::ZERO,
            after_write: Duration::ZERO,
            drain_poll: Duration::ZERO,
        }
    }

    pub fn settle_before(&self) {
        pause(self.before_write);
    }

    pub fn settle_after(&self) {
        pause(self.after_write);
    }

    pub fn wait_drain(&self) {
        pause(self.drain_poll);
    }
}

impl Default for SettlePolicy {
    fn default() -> Self {
        let d = Duration::from_millis(100);
        Self { before_write: d, after_write: d, drain_poll: d }
    }
}

/// Sleeps for `duration`, skipping the syscall when it is zero
pub fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommunicationError {
    /// A write was attempted on an interface that can only be read
    #[error("{0}: This interface is read-only")]
    ReadOnly(String),
    /// Only ASCII text may be sent to the DUT
    #[error("Refusing to send non-ASCII text {0:?}")]
    NonAscii(String),
    /// Signals that a read or write timed out
    #[error("Communication timed out")]
    TimedOut,
    /// The sampling instrument returned no samples
    #[error("Acquisition returned no samples")]
    EmptyAcquisition,
    /// The interface produced a different kind of reading than the caller needs
    #[error("Expected a {expected} reading, got {got:?}")]
    UnexpectedReading { expected: &'static str, got: Reading },
    /// Signals that the underlying sending or receiving failed. Not recoverable on its own.
    #[error("Interface I/O failed: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for CommunicationError {
    fn from(value: std::io::Error) -> Self {
        match value.kind() {
            std::io::ErrorKind::TimedOut => CommunicationError::TimedOut,
            _ => CommunicationError::Io(value),
        }
    }
}
