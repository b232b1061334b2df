use std::{
    io::{Read, Write},
    time::Duration,
};

use serialport::{DataBits, Parity, StopBits};

use super::{Capability, ComResult, CommunicationError, Interface, Reading, SettlePolicy};

/// A byte link that can report how much data is waiting in either direction
pub trait SerialLink: Read + Write {
    /// Number of received bytes waiting to be read
    fn bytes_to_read(&self) -> std::io::Result<u32>;
    /// Number of bytes still queued for transmission
    fn bytes_to_write(&self) -> std::io::Result<u32>;
}

impl SerialLink for Box<dyn serialport::SerialPort> {
    fn bytes_to_read(&self) -> std::io::Result<u32> {
        Ok(serialport::SerialPort::bytes_to_read(self.as_ref())?)
    }

    fn bytes_to_write(&self) -> std::io::Result<u32> {
        Ok(serialport::SerialPort::bytes_to_write(self.as_ref())?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baudrate: u32,
    pub timeout: Duration,
}

impl SerialSettings {
    pub const DEFAULT_BAUDRATE: u32 = 115200;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn new(port: impl Into<String>) -> Self {
        Self { port: port.into(), baudrate: Self::DEFAULT_BAUDRATE, timeout: Self::DEFAULT_TIMEOUT }
    }
}

/// Serial connection to the DUT, 8N1 without flow control
pub struct SerialInterface<L: SerialLink = Box<dyn serialport::SerialPort>> {
    name: String,
    endpoint: String,
    link: L,
    settle: SettlePolicy,
}

impl SerialInterface {
    /// Opens the port described by `settings`
    pub fn open(settings: &SerialSettings, settle: SettlePolicy) -> serialport::Result<Self> {
        let port = serialport::new(&settings.port, settings.baudrate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(settings.timeout)
            .open()?;
        log::info!("Opened {} at {} baud", settings.port, settings.baudrate);

        Ok(Self::with_link(&settings.port, port, settle))
    }
}

impl<L: SerialLink> SerialInterface<L> {
    /// Wraps an already open link. `port` names the endpoint.
    pub fn with_link(port: &str, link: L, settle: SettlePolicy) -> Self {
        Self { name: format!("Serial={port}"), endpoint: port.to_string(), link, settle }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn settle_policy(&self) -> SettlePolicy {
        self.settle
    }
}

impl<L: SerialLink> Interface for SerialInterface<L> {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn capability(&self) -> Capability {
        Capability::ReadWrite
    }

    /// Drains whatever is currently buffered. Never waits for more data to arrive.
    fn read(&mut self) -> ComResult<Reading> {
        let mut result = Vec::new();
        self.link.flush()?;

        loop {
            let waiting = self.link.bytes_to_read()? as usize;
            if waiting == 0 {
                break;
            }

            let mut buffer = vec![0; waiting];
            let n = self.link.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            result.extend_from_slice(&buffer[..n]);
        }

        Ok(Reading::Bytes(result))
    }

    /// Sends `text` and blocks until the output buffer has drained
    fn write(&mut self, text: &str) -> ComResult<()> {
        if !text.is_ascii() {
            return Err(CommunicationError::NonAscii(text.to_string()));
        }

        self.settle.settle_before();
        self.link.write_all(text.as_bytes())?;
        while self.link.bytes_to_write()? > 0 {
            self.settle.wait_drain();
        }
        self.settle.settle_after();

        Ok(())
    }
}
