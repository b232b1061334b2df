use std::path::{Path, PathBuf};

use crate::communication::{CommunicationError, Interface};

mod programmer;
pub use programmer::{detect, Programmer, VendorTool};
#[cfg(feature = "mock")]
pub use programmer::MockProgrammer;

pub type BoardResult<T> = Result<T, BoardError>;

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Firmware file {0} does not exist")]
    FirmwareMissing(PathBuf),
    #[error("Required {0} not installed or configuration is incorrect")]
    ProgrammerMissing(PathBuf),
    #[error("Only Windows and Linux environments currently supported")]
    UnsupportedPlatform,
    /// The vendor tool ran but reported failure
    #[error("Programmer failed with {0}")]
    ProgrammerFailed(String),
    #[error("Programmer could not be started: {0}")]
    Spawn(#[from] subprocess::PopenError),
    #[error("Can't open serial port {port}: {source}")]
    SerialPort { port: String, source: serialport::Error },
    #[error("Interface name {0:?} is already bound")]
    InterfaceInUse(String),
    #[error("Endpoint {endpoint} is already held by interface {holder:?}")]
    EndpointInUse { endpoint: String, holder: String },
    #[error("No interface named {0:?}")]
    UnknownInterface(String),
    #[error("No default interface set")]
    NoDefaultInterface,
    #[error(transparent)]
    Communication(#[from] CommunicationError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A firmware image on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firmware {
    path: PathBuf,
}

impl Firmware {
    /// Start of flash on STM32 parts
    pub const DEFAULT_ADDRESS: u32 = 0x0800_0000;

    pub fn new(path: impl Into<PathBuf>) -> BoardResult<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(BoardError::FirmwareMissing(path));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// The hardware the DUT runs on, the interfaces attached to it and the programmer that resets it
pub struct Board {
    name: String,
    interfaces: Vec<(String, Box<dyn Interface>)>,
    default_interface: Option<String>,
    programmer: Box<dyn Programmer>,
}

impl Board {
    pub fn new(name: impl Into<String>, programmer: Box<dyn Programmer>) -> Self {
        Self { name: name.into(), interfaces: Vec::new(), default_interface: None, programmer }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers `interface` under `name`. Fails if the name is taken or another interface
    /// already holds the same endpoint.
    pub fn add_interface(&mut self, name: &str, interface: Box<dyn Interface>) -> BoardResult<()> {
        if self.interfaces.iter().any(|(n, _)| n == name) {
            return Err(BoardError::InterfaceInUse(name.to_string()));
        }
        if let Some((holder, _)) =
            self.interfaces.iter().find(|(_, i)| i.endpoint() == interface.endpoint())
        {
            return Err(BoardError::EndpointInUse {
                endpoint: interface.endpoint().to_string(),
                holder: holder.clone(),
            });
        }

        log::info!("Adding interface {name}: {} ({})", interface.name(), interface.capability());
        self.interfaces.push((name.to_string(), interface));
        Ok(())
    }

    /// Releases the interface bound to `name`, returning it to the caller
    pub fn remove_interface(&mut self, name: &str) -> Option<Box<dyn Interface>> {
        let index = self.interfaces.iter().position(|(n, _)| n == name)?;
        if self.default_interface.as_deref() == Some(name) {
            self.default_interface = None;
        }
        Some(self.interfaces.remove(index).1)
    }

    pub fn set_default_interface(&mut self, name: &str) -> BoardResult<()> {
        if !self.interfaces.iter().any(|(n, _)| n == name) {
            return Err(BoardError::UnknownInterface(name.to_string()));
        }
        self.default_interface = Some(name.to_string());
        Ok(())
    }

    pub fn default_interface_name(&self) -> Option<&str> {
        self.default_interface.as_deref()
    }

    pub fn default_interface(&mut self) -> BoardResult<&mut dyn Interface> {
        let name = self.default_interface.clone().ok_or(BoardError::NoDefaultInterface)?;
        self.interface(&name)
    }

    pub fn interface(&mut self, name: &str) -> BoardResult<&mut dyn Interface> {
        match self.interfaces.iter_mut().find(|(n, _)| n == name) {
            Some((_, interface)) => Ok(interface.as_mut()),
            None => Err(BoardError::UnknownInterface(name.to_string())),
        }
    }

    pub fn interface_names(&self) -> impl Iterator<Item = &str> {
        self.interfaces.iter().map(|(n, _)| n.as_str())
    }

    pub fn reset(&mut self) -> BoardResult<()> {
        log::debug!("Resetting {}", self.name);
        self.programmer.reset_board()
    }

    /// Writes `firmware` to flash at `address`
    pub fn program(&mut self, firmware: &Firmware, address: u32) -> BoardResult<()> {
        let path = std::fs::canonicalize(firmware.path())?;
        log::info!("Writing {} to {} at 0x{address:08x}", path.display(), self.name);
        self.programmer.write_firmware(&path, address)
    }
}

/// Device under test: the firmware running on a board
pub struct Dut {
    firmware: Firmware,
    board: Board,
    name: String,
}

impl Dut {
    pub fn new(firmware: Firmware, board: Board, name: impl Into<String>) -> Self {
        Self { firmware, board, name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn firmware(&self) -> &Firmware {
        &self.firmware
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    /// Writes the DUT's firmware to the board again
    pub fn reprogram(&mut self, address: u32) -> BoardResult<()> {
        self.board.program(&self.firmware, address)
    }
}
