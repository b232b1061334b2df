use std::path::{Path, PathBuf};

use super::{BoardError, BoardResult};

/// Flashes firmware onto the board and resets it
pub trait Programmer {
    fn write_firmware(&mut self, file_path: &Path, address: u32) -> BoardResult<()>;

    fn reset_board(&mut self) -> BoardResult<()>;
}

/// Picks the vendor tool for the current platform and checks that it is installed
#[cfg(not(feature = "mock"))]
pub fn detect() -> BoardResult<Box<dyn Programmer>> {
    if cfg!(windows) {
        Ok(Box::new(VendorTool::installed(VendorTool::ST_LINK_CLI, Flavor::StLinkCli)?))
    } else if cfg!(unix) {
        Ok(Box::new(VendorTool::installed(VendorTool::ST_FLASH, Flavor::StFlash)?))
    } else {
        Err(BoardError::UnsupportedPlatform)
    }
}

#[cfg(feature = "mock")]
pub fn detect() -> BoardResult<Box<dyn Programmer>> {
    log::warn!("Using mock programmer, firmware will not be written");
    Ok(Box::new(MockProgrammer))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "mock", allow(dead_code))]
enum Flavor {
    StLinkCli,
    StFlash,
}

/// An ST-Link command line utility
#[derive(Debug, Clone)]
pub struct VendorTool {
    path: PathBuf,
    flavor: Flavor,
}

#[cfg_attr(feature = "mock", allow(dead_code))]
impl VendorTool {
    const ST_LINK_CLI: &'static str = concat!(
        "c:\\program files (x86)\\STMicroelectronics\\STM32 ST-LINK Utility",
        "\\ST-LINK Utility\\ST-LINK_CLI.exe"
    );
    const ST_FLASH: &'static str = "/usr/local/bin/st-flash";

    fn installed(path: &str, flavor: Flavor) -> BoardResult<Self> {
        let path = PathBuf::from(path);
        if !path.is_file() {
            return Err(BoardError::ProgrammerMissing(path));
        }
        Ok(Self { path, flavor })
    }

    fn write_args(&self, file_path: &Path, address: u32) -> Vec<String> {
        let file = file_path.display().to_string();
        let address = format!("0x{address:08x}");
        match self.flavor {
            Flavor::StLinkCli => vec!["-P".into(), file, address],
            Flavor::StFlash => vec!["--reset".into(), "write".into(), file, address],
        }
    }

    fn reset_args(&self) -> Vec<String> {
        match self.flavor {
            Flavor::StLinkCli => vec!["-Rst".into()],
            Flavor::StFlash => vec!["reset".into()],
        }
    }

    fn execute(&self, args: &[String]) -> BoardResult<()> {
        log::info!("Running {} {}", self.path.display(), args.join(" "));
        let status = subprocess::Exec::cmd(&self.path).args(args).join()?;
        if !status.success() {
            log::error!("{} returned with {:?}", self.path.display(), status);
            return Err(BoardError::ProgrammerFailed(format!("{status:?}")));
        }
        Ok(())
    }
}

impl Programmer for VendorTool {
    fn write_firmware(&mut self, file_path: &Path, address: u32) -> BoardResult<()> {
        self.execute(&self.write_args(file_path, address))
    }

    fn reset_board(&mut self) -> BoardResult<()> {
        self.execute(&self.reset_args())
    }
}

/// This impl is only used when running without a debug probe
#[cfg(feature = "mock")]
pub struct MockProgrammer;

#[cfg(feature = "mock")]
impl Programmer for MockProgrammer {
    fn write_firmware(&mut self, file_path: &Path, address: u32) -> BoardResult<()> {
        log::info!("Mock write of {} to 0x{address:08x}", file_path.display());
        Ok(())
    }

    fn reset_board(&mut self) -> BoardResult<()> {
        log::info!("Mock reset");
        Ok(())
    }
}
