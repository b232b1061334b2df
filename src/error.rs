use crate::{
    board::BoardError, command::CommandError, communication::CommunicationError,
    config::ConfigError,
};

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Board bring-up or programming failed. Fatal, never retried.
    #[error("Setup: {0}")]
    Board(#[from] BoardError),
    #[error("Configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Command: {0}")]
    Command(#[from] CommandError),
    /// Transport failure or protocol violation while a test case runs
    #[error("Communication: {0}")]
    Communication(#[from] CommunicationError),
    /// The progress report could not be written
    #[error("Report: {0}")]
    Report(#[source] std::io::Error),
}
