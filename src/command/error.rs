use crate::communication::CommunicationError;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The value can not be sent as a command. Raised before any transport I/O.
    #[error("Given value {0} is out of range")]
    OutOfRange(i64),
    /// The text is not an accepted command
    #[error("{0:?} is not a valid command")]
    Invalid(String),
    #[error(transparent)]
    Communication(#[from] CommunicationError),
}
