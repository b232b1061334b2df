pub mod board;
pub mod command;
pub mod communication;
pub mod config;
pub mod error;
pub mod scoreboard;
pub mod sequencer;
pub mod testcases;

pub use error::{HarnessError, HarnessResult};
