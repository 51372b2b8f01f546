use thiserror::Error;

use crate::types::FlowStatus;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
    #[error("gas port {port} out of range [1, {max}]")]
    InvalidPort { port: u8, max: u8 },
    #[error("flow regulation failed: {0}")]
    Regulation(FlowStatus),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing hardware generation")]
    MissingHardware,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
