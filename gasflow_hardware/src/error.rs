use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("flow sensor read failed: {0}")]
    FlowRead(String),
    #[error("vacuum sensor read failed: {0}")]
    VacuumRead(String),
    #[error("pump voltage rejected: {0}")]
    PumpVoltage(u8),
    #[error("sensor read timeout")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
