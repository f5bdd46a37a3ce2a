use thiserror::Error;

/// Errors raised by the backends behind `BinaryOutput` / `BinarySensor`.
#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    /// The line reads nothing usable (unplugged sensor, cut wire).
    #[error("disconnected: {0}")]
    Disconnected(String),
    #[error("simulated gate state poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, HwError>;
