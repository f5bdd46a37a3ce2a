use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CoverError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("safety lockout active")]
    Lockout,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing output")]
    MissingOutput,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
