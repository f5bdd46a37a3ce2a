//! Hardware backends for the impulse cover.
//!
//! - `sim`: a simulated impulse gate driven by the same clock as the core
//! - `gpio` (feature `hardware`, Linux): Raspberry Pi pins through `rppal`

pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim;

pub use error::HwError;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::{GpioOutput, GpioSensor};
pub use sim::{GateOutput, GateSensor, Motion, SimulatedGate};
