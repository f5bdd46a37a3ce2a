#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control core for impulse-driven covers (hardware-agnostic).
//!
//! The motor controller behind the cover only understands one push-button
//! input: each pulse starts, stops or reverses it. This crate tracks what
//! the cover is doing from that alone, plus optional end-stop sensors. All
//! hardware access goes through `impulse_traits::BinaryOutput` and
//! `impulse_traits::BinarySensor`.
//!
//! ## Architecture
//!
//! - **Pulse Emitter** (`pulse`): fixed-width pulses with minimum spacing
//! - **Travel Timer** (`travel`): time-interpolated position per session
//! - **Sensor Reconciler** (`sensors`): end-stops with inversion
//! - **Safety Interlock** (`safety`): rolling cycle window, run-time guard
//! - **Cover State Machine** (`cover`): commands, ticks, events
//!
//! Time is integer milliseconds since the cover was built, read from an
//! injected `Clock`.

pub mod builder;
pub mod config;
pub mod conversions;
pub mod cover;
pub mod error;
pub mod events;
pub mod hw_error;
pub mod mocks;
pub mod pulse;
pub mod runner;
pub mod safety;
pub mod sensors;
pub mod travel;
pub mod types;
pub mod util;

pub use builder::{CoverBuilder, Missing, Set};
pub use config::{SafetyCfg, SensorCfg, TimingCfg};
pub use cover::ImpulseCover;
pub use error::{BuildError, CoverError, Report, Result};
pub use events::{ChannelSink, CoverEvent, EventSink, NoopSink};
pub use pulse::PULSE_WIDTH_MS;
pub use types::{
    CommandOutcome, Confidence, CoverCommand, CoverOperation, CoverReport, CoverState,
    CoverTraits, Direction, IgnoreReason, PositionEstimate, RejectReason,
};
