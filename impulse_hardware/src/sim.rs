//! Simulated impulse gate.
//!
//! Models the controller behind a push-button input: a rising edge while
//! the motor runs stops it; a rising edge while stopped starts it in the
//! direction opposite to its last run. At a travel end the motor stays
//! latched "running" until the next pulse, like a controller that cuts
//! power on its limit switch but keeps its sequence state.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use impulse_traits::{BinaryOutput, BinarySensor, Clock, HwResult};

use crate::error::HwError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Stopped,
    Opening,
    Closing,
}

#[derive(Debug)]
struct GateModel {
    position: f32,
    motion: Motion,
    /// Direction of the most recent run; the next start goes the other way.
    last_run: Motion,
    updated_at: Instant,
    open_ms: u64,
    close_ms: u64,
    level: bool,
    pulses: u64,
    sensors_disconnected: bool,
}

impl GateModel {
    fn advance(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.updated_at).as_secs_f32() * 1_000.0;
        self.updated_at = now;
        let delta = match self.motion {
            Motion::Stopped => return,
            Motion::Opening => dt / self.open_ms.max(1) as f32,
            Motion::Closing => -dt / self.close_ms.max(1) as f32,
        };
        self.position = (self.position + delta).clamp(0.0, 1.0);
    }

    fn write(&mut self, high: bool, now: Instant) {
        self.advance(now);
        if high && !self.level {
            self.pulses += 1;
            self.motion = match self.motion {
                Motion::Opening | Motion::Closing => Motion::Stopped,
                Motion::Stopped => {
                    let next = match self.last_run {
                        Motion::Opening => Motion::Closing,
                        _ => Motion::Opening,
                    };
                    self.last_run = next;
                    next
                }
            };
            tracing::trace!(
                motion = ?self.motion,
                position = self.position,
                "simulated gate pulse"
            );
        }
        self.level = high;
    }
}

/// Shared handle to one simulated gate. Clones observe the same gate.
#[derive(Clone)]
pub struct SimulatedGate {
    model: Arc<Mutex<GateModel>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for SimulatedGate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedGate")
            .field("position", &self.position())
            .field("motion", &self.motion())
            .finish()
    }
}

impl SimulatedGate {
    /// A closed gate with the given full-travel times.
    pub fn new(clock: Arc<dyn Clock + Send + Sync>, open_ms: u64, close_ms: u64) -> Self {
        let now = clock.now();
        Self {
            model: Arc::new(Mutex::new(GateModel {
                position: 0.0,
                motion: Motion::Stopped,
                last_run: Motion::Closing,
                updated_at: now,
                open_ms,
                close_ms,
                level: false,
                pulses: 0,
                sensors_disconnected: false,
            })),
            clock,
        }
    }

    /// Place the gate at `position`; the next start heads for the farther end.
    pub fn with_position(self, position: f32) -> Self {
        if let Ok(mut m) = self.model.lock() {
            m.position = position.clamp(0.0, 1.0);
            m.last_run = if m.position < 0.5 {
                Motion::Closing
            } else {
                Motion::Opening
            };
        }
        self
    }

    pub fn output(&self) -> GateOutput {
        GateOutput { gate: self.clone() }
    }

    pub fn open_sensor(&self) -> GateSensor {
        GateSensor {
            gate: self.clone(),
            end: End::Open,
        }
    }

    pub fn close_sensor(&self) -> GateSensor {
        GateSensor {
            gate: self.clone(),
            end: End::Closed,
        }
    }

    /// Make sensor reads fail as if the wiring were cut.
    pub fn set_sensors_disconnected(&self, disconnected: bool) {
        if let Ok(mut m) = self.model.lock() {
            m.sensors_disconnected = disconnected;
        }
    }

    pub fn position(&self) -> f32 {
        self.with_model(|m| m.position).unwrap_or(f32::NAN)
    }

    pub fn motion(&self) -> Motion {
        self.with_model(|m| m.motion).unwrap_or(Motion::Stopped)
    }

    pub fn pulses(&self) -> u64 {
        self.with_model(|m| m.pulses).unwrap_or(0)
    }

    fn with_model<T>(&self, f: impl FnOnce(&mut GateModel) -> T) -> Result<T, HwError> {
        let now = self.clock.now();
        let mut m = self
            .model
            .lock()
            .map_err(|_| HwError::Poisoned)?;
        m.advance(now);
        Ok(f(&mut m))
    }
}

/// The gate's push-button input.
#[derive(Debug, Clone)]
pub struct GateOutput {
    gate: SimulatedGate,
}

impl BinaryOutput for GateOutput {
    fn write(&mut self, high: bool) -> HwResult<()> {
        let now = self.gate.clock.now();
        self.gate.with_model(|m| m.write(high, now))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Open,
    Closed,
}

/// An end-stop on the simulated gate. Reports high at its end of travel.
#[derive(Debug, Clone)]
pub struct GateSensor {
    gate: SimulatedGate,
    end: End,
}

impl BinarySensor for GateSensor {
    fn read(&mut self) -> HwResult<bool> {
        let end = self.end;
        let (disconnected, position) = self
            .gate
            .with_model(|m| (m.sensors_disconnected, m.position))?;
        if disconnected {
            let which = match end {
                End::Open => "open end-stop",
                End::Closed => "close end-stop",
            };
            return Err(Box::new(HwError::Disconnected(which.into())));
        }
        Ok(match end {
            End::Open => position >= 1.0,
            End::Closed => position <= 0.0,
        })
    }
}
