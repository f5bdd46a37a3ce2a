//! Configuration types for the cover core.
//!
//! These are the runtime configuration structs used by `ImpulseCover`.
//! They are separate from the TOML-deserialized config in `impulse_config`.

/// Travel and pulse timing.
#[derive(Debug, Clone)]
pub struct TimingCfg {
    /// Full travel time from closed to open (ms).
    pub open_ms: u64,
    /// Full travel time from open to closed (ms).
    pub close_ms: u64,
    /// Minimum spacing between two pulses, lets relays settle (ms).
    pub pulse_delay_ms: u64,
    /// Emit a stop pulse when a full travel completes.
    pub pulse_on_completion: bool,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            open_ms: 15_000,
            close_ms: 15_000,
            pulse_delay_ms: 500,
            pulse_on_completion: true,
        }
    }
}

/// Safety interlock limits.
#[derive(Debug, Clone)]
pub struct SafetyCfg {
    /// Rolling window for counting cycle starts; also the longest allowed
    /// continuous movement (ms).
    pub timeout_ms: u64,
    /// Cycle starts allowed inside one window. Range: [1, 20].
    pub max_cycles: u8,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            max_cycles: 5,
        }
    }
}

/// Per-sensor signal inversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorCfg {
    pub open_inverted: bool,
    pub close_inverted: bool,
}
