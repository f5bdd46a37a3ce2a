//! `From` implementations bridging `impulse_config` types to `impulse_core` types.

use crate::config::{SafetyCfg, SensorCfg, TimingCfg};

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&impulse_config::CoverCfg> for TimingCfg {
    fn from(c: &impulse_config::CoverCfg) -> Self {
        Self {
            open_ms: c.open_duration,
            close_ms: c.close_duration,
            pulse_delay_ms: c.pulse_delay,
            pulse_on_completion: c.pulse_on_completion,
        }
    }
}

// ── SafetyCfg ────────────────────────────────────────────────────────────────

impl From<&impulse_config::Safety> for SafetyCfg {
    fn from(c: &impulse_config::Safety) -> Self {
        Self {
            timeout_ms: c.timeout,
            max_cycles: c.max_cycles,
        }
    }
}

// ── SensorCfg ────────────────────────────────────────────────────────────────

impl From<&impulse_config::Sensors> for SensorCfg {
    fn from(c: &impulse_config::Sensors) -> Self {
        Self {
            open_inverted: c.open_inverted,
            close_inverted: c.close_inverted,
        }
    }
}
