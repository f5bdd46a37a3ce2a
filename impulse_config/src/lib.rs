#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for an impulse-driven cover.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Durations accept integer milliseconds or unit strings (`"500ms"`,
//!   `"15s"`, `"2min"`, `"1h"`).
use serde::Deserialize;
use serde::de::Deserializer;

/// Inclusive bounds for `safety.max_cycles`.
pub const MAX_CYCLES_RANGE: std::ops::RangeInclusive<u8> = 1..=20;

#[derive(Debug, Deserialize)]
pub struct Pins {
    /// GPIO driving the controller's impulse input.
    pub output: u8,
    pub open_sensor: Option<u8>,
    pub close_sensor: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct CoverCfg {
    #[serde(deserialize_with = "de_duration_ms")]
    pub open_duration: u64,
    #[serde(deserialize_with = "de_duration_ms")]
    pub close_duration: u64,
    /// Minimum spacing between two pulses.
    #[serde(default = "default_pulse_delay", deserialize_with = "de_duration_ms")]
    pub pulse_delay: u64,
    /// Emit a stop pulse when a full travel completes. Disable for
    /// controllers that stop on their own limit switches.
    #[serde(default = "default_true")]
    pub pulse_on_completion: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Safety {
    /// Rolling window for the cycle counter, also the longest allowed
    /// continuous movement.
    #[serde(deserialize_with = "de_duration_ms")]
    pub timeout: u64,
    pub max_cycles: u8,
}

impl Default for Safety {
    fn default() -> Self {
        Self {
            timeout: 60_000,
            max_cycles: 5,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Sensors {
    pub open_inverted: bool,
    pub close_inverted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Control loop polling interval.
    #[serde(deserialize_with = "de_duration_ms")]
    pub tick: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self { tick: 50 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    pub cover: CoverCfg,
    #[serde(default)]
    pub safety: Safety,
    #[serde(default)]
    pub sensors: Sensors,
    #[serde(default)]
    pub runner: RunnerCfg,
    #[serde(default)]
    pub logging: Logging,
}

const fn default_pulse_delay() -> u64 {
    500
}

const fn default_true() -> bool {
    true
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DurationToml {
    Millis(u64),
    Text(String),
}

fn de_duration_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match DurationToml::deserialize(deserializer)? {
        DurationToml::Millis(ms) => Ok(ms),
        DurationToml::Text(s) => parse_duration_ms(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a duration string such as `"500ms"`, `"15s"`, `"1.5s"`, `"2min"`
/// or `"1h"` into whole milliseconds. A bare number is milliseconds.
pub fn parse_duration_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    if num.is_empty() {
        return Err(format!("invalid duration {s:?}: missing number"));
    }
    let value: f64 = num
        .parse()
        .map_err(|_| format!("invalid duration {s:?}: bad number"))?;
    let scale = match unit.trim() {
        "" | "ms" => 1.0,
        "s" => 1_000.0,
        "min" => 60_000.0,
        "h" => 3_600_000.0,
        other => return Err(format!("invalid duration {s:?}: unknown unit {other:?}")),
    };
    let ms = (value * scale).round();
    if !ms.is_finite() || ms < 0.0 || ms > u64::MAX as f64 {
        return Err(format!("invalid duration {s:?}: out of range"));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(ms as u64)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Cover
        if self.cover.open_duration == 0 {
            eyre::bail!("cover.open_duration must be > 0");
        }
        if self.cover.close_duration == 0 {
            eyre::bail!("cover.close_duration must be > 0");
        }
        if self.cover.pulse_delay == 0 {
            eyre::bail!("cover.pulse_delay must be > 0");
        }
        if self.cover.pulse_delay > 60_000 {
            eyre::bail!("cover.pulse_delay is unreasonably large (>60s)");
        }

        // Safety
        if self.safety.timeout == 0 {
            eyre::bail!("safety.timeout must be > 0");
        }
        if !MAX_CYCLES_RANGE.contains(&self.safety.max_cycles) {
            eyre::bail!("safety.max_cycles must be in [1, 20]");
        }

        // Runner
        if self.runner.tick == 0 {
            eyre::bail!("runner.tick must be >= 1ms");
        }
        if self.runner.tick > 1_000 {
            eyre::bail!("runner.tick is unreasonably large (>1s)");
        }

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }

    /// Non-fatal inconsistencies worth a log line at startup.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.sensors.open_inverted && self.pins.open_sensor.is_none() {
            out.push("sensors.open_inverted is set but no open sensor is wired".to_string());
        }
        if self.sensors.close_inverted && self.pins.close_sensor.is_none() {
            out.push("sensors.close_inverted is set but no close sensor is wired".to_string());
        }
        let longest = self.cover.open_duration.max(self.cover.close_duration);
        if self.safety.timeout <= longest {
            out.push(format!(
                "safety.timeout ({} ms) does not exceed the longest travel ({} ms); full runs will trip the movement guard",
                self.safety.timeout, longest
            ));
        }
        out
    }

    /// Multi-line human summary of the effective configuration.
    pub fn summary(&self) -> String {
        let sensor = |pin: Option<u8>, inverted: bool| match pin {
            Some(p) => format!("pin {p}{}", if inverted { " (inverted)" } else { "" }),
            None => "not wired".to_string(),
        };
        format!(
            "Impulse Cover:\n  Output: pin {}\n  Open Duration: {}ms\n  Close Duration: {}ms\n  Pulse Delay: {}ms\n  Pulse On Completion: {}\n  Safety Timeout: {}ms\n  Safety Max Cycles: {}\n  Open Sensor: {}\n  Close Sensor: {}\n  Tick: {}ms",
            self.pins.output,
            self.cover.open_duration,
            self.cover.close_duration,
            self.cover.pulse_delay,
            if self.cover.pulse_on_completion { "YES" } else { "NO" },
            self.safety.timeout,
            self.safety.max_cycles,
            sensor(self.pins.open_sensor, self.sensors.open_inverted),
            sensor(self.pins.close_sensor, self.sensors.close_inverted),
            self.runner.tick,
        )
    }
}
