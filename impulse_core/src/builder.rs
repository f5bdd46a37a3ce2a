//! Type-state builder for `ImpulseCover`.
//!
//! The output is the one mandatory collaborator, so `build()` only exists
//! once `with_output` has been called. `try_build()` is always available
//! and reports what is missing at runtime.

use std::marker::PhantomData;
use std::sync::Arc;

use impulse_traits::{BinaryOutput, BinarySensor, Clock, MonotonicClock};

use crate::config::{SafetyCfg, SensorCfg, TimingCfg};
use crate::cover::ImpulseCover;
use crate::error::{BuildError, Result};
use crate::events::{EventSink, NoopSink};
use crate::pulse::PulseEmitter;
use crate::safety::SafetyInterlock;
use crate::sensors::{EndStop, SensorReconciler};
use crate::travel::TravelTimer;
use crate::types::{CoverState, PositionEstimate};

impl ImpulseCover {
    /// Start building a cover.
    pub fn builder() -> CoverBuilder<Missing> {
        CoverBuilder::default()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct CoverBuilder<O> {
    output: Option<Box<dyn BinaryOutput>>,
    timing: Option<TimingCfg>,
    safety: Option<SafetyCfg>,
    sensor_cfg: SensorCfg,
    open_sensor: Option<Box<dyn BinarySensor>>,
    close_sensor: Option<Box<dyn BinarySensor>>,
    sink: Option<Box<dyn EventSink>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _o: PhantomData<O>,
}

impl Default for CoverBuilder<Missing> {
    fn default() -> Self {
        Self {
            output: None,
            timing: None,
            safety: None,
            sensor_cfg: SensorCfg::default(),
            open_sensor: None,
            close_sensor: None,
            sink: None,
            clock: None,
            _o: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Range sanity only; user-facing validation lives in `impulse_config`.
fn validate(timing: &TimingCfg, safety: &SafetyCfg) -> Result<()> {
    if timing.open_ms == 0 {
        return Err(invalid("open duration must be > 0"));
    }
    if timing.close_ms == 0 {
        return Err(invalid("close duration must be > 0"));
    }
    if timing.pulse_delay_ms == 0 {
        return Err(invalid("pulse delay must be > 0"));
    }
    if safety.timeout_ms == 0 {
        return Err(invalid("safety timeout must be > 0"));
    }
    if !(1..=20).contains(&safety.max_cycles) {
        return Err(invalid("safety max cycles must be in [1, 20]"));
    }
    Ok(())
}

impl<O> CoverBuilder<O> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<ImpulseCover> {
        let output = self
            .output
            .ok_or_else(|| eyre::Report::new(BuildError::MissingOutput))?;
        let timing = self.timing.unwrap_or_default();
        let safety = self.safety.unwrap_or_default();
        validate(&timing, &safety)?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let epoch = clock.now();

        let end_stop = |sensor: Option<Box<dyn BinarySensor>>, inverted: bool| match sensor {
            Some(s) => EndStop::present(s, inverted),
            None => EndStop::Absent,
        };
        let mut sensors = SensorReconciler::new(
            end_stop(self.open_sensor, self.sensor_cfg.open_inverted),
            end_stop(self.close_sensor, self.sensor_cfg.close_inverted),
        );

        // Home from the end-stops if they agree; otherwise the position is unknown.
        let reading = sensors.sample();
        let position = match reading.resting_end() {
            Some(end) => PositionEstimate::exact(end.end()),
            None => PositionEstimate::unknown(),
        };

        tracing::debug!(
            open_ms = timing.open_ms,
            close_ms = timing.close_ms,
            pulse_delay_ms = timing.pulse_delay_ms,
            pulse_on_completion = timing.pulse_on_completion,
            safety_timeout_ms = safety.timeout_ms,
            max_cycles = safety.max_cycles,
            open_sensor = sensors.has_open(),
            close_sensor = sensors.has_close(),
            position = position.value(),
            exact = position.is_exact(),
            "impulse cover ready"
        );

        Ok(ImpulseCover {
            emitter: PulseEmitter::new(output, timing.pulse_delay_ms),
            travel: TravelTimer::new(timing.open_ms, timing.close_ms),
            sensors,
            interlock: SafetyInterlock::new(safety.timeout_ms, safety.max_cycles),
            sink: self.sink.unwrap_or_else(|| Box::new(NoopSink)),
            clock,
            epoch,
            timing,
            state: CoverState::Idle,
            position,
            pending: None,
            stop_owed: false,
            run_started_ms: None,
            last_reading: reading,
        })
    }
}

/// Chainable setters that do not affect type-state.
impl<O> CoverBuilder<O> {
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = Some(timing);
        self
    }
    pub fn with_safety(mut self, safety: SafetyCfg) -> Self {
        self.safety = Some(safety);
        self
    }
    /// Signal inversion for the end-stops.
    pub fn with_sensor_cfg(mut self, cfg: SensorCfg) -> Self {
        self.sensor_cfg = cfg;
        self
    }
    pub fn with_open_sensor(mut self, sensor: impl BinarySensor + 'static) -> Self {
        self.open_sensor = Some(Box::new(sensor));
        self
    }
    pub fn with_close_sensor(mut self, sensor: impl BinarySensor + 'static) -> Self {
        self.close_sensor = Some(Box::new(sensor));
        self
    }
    pub fn with_event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }
    /// Provide a shared clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setter that advances type-state
impl CoverBuilder<Missing> {
    pub fn with_output(self, output: impl BinaryOutput + 'static) -> CoverBuilder<Set> {
        CoverBuilder {
            output: Some(Box::new(output)),
            timing: self.timing,
            safety: self.safety,
            sensor_cfg: self.sensor_cfg,
            open_sensor: self.open_sensor,
            close_sensor: self.close_sensor,
            sink: self.sink,
            clock: self.clock,
            _o: PhantomData,
        }
    }
}

impl CoverBuilder<Set> {
    /// Build once the output is bound; configuration is still range-checked.
    pub fn build(self) -> Result<ImpulseCover> {
        self.try_build()
    }
}
