#![allow(dead_code)]

use std::sync::Arc;

use impulse_core::mocks::{FlagSensor, RecordingOutput, RecordingSink};
use impulse_core::{CoverBuilder, ImpulseCover, SafetyCfg, Set, TimingCfg};
use impulse_traits::ManualClock;

pub const TICK_MS: u64 = 10;

/// A cover on a manual clock with every collaborator observable.
pub struct Rig {
    pub clock: ManualClock,
    pub output: RecordingOutput,
    pub sink: RecordingSink,
    pub open_sensor: FlagSensor,
    pub close_sensor: FlagSensor,
    pub cover: ImpulseCover,
}

pub fn timing(open_ms: u64, close_ms: u64) -> TimingCfg {
    TimingCfg {
        open_ms,
        close_ms,
        ..TimingCfg::default()
    }
}

pub struct RigBuilder {
    timing: TimingCfg,
    safety: SafetyCfg,
    open_sensor: bool,
    close_sensor: bool,
}

impl RigBuilder {
    pub fn new(timing: TimingCfg) -> Self {
        Self {
            timing,
            safety: SafetyCfg::default(),
            open_sensor: false,
            close_sensor: false,
        }
    }

    pub fn safety(mut self, timeout_ms: u64, max_cycles: u8) -> Self {
        self.safety = SafetyCfg {
            timeout_ms,
            max_cycles,
        };
        self
    }

    pub fn open_sensor(mut self) -> Self {
        self.open_sensor = true;
        self
    }

    pub fn close_sensor(mut self) -> Self {
        self.close_sensor = true;
        self
    }

    pub fn build(self) -> Rig {
        let clock = ManualClock::new();
        let output = RecordingOutput::new(clock.clone());
        let sink = RecordingSink::new();
        let open_sensor = FlagSensor::new(false);
        let close_sensor = FlagSensor::new(false);
        let mut b: CoverBuilder<Set> = ImpulseCover::builder()
            .with_output(output.clone())
            .with_timing(self.timing)
            .with_safety(self.safety)
            .with_event_sink(sink.clone())
            .with_clock(Arc::new(clock.clone()));
        if self.open_sensor {
            b = b.with_open_sensor(open_sensor.clone());
        }
        if self.close_sensor {
            b = b.with_close_sensor(close_sensor.clone());
        }
        let cover = b.build().expect("valid rig");
        Rig {
            clock,
            output,
            sink,
            open_sensor,
            close_sensor,
            cover,
        }
    }
}

impl Rig {
    pub fn now_ms(&self) -> u64 {
        self.cover.now_ms()
    }

    /// Advance time by `ms`, ticking every `TICK_MS`.
    pub fn run_for(&mut self, ms: u64) {
        let mut left = ms;
        while left > 0 {
            let step = left.min(TICK_MS);
            self.clock.advance_ms(step);
            self.cover.tick();
            left -= step;
        }
    }

    /// Tick until absolute time `t_ms`.
    pub fn run_until(&mut self, t_ms: u64) {
        let now = self.now_ms();
        if t_ms > now {
            self.run_for(t_ms - now);
        }
    }

    pub fn pulses(&self) -> Vec<u64> {
        self.output.rising_edge_times()
    }
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}
