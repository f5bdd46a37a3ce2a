//! Test and helper doubles for impulse_core.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use impulse_traits::{BinaryOutput, BinarySensor, Clock, HwResult, ManualClock};

use crate::events::{CoverEvent, EventSink};

/// Output that records every level written, stamped with the clock's
/// milliseconds since the recorder was created. Clones share the log.
#[derive(Debug, Clone)]
pub struct RecordingOutput {
    clock: ManualClock,
    epoch: Instant,
    log: Arc<Mutex<Vec<(u64, bool)>>>,
}

impl RecordingOutput {
    pub fn new(clock: ManualClock) -> Self {
        let epoch = clock.now();
        Self {
            clock,
            epoch,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every write as `(ms, level)`.
    pub fn writes(&self) -> Vec<(u64, bool)> {
        self.log.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn levels(&self) -> Vec<bool> {
        self.writes().into_iter().map(|(_, l)| l).collect()
    }

    /// Timestamps of low-to-high transitions.
    pub fn rising_edge_times(&self) -> Vec<u64> {
        let mut prev = false;
        let mut out = Vec::new();
        for (t, level) in self.writes() {
            if level && !prev {
                out.push(t);
            }
            prev = level;
        }
        out
    }

    pub fn rising_edges(&self) -> usize {
        self.rising_edge_times().len()
    }
}

impl BinaryOutput for RecordingOutput {
    fn write(&mut self, high: bool) -> HwResult<()> {
        let t = self.clock.ms_since(self.epoch);
        if let Ok(mut g) = self.log.lock() {
            g.push((t, high));
        }
        Ok(())
    }
}

/// Output whose writes always fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingOutput;

impl BinaryOutput for FailingOutput {
    fn write(&mut self, _high: bool) -> HwResult<()> {
        Err(Box::new(std::io::Error::other("output line unavailable")))
    }
}

/// Sensor backed by a shared flag; clones observe the same level.
#[derive(Debug, Clone, Default)]
pub struct FlagSensor {
    level: Arc<AtomicBool>,
}

impl FlagSensor {
    pub fn new(level: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(level)),
        }
    }

    pub fn set(&self, level: bool) {
        self.level.store(level, Ordering::Relaxed);
    }
}

impl BinarySensor for FlagSensor {
    fn read(&mut self) -> HwResult<bool> {
        Ok(self.level.load(Ordering::Relaxed))
    }
}

/// Sensor whose reads always fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSensor;

impl BinarySensor for FailingSensor {
    fn read(&mut self) -> HwResult<bool> {
        Err(Box::new(std::io::Error::other("sensor disconnected")))
    }
}

/// Sink that keeps every event; clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<CoverEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CoverEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn count(&self, event: CoverEvent) -> usize {
        self.events().into_iter().filter(|e| *e == event).count()
    }

    pub fn clear(&self) {
        if let Ok(mut g) = self.events.lock() {
            g.clear();
        }
    }
}

impl EventSink for RecordingSink {
    fn notify(&mut self, event: CoverEvent) {
        if let Ok(mut g) = self.events.lock() {
            g.push(event);
        }
    }
}
