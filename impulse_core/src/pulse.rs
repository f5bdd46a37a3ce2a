//! Pulse Emitter: the only writer of the impulse output.
//!
//! A pulse is a fixed-width high level on the output. The emitter never
//! sleeps; `service` lowers the line once the width has elapsed and must be
//! called every tick. Pulses are spaced by at least `pulse_delay_ms`,
//! measured between rising edges.

use impulse_traits::BinaryOutput;

use crate::hw_error::map_hw_error;

/// Width of one impulse. Hardware debounce constant, not user-configurable.
pub const PULSE_WIDTH_MS: u64 = 100;

pub struct PulseEmitter {
    output: Box<dyn BinaryOutput>,
    pulse_delay_ms: u64,
    last_pulse_ms: Option<u64>,
    high_since_ms: Option<u64>,
    pulses: u64,
}

impl core::fmt::Debug for PulseEmitter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PulseEmitter")
            .field("pulse_delay_ms", &self.pulse_delay_ms)
            .field("last_pulse_ms", &self.last_pulse_ms)
            .field("high", &self.high_since_ms.is_some())
            .field("pulses", &self.pulses)
            .finish()
    }
}

impl PulseEmitter {
    /// Bind the output and drive it low.
    pub fn new(output: Box<dyn BinaryOutput>, pulse_delay_ms: u64) -> Self {
        let mut emitter = Self {
            output,
            pulse_delay_ms,
            last_pulse_ms: None,
            high_since_ms: None,
            pulses: 0,
        };
        emitter.write(false);
        emitter
    }

    /// True when a pulse may be emitted at `now_ms`.
    #[inline]
    pub fn ready(&self, now_ms: u64) -> bool {
        self.high_since_ms.is_none()
            && self
                .last_pulse_ms
                .is_none_or(|t| now_ms.saturating_sub(t) >= self.pulse_delay_ms)
    }

    /// Milliseconds until `ready` can turn true; 0 when ready now.
    pub fn ms_until_ready(&self, now_ms: u64) -> u64 {
        let spacing = self.last_pulse_ms.map_or(0, |t| {
            t.saturating_add(self.pulse_delay_ms)
                .saturating_sub(now_ms)
        });
        let width = self.high_since_ms.map_or(0, |t| {
            t.saturating_add(PULSE_WIDTH_MS).saturating_sub(now_ms)
        });
        spacing.max(width)
    }

    /// Raise the output for one pulse width.
    ///
    /// Returns false, with no side effect, while the spacing latch is
    /// closed. A failed write is logged and the pulse still counts against
    /// the latch; the core cannot tell a dead line from a live one.
    pub fn emit_pulse(&mut self, now_ms: u64) -> bool {
        if !self.ready(now_ms) {
            tracing::trace!(
                now_ms,
                wait_ms = self.ms_until_ready(now_ms),
                "pulse latched"
            );
            return false;
        }
        self.write(true);
        self.last_pulse_ms = Some(now_ms);
        self.high_since_ms = Some(now_ms);
        self.pulses = self.pulses.saturating_add(1);
        tracing::debug!(now_ms, pulses = self.pulses, "pulse");
        true
    }

    /// Lower the output once the pulse width has elapsed.
    pub fn service(&mut self, now_ms: u64) {
        if let Some(since) = self.high_since_ms
            && now_ms.saturating_sub(since) >= PULSE_WIDTH_MS
        {
            self.write(false);
            self.high_since_ms = None;
        }
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        self.high_since_ms.is_some()
    }

    #[inline]
    pub fn pulse_count(&self) -> u64 {
        self.pulses
    }

    fn write(&mut self, high: bool) {
        if let Err(e) = self.output.write(high) {
            let err = map_hw_error(e.as_ref());
            tracing::warn!(high, error = %err, "output write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingOutput;
    use impulse_traits::ManualClock;

    fn emitter(delay: u64) -> (PulseEmitter, RecordingOutput, ManualClock) {
        let clock = ManualClock::new();
        let out = RecordingOutput::new(clock.clone());
        let e = PulseEmitter::new(Box::new(out.clone()), delay);
        (e, out, clock)
    }

    #[test]
    fn starts_low_and_pulses_for_fixed_width() {
        let (mut e, out, _clock) = emitter(500);
        assert_eq!(out.levels(), vec![false]);
        assert!(e.emit_pulse(0));
        assert!(e.is_high());
        e.service(50);
        assert!(e.is_high());
        e.service(PULSE_WIDTH_MS);
        assert!(!e.is_high());
        assert_eq!(out.levels(), vec![false, true, false]);
    }

    #[test]
    fn rejects_pulses_inside_spacing() {
        let (mut e, out, _clock) = emitter(500);
        assert!(e.emit_pulse(1_000));
        e.service(1_100);
        assert!(!e.emit_pulse(1_499));
        assert_eq!(e.ms_until_ready(1_499), 1);
        assert!(e.emit_pulse(1_500));
        assert_eq!(e.pulse_count(), 2);
        assert_eq!(out.rising_edges(), 2);
    }

    #[test]
    fn short_delay_still_waits_for_line_to_drop() {
        let (mut e, _out, _clock) = emitter(20);
        assert!(e.emit_pulse(0));
        assert!(!e.emit_pulse(50));
        e.service(PULSE_WIDTH_MS);
        assert!(e.emit_pulse(PULSE_WIDTH_MS));
    }

    #[test]
    fn failed_write_still_closes_latch() {
        let out = crate::mocks::FailingOutput;
        let mut e = PulseEmitter::new(Box::new(out), 500);
        assert!(e.emit_pulse(0));
        assert!(!e.ready(200));
    }
}
