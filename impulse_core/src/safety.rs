//! Safety Interlock: rolling-window cycle counter and continuous-run guard.
//!
//! Lockout is sticky. Only `reset` clears it.

use std::collections::VecDeque;

/// A recorded movement start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleRecord {
    pub started_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockVerdict {
    Allowed,
    Lockout,
}

#[derive(Debug, Clone)]
pub struct SafetyInterlock {
    window_ms: u64,
    max_cycles: u8,
    records: VecDeque<CycleRecord>,
    locked: bool,
}

impl SafetyInterlock {
    pub fn new(window_ms: u64, max_cycles: u8) -> Self {
        let max_cycles = max_cycles.max(1);
        Self {
            window_ms: window_ms.max(1),
            max_cycles,
            records: VecDeque::with_capacity(usize::from(max_cycles)),
            locked: false,
        }
    }

    /// Ask to start a movement at `now_ms`.
    ///
    /// Records older than the window are evicted first. When the window
    /// already holds `max_cycles` starts the attempt is refused, nothing is
    /// recorded, and the interlock locks.
    pub fn record_cycle_start(&mut self, now_ms: u64) -> InterlockVerdict {
        if self.locked {
            return InterlockVerdict::Lockout;
        }
        self.evict(now_ms);
        if self.records.len() >= usize::from(self.max_cycles) {
            self.locked = true;
            tracing::debug!(
                now_ms,
                cycles = self.records.len(),
                max = self.max_cycles,
                "cycle limit reached"
            );
            return InterlockVerdict::Lockout;
        }
        self.records.push_back(CycleRecord {
            started_at_ms: now_ms,
        });
        tracing::trace!(now_ms, cycles = self.records.len(), "cycle recorded");
        InterlockVerdict::Allowed
    }

    /// Force lockout from outside the cycle counter (movement guard, sensor
    /// fault). Returns true if this call entered lockout.
    pub fn trip(&mut self) -> bool {
        !std::mem::replace(&mut self.locked, true)
    }

    /// True once a single movement has run for the whole window.
    #[inline]
    pub fn run_time_exceeded(&self, elapsed_ms: u64) -> bool {
        elapsed_ms >= self.window_ms
    }

    /// Clear every record and the lockout. Returns true if it was locked.
    pub fn reset(&mut self) -> bool {
        self.records.clear();
        std::mem::replace(&mut self.locked, false)
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Starts still inside the window at `now_ms`.
    pub fn cycles_in_window(&self, now_ms: u64) -> usize {
        self.records
            .iter()
            .filter(|r| self.in_window(r, now_ms))
            .count()
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    fn in_window(&self, r: &CycleRecord, now_ms: u64) -> bool {
        now_ms.saturating_sub(r.started_at_ms) < self.window_ms
    }

    fn evict(&mut self, now_ms: u64) {
        while let Some(front) = self.records.front() {
            if self.in_window(front, now_ms) {
                break;
            }
            self.records.pop_front();
        }
    }
}
