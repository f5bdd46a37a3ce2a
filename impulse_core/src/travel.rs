//! Travel Timer: elapsed-time position tracking for one movement session.
//!
//! The cover is assumed to move at a constant rate, covering the whole
//! travel in the configured duration for its direction. A session moving
//! from `from` towards `target` therefore needs `|target - from| * D` ms,
//! and its position at any instant is the linear interpolation between the
//! two over that span.

use crate::types::Direction;
use crate::util::{clamp_unit, fraction, scale_ms};

/// One in-progress open or close run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementSession {
    pub direction: Direction,
    pub started_at_ms: u64,
    pub from_position: f32,
    pub target_position: f32,
    /// Time needed to cover the remaining distance to the target.
    pub target_duration_ms: u64,
}

impl MovementSession {
    #[inline]
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at_ms)
    }

    /// Share of this session's distance covered at `now_ms`, in [0, 1].
    #[inline]
    pub fn elapsed_fraction(&self, now_ms: u64) -> f32 {
        fraction(self.elapsed_ms(now_ms), self.target_duration_ms)
    }

    #[inline]
    pub fn is_complete(&self, now_ms: u64) -> bool {
        self.elapsed_ms(now_ms) >= self.target_duration_ms
    }

    /// Distance this session set out to cover.
    #[inline]
    pub fn remaining(&self) -> f32 {
        (self.target_position - self.from_position).abs()
    }

    /// Interpolated position at `now_ms`.
    pub fn position_at(&self, now_ms: u64) -> f32 {
        let travelled = self.remaining() * self.elapsed_fraction(now_ms);
        clamp_unit(self.from_position + self.direction.sign() * travelled)
    }

    /// True when the target is a travel end rather than a mid-travel stop.
    #[inline]
    pub fn targets_end(&self) -> bool {
        self.target_position == self.direction.end()
    }
}

#[derive(Debug, Clone)]
pub struct TravelTimer {
    open_ms: u64,
    close_ms: u64,
    session: Option<MovementSession>,
}

impl TravelTimer {
    pub fn new(open_ms: u64, close_ms: u64) -> Self {
        Self {
            open_ms,
            close_ms,
            session: None,
        }
    }

    #[inline]
    pub fn duration_for(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Opening => self.open_ms,
            Direction::Closing => self.close_ms,
        }
    }

    /// Start a session towards the end of travel for `direction`.
    pub fn start(&mut self, direction: Direction, from: f32, now_ms: u64) -> MovementSession {
        self.start_towards(direction, from, direction.end(), now_ms)
    }

    /// Start a session towards an arbitrary target. A target behind `from`
    /// for the given direction collapses to a zero-length session.
    pub fn start_towards(
        &mut self,
        direction: Direction,
        from: f32,
        target: f32,
        now_ms: u64,
    ) -> MovementSession {
        let from = clamp_unit(from);
        let target = match direction {
            Direction::Opening => clamp_unit(target).max(from),
            Direction::Closing => clamp_unit(target).min(from),
        };
        let full = self.duration_for(direction);
        let session = MovementSession {
            direction,
            started_at_ms: now_ms,
            from_position: from,
            target_position: target,
            target_duration_ms: scale_ms(full, (target - from).abs()),
        };
        self.session = Some(session);
        session
    }

    #[inline]
    pub fn session(&self) -> Option<&MovementSession> {
        self.session.as_ref()
    }

    pub fn position_at(&self, now_ms: u64) -> Option<f32> {
        self.session.map(|s| s.position_at(now_ms))
    }

    /// Freeze the session and return the partial position reached.
    /// Later ticks no longer advance it.
    pub fn stop(&mut self, now_ms: u64) -> Option<f32> {
        self.session.take().map(|s| s.position_at(now_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn full_open_takes_configured_duration() {
        let mut t = TravelTimer::new(15_000, 15_000);
        let s = t.start(Direction::Opening, 0.0, 0);
        assert_eq!(s.target_duration_ms, 15_000);
        assert!(!s.is_complete(14_999));
        assert!(s.is_complete(15_000));
        assert!(approx(t.position_at(7_500).unwrap_or(-1.0), 0.5));
    }

    #[test]
    fn partial_start_scales_by_remaining_distance() {
        let mut t = TravelTimer::new(10_000, 20_000);
        let s = t.start(Direction::Closing, 0.4, 1_000);
        assert_eq!(s.target_duration_ms, 8_000);
        assert!(s.is_complete(9_000));
        assert!(approx(s.position_at(5_000), 0.2));
    }

    #[test]
    fn stop_freezes_partial_position() {
        let mut t = TravelTimer::new(10_000, 10_000);
        t.start(Direction::Closing, 0.4, 0);
        let p = t.stop(2_000).unwrap_or(-1.0);
        assert!(approx(p, 0.2), "got {p}");
        assert!(t.session().is_none());
        assert_eq!(t.stop(3_000), None);
    }

    #[rstest]
    #[case(Direction::Opening, 0.2, 0.7, 5_000)]
    #[case(Direction::Closing, 0.9, 0.4, 5_000)]
    #[case(Direction::Opening, 0.6, 0.3, 0)]
    fn targets_mid_travel(
        #[case] dir: Direction,
        #[case] from: f32,
        #[case] target: f32,
        #[case] expected_ms: u64,
    ) {
        let mut t = TravelTimer::new(10_000, 10_000);
        let s = t.start_towards(dir, from, target, 0);
        assert_eq!(s.target_duration_ms, expected_ms);
        assert!(!s.targets_end());
        assert!(s.is_complete(expected_ms));
    }

    #[test]
    fn position_never_leaves_unit_range() {
        let mut t = TravelTimer::new(1_000, 1_000);
        t.start(Direction::Opening, 0.9, 0);
        assert_eq!(t.position_at(60_000), Some(1.0));
    }
}
