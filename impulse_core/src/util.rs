//! Small numeric helpers shared by the timer and the state machine.

/// Fully closed.
pub const CLOSED: f32 = 0.0;
/// Fully open.
pub const OPEN: f32 = 1.0;
/// Positions closer than this are treated as equal (1 % of travel).
pub const POSITION_EPSILON: f32 = 0.01;

/// Clamp to [0.0, 1.0]; NaN maps to 0.0.
#[inline]
pub fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// `part / whole` as a fraction in [0.0, 1.0]. A zero `whole` counts as done.
#[inline]
pub fn fraction(part_ms: u64, whole_ms: u64) -> f32 {
    if whole_ms == 0 {
        return 1.0;
    }
    (part_ms as f32 / whole_ms as f32).min(1.0)
}

/// Scale a duration by a fraction of travel, rounded to the nearest ms.
#[inline]
pub fn scale_ms(ms: u64, factor: f32) -> u64 {
    let scaled = (ms as f64 * f64::from(clamp_unit(factor))).round();
    scaled as u64
}
