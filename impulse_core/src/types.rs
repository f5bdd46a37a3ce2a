//! Value types shared between the state machine and its callers.

use crate::util::{CLOSED, OPEN, clamp_unit};

/// Operating state of the cover. Exactly one is active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverState {
    Idle,
    Opening,
    Closing,
    /// Timer frozen, stop pulse owed or a reversal waiting for the pulse latch.
    Stopped,
    /// Fail-safe mode; only an explicit reset leaves it.
    SafetyLockout,
}

impl CoverState {
    #[inline]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::Opening => Some(Direction::Opening),
            Self::Closing => Some(Direction::Closing),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_moving(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Opening => "opening",
            Self::Closing => "closing",
            Self::Stopped => "stopped",
            Self::SafetyLockout => "safety_lockout",
        }
    }
}

impl From<Direction> for CoverState {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Opening => Self::Opening,
            Direction::Closing => Self::Closing,
        }
    }
}

/// Direction of one movement session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Opening,
    Closing,
}

impl Direction {
    /// +1 towards open, -1 towards closed.
    #[inline]
    pub const fn sign(self) -> f32 {
        match self {
            Self::Opening => 1.0,
            Self::Closing => -1.0,
        }
    }

    /// Position at the end of travel in this direction.
    #[inline]
    pub const fn end(self) -> f32 {
        match self {
            Self::Opening => OPEN,
            Self::Closing => CLOSED,
        }
    }
}

/// Where a position value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Corroborated by an end-stop sensor or explicit calibration.
    Exact,
    /// Inferred from elapsed travel time.
    Estimated,
}

/// Position in [0.0, 1.0] (0 = closed, 1 = open) plus its confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionEstimate {
    value: f32,
    pub confidence: Confidence,
}

impl PositionEstimate {
    pub fn exact(value: f32) -> Self {
        Self {
            value: clamp_unit(value),
            confidence: Confidence::Exact,
        }
    }

    pub fn estimated(value: f32) -> Self {
        Self {
            value: clamp_unit(value),
            confidence: Confidence::Estimated,
        }
    }

    /// Position after a restart: middle of travel, unknown.
    pub fn unknown() -> Self {
        Self::estimated(0.5)
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    #[inline]
    pub fn is_exact(&self) -> bool {
        self.confidence == Confidence::Exact
    }
}

/// Commands accepted from the cover abstraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoverCommand {
    Open,
    Close,
    Stop,
    /// Stop when moving, otherwise head for the farther end.
    Toggle,
    /// Move to an arbitrary position in [0.0, 1.0].
    Position(f32),
}

/// What became of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A movement session started and its pulse went out.
    Started,
    /// The running session now heads for a new target in the same direction.
    Retargeted,
    /// Motion halted; the stop pulse went out or is owed to the next free tick.
    Stopped,
    /// Held until the pulse latch opens; retried on the next tick.
    Queued,
    /// Nothing to do; no pulse, no event.
    Ignored(IgnoreReason),
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    AlreadyAtEnd,
    AlreadyAtTarget,
    AlreadyMoving,
    NotMoving,
    InvalidTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Lockout,
}

/// Operation as seen by the generic cover abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverOperation {
    Idle,
    Opening,
    Closing,
}

/// Static capabilities reported to the cover abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverTraits {
    pub supports_position: bool,
    pub supports_tilt: bool,
    pub supports_stop: bool,
    /// True unless both end-stop sensors are wired.
    pub assumed_state: bool,
}

/// Snapshot published to the cover abstraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverReport {
    pub state: CoverState,
    pub position: PositionEstimate,
    pub pending: Option<CoverCommand>,
    pub cycles_in_window: usize,
}

impl CoverReport {
    pub fn operation(&self) -> CoverOperation {
        match self.state {
            CoverState::Opening => CoverOperation::Opening,
            CoverState::Closing => CoverOperation::Closing,
            _ => CoverOperation::Idle,
        }
    }

    /// True when this report differs enough from `prev` to be worth publishing.
    pub fn differs_from(&self, prev: &Self) -> bool {
        self.state != prev.state
            || self.position.confidence != prev.position.confidence
            || (self.position.value() - prev.position.value()).abs() > crate::util::POSITION_EPSILON
    }
}
