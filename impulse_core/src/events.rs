//! Observable cover events and the sinks that receive them.

use crossbeam_channel::Sender;

/// Transition notifications emitted by the state machine.
///
/// `Open` and `Close` fire when a movement session starts in that direction
/// and again when it completes; `Idle` fires whenever the cover settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoverEvent {
    Open,
    Close,
    Idle,
    SafetyLockout,
}

impl CoverEvent {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Idle => "idle",
            Self::SafetyLockout => "safety_lockout",
        }
    }
}

impl core::fmt::Display for CoverEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Receiver of cover events. Called synchronously from `command` and `tick`,
/// so implementations must not block.
pub trait EventSink {
    fn notify(&mut self, event: CoverEvent);
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn notify(&mut self, event: CoverEvent) {
        (**self).notify(event);
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn notify(&mut self, _event: CoverEvent) {}
}

/// Forwards events into a crossbeam channel. A disconnected receiver is
/// ignored; the cover keeps running without an audience.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<CoverEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<CoverEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn notify(&mut self, event: CoverEvent) {
        if self.tx.try_send(event).is_err() {
            tracing::trace!(event = event.name(), "event receiver gone or full");
        }
    }
}
