//! Cover State Machine: the orchestrator.
//!
//! Owns the state, the position estimate and the pending command. Commands
//! enter through `command`, time advances through `tick`; neither blocks
//! and neither fails. Pulse spacing is honoured by deferring work to a
//! later tick.

use std::sync::Arc;
use std::time::Instant;

use impulse_traits::Clock;

use crate::config::TimingCfg;
use crate::error::{CoverError, Result};
use crate::events::{CoverEvent, EventSink};
use crate::pulse::PulseEmitter;
use crate::safety::{InterlockVerdict, SafetyInterlock};
use crate::sensors::{EndStopReading, SensorReconciler};
use crate::travel::TravelTimer;
use crate::types::{
    CommandOutcome, CoverCommand, CoverReport, CoverState, CoverTraits, Direction, IgnoreReason,
    PositionEstimate, RejectReason,
};
use crate::util::{CLOSED, OPEN, POSITION_EPSILON, clamp_unit};

pub struct ImpulseCover {
    pub(crate) emitter: PulseEmitter,
    pub(crate) travel: TravelTimer,
    pub(crate) sensors: SensorReconciler,
    pub(crate) interlock: SafetyInterlock,
    pub(crate) sink: Box<dyn EventSink>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) timing: TimingCfg,
    pub(crate) state: CoverState,
    pub(crate) position: PositionEstimate,
    /// Command waiting for the pulse latch.
    pub(crate) pending: Option<CoverCommand>,
    /// A stop pulse is due as soon as the latch opens.
    pub(crate) stop_owed: bool,
    /// Start of the current run, kept across retargets.
    pub(crate) run_started_ms: Option<u64>,
    pub(crate) last_reading: EndStopReading,
}

impl core::fmt::Debug for ImpulseCover {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImpulseCover")
            .field("state", &self.state)
            .field("position", &self.position)
            .field("pending", &self.pending)
            .field("stop_owed", &self.stop_owed)
            .field("emitter", &self.emitter)
            .field("session", &self.travel.session())
            .finish()
    }
}

impl ImpulseCover {
    // ── Queries ──────────────────────────────────────────────────────────────

    #[inline]
    pub fn state(&self) -> CoverState {
        self.state
    }

    #[inline]
    pub fn position(&self) -> PositionEstimate {
        self.position
    }

    #[inline]
    pub fn pending(&self) -> Option<CoverCommand> {
        self.pending
    }

    #[inline]
    pub fn timing(&self) -> &TimingCfg {
        &self.timing
    }

    /// Clock driving this cover; the runner sleeps through it.
    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Milliseconds since the cover was built.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn pulse_count(&self) -> u64 {
        self.emitter.pulse_count()
    }

    pub fn report(&self) -> CoverReport {
        CoverReport {
            state: self.state,
            position: self.position,
            pending: self.pending,
            cycles_in_window: self.interlock.cycles_in_window(self.now_ms()),
        }
    }

    pub fn traits(&self) -> CoverTraits {
        CoverTraits {
            supports_position: true,
            supports_tilt: false,
            supports_stop: true,
            assumed_state: self.sensors.assumed_state(),
        }
    }

    /// Nothing moving, nothing queued, no pulse owed or on the wire.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, CoverState::Idle | CoverState::SafetyLockout)
            && self.pending.is_none()
            && !self.stop_owed
            && !self.emitter.is_high()
    }

    /// Upper bound on how long any single command can keep the cover busy:
    /// a run capped by the movement guard plus a reversal's pulse spacing.
    pub fn settle_budget_ms(&self) -> u64 {
        let travel = self.timing.open_ms.max(self.timing.close_ms);
        self.interlock
            .window_ms()
            .min(travel)
            .saturating_add(travel)
            .saturating_add(self.timing.pulse_delay_ms.saturating_mul(4))
            .saturating_add(crate::pulse::PULSE_WIDTH_MS * 4)
    }

    // ── Entry points ─────────────────────────────────────────────────────────

    /// Accept a command from the cover abstraction.
    pub fn command(&mut self, cmd: CoverCommand) -> CommandOutcome {
        let now = self.now_ms();
        self.emitter.service(now);
        self.refresh_position(now);
        tracing::debug!(?cmd, state = self.state.name(), now_ms = now, "command");
        self.apply(cmd, now)
    }

    /// One control-loop iteration. Returns the state after the tick.
    pub fn tick(&mut self) -> CoverState {
        let now = self.now_ms();
        self.emitter.service(now);
        let reading = self.sensors.sample();
        self.last_reading = reading;

        if self.stop_owed && self.emitter.emit_pulse(now) {
            self.stop_owed = false;
            tracing::debug!(now_ms = now, "deferred stop pulse delivered");
            self.fold_if_settled();
        }

        if reading.contradictory() && self.state != CoverState::SafetyLockout {
            tracing::warn!("both end-stops report triggered; check sensor wiring");
            self.enter_lockout(now);
        }

        match self.state {
            CoverState::Opening | CoverState::Closing => self.track_movement(now, reading),
            CoverState::Stopped => self.resume_pending(now),
            CoverState::Idle => {
                self.reconcile_idle(reading);
                self.resume_pending(now);
            }
            CoverState::SafetyLockout => self.reconcile_idle(reading),
        }
        self.state
    }

    /// Explicit operator reset of the safety interlock.
    ///
    /// Clears every cycle record; a locked-out cover returns to idle.
    /// Returns true if the cover was locked out.
    pub fn reset(&mut self) -> bool {
        let was_locked = self.interlock.reset() || self.state == CoverState::SafetyLockout;
        if self.state == CoverState::SafetyLockout {
            tracing::info!("safety lockout cleared by reset");
            self.state = CoverState::Stopped;
            self.fold_if_settled();
        } else {
            tracing::debug!("cycle records cleared");
        }
        was_locked
    }

    /// Declare the current position known, e.g. after a manual check.
    pub fn calibrate(&mut self, position: f32) -> Result<()> {
        if !position.is_finite() {
            return Err(eyre::Report::new(CoverError::State(
                "calibration position must be finite".into(),
            )));
        }
        if !matches!(self.state, CoverState::Idle | CoverState::SafetyLockout) {
            return Err(eyre::Report::new(CoverError::State(format!(
                "cannot calibrate while {}",
                self.state.name()
            ))));
        }
        self.position = PositionEstimate::exact(position);
        tracing::info!(position = self.position.value(), "position calibrated");
        Ok(())
    }

    // ── Command handling ─────────────────────────────────────────────────────

    fn apply(&mut self, cmd: CoverCommand, now: u64) -> CommandOutcome {
        if !matches!(cmd, CoverCommand::Stop) && self.state == CoverState::SafetyLockout {
            return Self::reject_locked(cmd);
        }
        match cmd {
            CoverCommand::Stop => self.request_stop(now),
            CoverCommand::Toggle => {
                if self.state.is_moving() || self.state == CoverState::Stopped {
                    self.request_stop(now)
                } else if self.position.value() < 0.5 {
                    self.request_move(Direction::Opening, OPEN, cmd, now)
                } else {
                    self.request_move(Direction::Closing, CLOSED, cmd, now)
                }
            }
            CoverCommand::Open => self.request_move(Direction::Opening, OPEN, cmd, now),
            CoverCommand::Close => self.request_move(Direction::Closing, CLOSED, cmd, now),
            CoverCommand::Position(target) => self.request_position(target, cmd, now),
        }
    }

    fn request_position(&mut self, target: f32, cmd: CoverCommand, now: u64) -> CommandOutcome {
        if !target.is_finite() {
            return CommandOutcome::Ignored(IgnoreReason::InvalidTarget);
        }
        let target = clamp_unit(target);
        let delta = target - self.position.value();
        if delta.abs() <= POSITION_EPSILON {
            // Arriving at the target also cancels any queued reversal.
            return if self.state.is_moving()
                || self.state == CoverState::Stopped
                || self.pending.is_some()
            {
                self.request_stop(now)
            } else {
                CommandOutcome::Ignored(IgnoreReason::AlreadyAtTarget)
            };
        }
        let direction = if delta > 0.0 {
            Direction::Opening
        } else {
            Direction::Closing
        };
        self.request_move(direction, target, cmd, now)
    }

    fn request_stop(&mut self, now: u64) -> CommandOutcome {
        let had_pending = self.pending.take().is_some();
        match self.state {
            CoverState::Opening | CoverState::Closing => {
                self.halt(now);
                self.fold_if_settled();
                CommandOutcome::Stopped
            }
            CoverState::Stopped => {
                self.fold_if_settled();
                CommandOutcome::Stopped
            }
            CoverState::Idle if had_pending => CommandOutcome::Stopped,
            CoverState::Idle | CoverState::SafetyLockout => {
                CommandOutcome::Ignored(IgnoreReason::NotMoving)
            }
        }
    }

    fn request_move(
        &mut self,
        direction: Direction,
        target: f32,
        cmd: CoverCommand,
        now: u64,
    ) -> CommandOutcome {
        match self.state {
            CoverState::SafetyLockout => Self::reject_locked(cmd),
            CoverState::Opening | CoverState::Closing if self.state.direction() == Some(direction) => {
                self.retarget(direction, target, now)
            }
            CoverState::Opening | CoverState::Closing => {
                // Reversal: stop now, restart once the latch allows a second pulse.
                tracing::debug!(?cmd, "reversing; stopping first");
                self.halt(now);
                self.pending = Some(cmd);
                CommandOutcome::Queued
            }
            CoverState::Stopped => {
                self.pending = Some(cmd);
                CommandOutcome::Queued
            }
            CoverState::Idle => self.try_start(direction, target, cmd, now),
        }
    }

    fn retarget(&mut self, direction: Direction, target: f32, now: u64) -> CommandOutcome {
        let Some(session) = self.travel.session().copied() else {
            return CommandOutcome::Ignored(IgnoreReason::AlreadyMoving);
        };
        if (session.target_position - target).abs() <= POSITION_EPSILON {
            return CommandOutcome::Ignored(IgnoreReason::AlreadyMoving);
        }
        let from = session.position_at(now);
        let s = self.travel.start_towards(direction, from, target, now);
        tracing::debug!(
            from = s.from_position,
            target = s.target_position,
            duration_ms = s.target_duration_ms,
            "session retargeted"
        );
        CommandOutcome::Retargeted
    }

    fn try_start(
        &mut self,
        direction: Direction,
        target: f32,
        cmd: CoverCommand,
        now: u64,
    ) -> CommandOutcome {
        if target == direction.end() && self.at_end(direction) {
            tracing::debug!(?direction, "already at end; nothing to do");
            return CommandOutcome::Ignored(IgnoreReason::AlreadyAtEnd);
        }
        if !self.emitter.ready(now) {
            tracing::debug!(
                ?cmd,
                wait_ms = self.emitter.ms_until_ready(now),
                "pulse latched; command queued"
            );
            self.pending = Some(cmd);
            return CommandOutcome::Queued;
        }
        if self.interlock.record_cycle_start(now) == InterlockVerdict::Lockout {
            tracing::warn!(?cmd, "cycle limit exceeded inside safety window");
            self.enter_lockout(now);
            return CommandOutcome::Rejected(RejectReason::Lockout);
        }
        self.start_movement(direction, target, now)
    }

    fn start_movement(&mut self, direction: Direction, target: f32, now: u64) -> CommandOutcome {
        self.emitter.emit_pulse(now);
        let session = self
            .travel
            .start_towards(direction, self.position.value(), target, now);
        self.position = PositionEstimate::estimated(session.from_position);
        self.state = direction.into();
        self.run_started_ms = Some(now);
        tracing::info!(
            state = self.state.name(),
            from = session.from_position,
            target = session.target_position,
            duration_ms = session.target_duration_ms,
            "movement started"
        );
        self.sink.notify(Self::event_for(direction));
        CommandOutcome::Started
    }

    fn reject_locked(cmd: CoverCommand) -> CommandOutcome {
        tracing::warn!(?cmd, "cover is in safety lockout; command dropped");
        CommandOutcome::Rejected(RejectReason::Lockout)
    }

    // ── Tick handling ────────────────────────────────────────────────────────

    fn track_movement(&mut self, now: u64, reading: EndStopReading) {
        let Some(session) = self.travel.session().copied() else {
            self.state = CoverState::Idle;
            return;
        };
        let direction = session.direction;
        if reading.completes(direction) {
            // Physical truth wins over the timer, even on the same tick.
            tracing::debug!(?direction, "end-stop reached");
            self.finish_movement(now, PositionEstimate::exact(direction.end()), true);
            return;
        }
        if session.is_complete(now) {
            let pos = PositionEstimate::estimated(session.target_position);
            self.finish_movement(now, pos, session.targets_end());
            return;
        }
        self.position = PositionEstimate::estimated(session.position_at(now));

        let running_ms = now.saturating_sub(self.run_started_ms.unwrap_or(session.started_at_ms));
        if self.interlock.run_time_exceeded(running_ms) {
            tracing::warn!(running_ms, "continuous movement exceeded safety timeout");
            self.enter_lockout(now);
        }
    }

    fn finish_movement(&mut self, now: u64, position: PositionEstimate, at_end: bool) {
        let direction = self.state.direction();
        self.travel.stop(now);
        self.run_started_ms = None;
        self.position = position;
        tracing::info!(
            position = position.value(),
            exact = position.is_exact(),
            "movement complete"
        );
        if let Some(d) = direction {
            self.sink.notify(Self::event_for(d));
        }
        if at_end && !self.timing.pulse_on_completion {
            self.settle_idle();
            return;
        }
        self.state = CoverState::Stopped;
        self.stop_owed = !self.emitter.emit_pulse(now);
        self.fold_if_settled();
    }

    fn resume_pending(&mut self, now: u64) {
        if self.stop_owed || !self.emitter.ready(now) {
            return;
        }
        let Some(cmd) = self.pending.take() else {
            return;
        };
        let from_stopped = self.state == CoverState::Stopped;
        if from_stopped {
            self.state = CoverState::Idle;
        }
        let outcome = self.apply(cmd, now);
        tracing::debug!(?cmd, ?outcome, "pending command retried");
        if from_stopped && self.state == CoverState::Idle {
            self.sink.notify(CoverEvent::Idle);
        }
    }

    fn reconcile_idle(&mut self, reading: EndStopReading) {
        let Some(end) = reading.resting_end() else {
            return;
        };
        let snapped = PositionEstimate::exact(end.end());
        if self.position != snapped {
            tracing::debug!(
                was = self.position.value(),
                now = snapped.value(),
                "end-stop active while idle; position corrected"
            );
            self.position = snapped;
        }
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    /// Freeze the session and send (or owe) the stop pulse.
    fn halt(&mut self, now: u64) {
        if let Some(p) = self.travel.stop(now) {
            self.position = PositionEstimate::estimated(p);
        }
        self.run_started_ms = None;
        self.state = CoverState::Stopped;
        self.stop_owed = !self.emitter.emit_pulse(now);
        tracing::debug!(
            position = self.position.value(),
            stop_owed = self.stop_owed,
            "movement halted"
        );
    }

    /// `Stopped` folds into `Idle` once the stop pulse is out and nothing waits.
    fn fold_if_settled(&mut self) {
        if self.state == CoverState::Stopped && !self.stop_owed && self.pending.is_none() {
            self.settle_idle();
        }
    }

    fn settle_idle(&mut self) {
        self.state = CoverState::Idle;
        tracing::debug!(position = self.position.value(), "idle");
        self.sink.notify(CoverEvent::Idle);
    }

    fn enter_lockout(&mut self, now: u64) {
        if self.state == CoverState::SafetyLockout {
            return;
        }
        if self.state.is_moving() {
            self.halt(now);
        }
        self.pending = None;
        self.interlock.trip();
        self.state = CoverState::SafetyLockout;
        tracing::warn!(
            position = self.position.value(),
            "safety lockout entered; reset required"
        );
        self.sink.notify(CoverEvent::SafetyLockout);
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn refresh_position(&mut self, now: u64) {
        if self.state.is_moving()
            && let Some(p) = self.travel.position_at(now)
        {
            self.position = PositionEstimate::estimated(p);
        }
    }

    fn at_end(&self, direction: Direction) -> bool {
        let v = self.position.value();
        let by_estimate = match direction {
            Direction::Opening => v >= OPEN,
            Direction::Closing => v <= CLOSED,
        };
        by_estimate || self.last_reading.completes(direction)
    }

    const fn event_for(direction: Direction) -> CoverEvent {
        match direction {
            Direction::Opening => CoverEvent::Open,
            Direction::Closing => CoverEvent::Close,
        }
    }
}
