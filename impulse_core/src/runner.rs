//! Drive an `ImpulseCover` at a fixed tick through its own clock.
//!
//! The cover itself never sleeps; these loops do, via `Clock::sleep`, so a
//! `ManualClock` runs them at CPU speed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::cover::ImpulseCover;
use crate::error::{CoverError, Result};
use crate::types::{CommandOutcome, CoverCommand, CoverReport, CoverState};

/// Slack added to the settle budget before the loop gives up.
const SETTLE_MARGIN_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOutcome {
    pub report: CoverReport,
    pub ticks: u64,
    /// A shutdown request stopped the cover before it settled on its own.
    pub interrupted: bool,
}

/// Requests accepted by `serve`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    Command(CoverCommand),
    Reset,
    Calibrate(f32),
    /// Publish the current report even if nothing changed.
    Status,
    Quit,
}

/// Tick until the cover is idle (or locked out) with nothing owed.
///
/// `observer` sees the initial report, then every report that differs by
/// more than 1 % of travel or by state. A raised `shutdown` flag issues a
/// single `Stop` and the loop keeps ticking until the stop pulse is out.
pub fn run_until_settled(
    cover: &mut ImpulseCover,
    tick: Duration,
    shutdown: &AtomicBool,
    mut observer: impl FnMut(&CoverReport),
) -> Result<RunOutcome> {
    let tick = tick.max(Duration::from_millis(1));
    let budget_ms = cover.settle_budget_ms().saturating_add(SETTLE_MARGIN_MS);
    let tick_ms = u64::try_from(tick.as_millis()).unwrap_or(u64::MAX).max(1);
    let max_ticks = budget_ms / tick_ms + 1;

    let mut last = cover.report();
    observer(&last);
    let mut interrupted = false;

    for ticks in 1..=max_ticks {
        if !interrupted && shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested; stopping cover");
            let outcome = cover.command(CoverCommand::Stop);
            tracing::debug!(?outcome, "stop on shutdown");
            interrupted = true;
        }
        cover.tick();
        let report = cover.report();
        if report.differs_from(&last) {
            observer(&report);
            last = report;
        }
        if cover.is_settled() {
            return Ok(RunOutcome {
                report,
                ticks,
                interrupted,
            });
        }
        cover.clock().sleep(tick);
    }

    Err(eyre::Report::new(CoverError::State(format!(
        "cover did not settle within {budget_ms} ms"
    ))))
}

/// Issue one command and run until the cover settles.
pub fn run_command(
    cover: &mut ImpulseCover,
    cmd: CoverCommand,
    tick: Duration,
    shutdown: &AtomicBool,
    observer: impl FnMut(&CoverReport),
) -> Result<(CommandOutcome, RunOutcome)> {
    let outcome = cover.command(cmd);
    tracing::info!(?cmd, ?outcome, "command issued");
    let run = run_until_settled(cover, tick, shutdown, observer)?;
    Ok((outcome, run))
}

/// Long-running loop: apply requests from `requests` and tick forever.
///
/// Returns when `Quit` arrives, the sender side disconnects, or `shutdown`
/// is raised; in the last two cases a moving cover is stopped first.
pub fn serve(
    cover: &mut ImpulseCover,
    tick: Duration,
    requests: &Receiver<Request>,
    shutdown: &AtomicBool,
    mut observer: impl FnMut(&CoverReport),
    mut on_outcome: impl FnMut(Request, CommandOutcome),
) -> Result<CoverReport> {
    let tick = tick.max(Duration::from_millis(1));
    let mut last = cover.report();
    observer(&last);

    loop {
        loop {
            match requests.try_recv() {
                Ok(Request::Quit) => return finish(cover, tick, shutdown, observer),
                Ok(req) => {
                    if let Some(outcome) = handle(cover, req, &mut observer) {
                        on_outcome(req, outcome);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!("request channel closed");
                    return finish(cover, tick, shutdown, observer);
                }
            }
        }
        if shutdown.load(Ordering::Relaxed) {
            return finish(cover, tick, shutdown, observer);
        }
        cover.tick();
        let report = cover.report();
        if report.differs_from(&last) {
            observer(&report);
            last = report;
        }
        cover.clock().sleep(tick);
    }
}

fn handle(
    cover: &mut ImpulseCover,
    req: Request,
    observer: &mut impl FnMut(&CoverReport),
) -> Option<CommandOutcome> {
    match req {
        Request::Command(cmd) => Some(cover.command(cmd)),
        Request::Reset => {
            if cover.reset() {
                tracing::info!("lockout reset by request");
            }
            None
        }
        Request::Calibrate(p) => {
            if let Err(e) = cover.calibrate(p) {
                tracing::warn!(error = %e, "calibration refused");
            }
            None
        }
        Request::Status => {
            observer(&cover.report());
            None
        }
        Request::Quit => None,
    }
}

/// Stop anything in motion and wait for the stop pulse before returning.
fn finish(
    cover: &mut ImpulseCover,
    tick: Duration,
    shutdown: &AtomicBool,
    observer: impl FnMut(&CoverReport),
) -> Result<CoverReport> {
    if matches!(
        cover.state(),
        CoverState::Opening | CoverState::Closing | CoverState::Stopped
    ) {
        cover.command(CoverCommand::Stop);
    }
    let run = run_until_settled(cover, tick, shutdown, observer)?;
    Ok(run.report)
}
