//! Backend assembly and the command loops behind each subcommand.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use impulse_config::Config;
use impulse_core::error::{CoverError, Result};
use impulse_core::runner::{self, Request};
use impulse_core::{
    ChannelSink, CommandOutcome, CoverCommand, CoverEvent, CoverReport, CoverState, IgnoreReason,
    ImpulseCover, SafetyCfg, SensorCfg, TimingCfg,
};
use impulse_traits::{Clock, ManualClock, MonotonicClock};
use serde_json::json;

/// Starting position of the simulated gate (0.0 closed .. 1.0 open).
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub const SIM_START_ENV: &str = "IMPULSE_SIM_START";

/// A cover wired to its backend plus the receiving end of its events.
pub struct Rig {
    pub cover: ImpulseCover,
    pub events: Receiver<CoverEvent>,
    pub tick: Duration,
    pub backend: &'static str,
}

fn make_clock(simulated_time: bool) -> Arc<dyn Clock + Send + Sync> {
    if simulated_time {
        Arc::new(ManualClock::new())
    } else {
        Arc::new(MonotonicClock::new())
    }
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn sim_start() -> f32 {
    std::env::var(SIM_START_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<f32>().ok())
        .filter(|p| p.is_finite())
        .map_or(0.0, |p| p.clamp(0.0, 1.0))
}

/// Build the cover against the simulated gate.
///
/// End-stops are wired only for the sensor pins present in the config.
/// The simulated sensors are active-high, so configured inversion is
/// not applied to them.
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn build_rig(cfg: &Config, simulated_time: bool) -> Result<Rig> {
    use impulse_hardware::SimulatedGate;

    let clock = make_clock(simulated_time);
    let gate = SimulatedGate::new(
        Arc::clone(&clock),
        cfg.cover.open_duration,
        cfg.cover.close_duration,
    )
    .with_position(sim_start());
    if cfg.sensors.open_inverted || cfg.sensors.close_inverted {
        tracing::debug!("simulated end-stops are active-high; sensor inversion ignored");
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut builder = ImpulseCover::builder()
        .with_timing(TimingCfg::from(&cfg.cover))
        .with_safety(SafetyCfg::from(&cfg.safety))
        .with_sensor_cfg(SensorCfg::default())
        .with_event_sink(ChannelSink::new(tx))
        .with_clock(clock);
    if cfg.pins.open_sensor.is_some() {
        builder = builder.with_open_sensor(gate.open_sensor());
    }
    if cfg.pins.close_sensor.is_some() {
        builder = builder.with_close_sensor(gate.close_sensor());
    }
    let cover = builder.with_output(gate.output()).build()?;

    Ok(Rig {
        cover,
        events: rx,
        tick: Duration::from_millis(cfg.runner.tick),
        backend: "sim",
    })
}

/// Build the cover against Raspberry Pi GPIO.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn build_rig(cfg: &Config, simulated_time: bool) -> Result<Rig> {
    use impulse_core::hw_error::map_hw_error;
    use impulse_hardware::{GpioOutput, GpioSensor};

    if simulated_time {
        eyre::bail!("--simulated-time is only available with the simulated backend");
    }
    let hw = |e: impulse_hardware::HwError| eyre::Report::new(map_hw_error(&e));

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut builder = ImpulseCover::builder()
        .with_timing(TimingCfg::from(&cfg.cover))
        .with_safety(SafetyCfg::from(&cfg.safety))
        .with_sensor_cfg(SensorCfg::from(&cfg.sensors))
        .with_event_sink(ChannelSink::new(tx))
        .with_clock(make_clock(false));
    if let Some(pin) = cfg.pins.open_sensor {
        builder = builder.with_open_sensor(GpioSensor::new(pin).map_err(hw)?);
    }
    if let Some(pin) = cfg.pins.close_sensor {
        builder = builder.with_close_sensor(GpioSensor::new(pin).map_err(hw)?);
    }
    let output = GpioOutput::new(cfg.pins.output).map_err(hw)?;
    let cover = builder.with_output(output).build()?;

    Ok(Rig {
        cover,
        events: rx,
        tick: Duration::from_millis(cfg.runner.tick),
        backend: "gpio",
    })
}

// ── Output ───────────────────────────────────────────────────────────────────

/// Prints reports, events and outcomes as text or JSON lines on stdout.
#[derive(Clone, Copy)]
pub struct Printer {
    pub json: bool,
}

impl Printer {
    pub fn report(self, r: &CoverReport) {
        if self.json {
            println!(
                "{}",
                json!({
                    "type": "report",
                    "state": r.state.name(),
                    "operation": operation_name(r),
                    "position": round2(r.position.value()),
                    "exact": r.position.is_exact(),
                    "pending": r.pending.map(command_name),
                    "cycles_in_window": r.cycles_in_window,
                })
            );
        } else {
            let confidence = if r.position.is_exact() { "exact" } else { "estimated" };
            println!(
                "state={} position={:.2} ({confidence}) cycles={}",
                r.state.name(),
                r.position.value(),
                r.cycles_in_window
            );
        }
    }

    pub fn event(self, e: CoverEvent) {
        if self.json {
            println!("{}", json!({ "type": "event", "event": e.name() }));
        } else {
            println!("event: {e}");
        }
    }

    pub fn outcome(self, cmd: &str, outcome: CommandOutcome) {
        let name = outcome_name(outcome);
        if self.json {
            println!(
                "{}",
                json!({ "type": "outcome", "command": cmd, "outcome": name })
            );
        } else {
            println!("{cmd}: {name}");
        }
    }

    pub fn drain(self, events: &Receiver<CoverEvent>) {
        for e in events.try_iter() {
            self.event(e);
        }
    }
}

fn round2(v: f32) -> f64 {
    (f64::from(v) * 100.0).round() / 100.0
}

fn operation_name(r: &CoverReport) -> &'static str {
    match r.operation() {
        impulse_core::CoverOperation::Idle => "idle",
        impulse_core::CoverOperation::Opening => "opening",
        impulse_core::CoverOperation::Closing => "closing",
    }
}

pub fn command_name(cmd: CoverCommand) -> String {
    match cmd {
        CoverCommand::Open => "open".into(),
        CoverCommand::Close => "close".into(),
        CoverCommand::Stop => "stop".into(),
        CoverCommand::Toggle => "toggle".into(),
        CoverCommand::Position(p) => format!("position {p}"),
    }
}

pub fn outcome_name(o: CommandOutcome) -> String {
    let ignore = |r: IgnoreReason| match r {
        IgnoreReason::AlreadyAtEnd => "already_at_end",
        IgnoreReason::AlreadyAtTarget => "already_at_target",
        IgnoreReason::AlreadyMoving => "already_moving",
        IgnoreReason::NotMoving => "not_moving",
        IgnoreReason::InvalidTarget => "invalid_target",
    };
    match o {
        CommandOutcome::Started => "started".into(),
        CommandOutcome::Retargeted => "retargeted".into(),
        CommandOutcome::Stopped => "stopped".into(),
        CommandOutcome::Queued => "queued".into(),
        CommandOutcome::Ignored(r) => format!("ignored ({})", ignore(r)),
        CommandOutcome::Rejected(_) => "rejected (safety_lockout)".into(),
    }
}

// ── One-shot commands ────────────────────────────────────────────────────────

/// Issue one command, print progress and wait until the cover settles.
pub fn run_once(
    cfg: &Config,
    simulated_time: bool,
    printer: Printer,
    cmd: CoverCommand,
    shutdown: &AtomicBool,
) -> Result<()> {
    let mut rig = build_rig(cfg, simulated_time)?;
    let events = rig.events.clone();
    let (outcome, run) = runner::run_command(&mut rig.cover, cmd, rig.tick, shutdown, |r| {
        printer.drain(&events);
        printer.report(r);
    })?;
    printer.drain(&events);
    printer.outcome(&command_name(cmd), outcome);

    tracing::info!(
        outcome = %outcome_name(outcome),
        state = run.report.state.name(),
        position = run.report.position.value(),
        ticks = run.ticks,
        interrupted = run.interrupted,
        "command settled"
    );
    if run.report.state == CoverState::SafetyLockout {
        return Err(eyre::Report::new(CoverError::Lockout));
    }
    Ok(())
}

// ── Interactive loop ─────────────────────────────────────────────────────────

/// Parse one stdin line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_request(line: &str) -> std::result::Result<Option<Request>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let word = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts.next();
    if parts.next().is_some() {
        return Err(format!("too many arguments: {line:?}"));
    }
    let value = |what: &str| -> std::result::Result<f32, String> {
        let raw = arg.ok_or_else(|| format!("{what} needs a value between 0.0 and 1.0"))?;
        raw.parse::<f32>()
            .map_err(|_| format!("{what}: not a number: {raw:?}"))
    };
    let no_arg = |req: Request| match arg {
        Some(a) => Err(format!("{word} takes no argument (got {a:?})")),
        None => Ok(Some(req)),
    };
    match word.as_str() {
        "open" => no_arg(Request::Command(CoverCommand::Open)),
        "close" => no_arg(Request::Command(CoverCommand::Close)),
        "stop" => no_arg(Request::Command(CoverCommand::Stop)),
        "toggle" => no_arg(Request::Command(CoverCommand::Toggle)),
        "reset" => no_arg(Request::Reset),
        "status" => no_arg(Request::Status),
        "quit" | "exit" => no_arg(Request::Quit),
        "position" => Ok(Some(Request::Command(CoverCommand::Position(value(
            "position",
        )?)))),
        "calibrate" => Ok(Some(Request::Calibrate(value("calibrate")?))),
        other => Err(format!("unknown command {other:?}")),
    }
}

/// Forward parsed lines to the control loop until `quit`, EOF or a closed channel.
pub fn read_requests(input: impl BufRead, tx: &Sender<Request>) {
    for line in input.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        };
        match parse_request(&line) {
            Ok(Some(req)) => {
                if tx.send(req).is_err() || req == Request::Quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(msg) => eprintln!("error: {msg}"),
        }
    }
}

/// Serve stdin commands until `quit`, EOF or Ctrl-C.
pub fn run_interactive(
    cfg: &Config,
    simulated_time: bool,
    printer: Printer,
    shutdown: &AtomicBool,
) -> Result<()> {
    let mut rig = build_rig(cfg, simulated_time)?;
    let events = rig.events.clone();
    let (tx, rx) = crossbeam_channel::unbounded();
    // Detached: a blocking stdin read must not hold up shutdown.
    std::thread::Builder::new()
        .name("impulse-stdin".into())
        .spawn(move || read_requests(std::io::stdin().lock(), &tx))
        .map_err(|e| eyre::eyre!("spawn stdin reader: {e}"))?;

    tracing::info!(backend = rig.backend, tick_ms = cfg.runner.tick, "serving stdin commands");
    let report = runner::serve(
        &mut rig.cover,
        rig.tick,
        &rx,
        shutdown,
        |r| {
            printer.drain(&events);
            printer.report(r);
        },
        |req, outcome| {
            printer.drain(&events);
            if let Request::Command(cmd) = req {
                printer.outcome(&command_name(cmd), outcome);
            }
        },
    )?;
    printer.drain(&events);
    if report.state == CoverState::SafetyLockout {
        return Err(eyre::Report::new(CoverError::Lockout));
    }
    Ok(())
}

// ── Checks ───────────────────────────────────────────────────────────────────

/// Build the backend once and sample the end-stops.
pub fn self_check(cfg: &Config, simulated_time: bool, printer: Printer) -> Result<()> {
    let rig = build_rig(cfg, simulated_time)?;
    let traits = rig.cover.traits();
    let report = rig.cover.report();
    if printer.json {
        println!(
            "{}",
            json!({
                "type": "self_check",
                "status": "ok",
                "backend": rig.backend,
                "assumed_state": traits.assumed_state,
                "position": round2(report.position.value()),
                "exact": report.position.is_exact(),
            })
        );
    } else {
        println!("self-check ok (backend: {})", rig.backend);
        println!(
            "end-stops: {}",
            if traits.assumed_state { "partial or none (assumed state)" } else { "both wired" }
        );
        printer.report(&report);
    }
    Ok(())
}

pub fn health(cfg: &Config, simulated_time: bool, printer: Printer) -> Result<()> {
    let rig = build_rig(cfg, simulated_time)?;
    let report = rig.cover.report();
    let warnings = cfg.warnings();
    if printer.json {
        println!(
            "{}",
            json!({
                "type": "health",
                "status": "ok",
                "backend": rig.backend,
                "state": report.state.name(),
                "warnings": warnings,
            })
        );
    } else {
        println!("ok");
        for w in &warnings {
            println!("warning: {w}");
        }
    }
    Ok(())
}

pub fn dump_config(cfg: &Config, printer: Printer) {
    if printer.json {
        println!(
            "{}",
            json!({
                "type": "config",
                "pins": {
                    "output": cfg.pins.output,
                    "open_sensor": cfg.pins.open_sensor,
                    "close_sensor": cfg.pins.close_sensor,
                },
                "cover": {
                    "open_duration_ms": cfg.cover.open_duration,
                    "close_duration_ms": cfg.cover.close_duration,
                    "pulse_delay_ms": cfg.cover.pulse_delay,
                    "pulse_on_completion": cfg.cover.pulse_on_completion,
                },
                "safety": {
                    "timeout_ms": cfg.safety.timeout,
                    "max_cycles": cfg.safety.max_cycles,
                },
                "sensors": {
                    "open_inverted": cfg.sensors.open_inverted,
                    "close_inverted": cfg.sensors.close_inverted,
                },
                "runner": { "tick_ms": cfg.runner.tick },
            })
        );
    } else {
        println!("{}", cfg.summary());
    }
}
