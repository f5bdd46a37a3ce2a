mod common;

use common::{RigBuilder, approx, timing};
use impulse_core::{
    CommandOutcome, Confidence, CoverCommand, CoverEvent, CoverState, IgnoreReason, RejectReason,
};

use CoverEvent::{Close, Idle, Open, SafetyLockout};

#[test]
fn timed_open_without_sensors_completes_at_configured_duration() {
    let mut rig = RigBuilder::new(timing(15_000, 15_000)).build();
    rig.cover.calibrate(0.0).expect("idle");

    assert_eq!(rig.cover.command(CoverCommand::Open), CommandOutcome::Started);
    assert_eq!(rig.cover.state(), CoverState::Opening);
    assert_eq!(rig.cover.position().confidence, Confidence::Estimated);

    rig.run_until(14_990);
    assert_eq!(rig.cover.state(), CoverState::Opening);
    assert!(rig.cover.position().value() < 1.0);

    rig.run_until(15_000);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert_eq!(rig.cover.position().value(), 1.0);
    assert_eq!(rig.cover.position().confidence, Confidence::Estimated);
    assert_eq!(rig.sink.events(), vec![Open, Open, Idle]);
    assert_eq!(rig.pulses(), vec![0, 15_000]);
}

#[test]
fn open_sensor_completes_early_with_exact_position() {
    let mut rig = RigBuilder::new(timing(15_000, 15_000)).open_sensor().build();
    rig.cover.calibrate(0.0).expect("idle");
    rig.cover.command(CoverCommand::Open);

    rig.run_until(8_990);
    assert_eq!(rig.cover.state(), CoverState::Opening);
    rig.open_sensor.set(true);
    rig.run_until(9_000);

    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert_eq!(rig.cover.position().value(), 1.0);
    assert!(rig.cover.position().is_exact());
    assert_eq!(rig.pulses(), vec![0, 9_000]);
    assert_eq!(rig.sink.events(), vec![Open, Open, Idle]);

    // Nothing else happens at the timer's nominal end.
    rig.run_until(16_000);
    assert_eq!(rig.pulses().len(), 2);
}

#[test]
fn stop_while_closing_from_forty_percent() {
    let mut rig = RigBuilder::new(timing(10_000, 10_000)).build();
    rig.cover.calibrate(0.4).expect("idle");
    assert_eq!(rig.cover.command(CoverCommand::Close), CommandOutcome::Started);

    rig.run_until(2_000);
    assert_eq!(rig.cover.command(CoverCommand::Stop), CommandOutcome::Stopped);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    let p = rig.cover.position();
    assert!(approx(p.value(), 0.2), "got {}", p.value());
    assert_eq!(p.confidence, Confidence::Estimated);
    assert_eq!(rig.sink.events(), vec![Close, Idle]);

    // Frozen: later ticks do not move it.
    rig.run_for(5_000);
    assert!(approx(rig.cover.position().value(), 0.2));
    assert_eq!(rig.pulses(), vec![0, 2_000]);
}

#[test]
fn reversal_costs_one_pulse_delay() {
    let mut rig = RigBuilder::new(timing(10_000, 10_000)).build();
    rig.cover.calibrate(0.0).expect("idle");
    rig.cover.command(CoverCommand::Open);
    rig.run_until(3_000);

    assert_eq!(rig.cover.command(CoverCommand::Close), CommandOutcome::Queued);
    assert_eq!(rig.cover.state(), CoverState::Stopped);
    assert!(approx(rig.cover.position().value(), 0.3));

    rig.run_until(3_490);
    assert_eq!(rig.cover.state(), CoverState::Stopped);
    rig.run_until(3_500);
    assert_eq!(rig.cover.state(), CoverState::Closing);
    assert_eq!(rig.pulses(), vec![0, 3_000, 3_500]);

    rig.run_until(6_500);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert_eq!(rig.cover.position().value(), 0.0);
    assert_eq!(rig.sink.events(), vec![Open, Close, Close, Idle]);
}

#[test]
fn cycle_limit_locks_out_until_reset() {
    let mut rig = RigBuilder::new(timing(5_000, 5_000))
        .safety(60_000, 3)
        .build();
    rig.cover.calibrate(1.0).expect("idle");

    for (at, cmd) in [
        (0, CoverCommand::Close),
        (6_000, CoverCommand::Open),
        (12_000, CoverCommand::Close),
    ] {
        rig.run_until(at);
        assert_eq!(rig.cover.command(cmd), CommandOutcome::Started, "at {at}");
        rig.run_for(5_000);
        assert_eq!(rig.cover.state(), CoverState::Idle);
    }

    rig.run_until(18_000);
    assert_eq!(
        rig.cover.command(CoverCommand::Open),
        CommandOutcome::Rejected(RejectReason::Lockout)
    );
    assert_eq!(rig.cover.state(), CoverState::SafetyLockout);
    assert_eq!(rig.sink.count(SafetyLockout), 1);
    assert_eq!(rig.pulses().len(), 6);

    let events_before = rig.sink.events().len();
    rig.run_until(19_000);
    assert_eq!(
        rig.cover.command(CoverCommand::Open),
        CommandOutcome::Rejected(RejectReason::Lockout)
    );
    assert_eq!(
        rig.cover.command(CoverCommand::Toggle),
        CommandOutcome::Rejected(RejectReason::Lockout)
    );
    assert_eq!(
        rig.cover.command(CoverCommand::Stop),
        CommandOutcome::Ignored(IgnoreReason::NotMoving)
    );
    rig.run_for(1_000);
    assert_eq!(rig.sink.events().len(), events_before);
    assert_eq!(rig.pulses().len(), 6);
    assert_eq!(rig.cover.state(), CoverState::SafetyLockout);

    assert!(rig.cover.reset());
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert_eq!(rig.sink.events().last(), Some(&Idle));
    assert_eq!(rig.cover.command(CoverCommand::Open), CommandOutcome::Started);
    assert_eq!(rig.cover.report().cycles_in_window, 1);
}

#[test]
fn open_at_exact_open_is_a_no_op() {
    let rig = RigBuilder::new(timing(15_000, 15_000))
        .open_sensor()
        .close_sensor();
    let mut rig = rig.build();
    rig.open_sensor.set(true);
    rig.run_for(10);
    assert!(rig.cover.position().is_exact());
    assert_eq!(rig.cover.position().value(), 1.0);

    assert_eq!(
        rig.cover.command(CoverCommand::Open),
        CommandOutcome::Ignored(IgnoreReason::AlreadyAtEnd)
    );
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert!(rig.pulses().is_empty());
    assert!(rig.sink.events().is_empty());
}

#[test]
fn contradictory_sensors_force_lockout_and_stop() {
    let mut rig = RigBuilder::new(timing(15_000, 15_000))
        .open_sensor()
        .close_sensor()
        .build();
    rig.cover.command(CoverCommand::Open);
    rig.run_until(1_000);
    rig.open_sensor.set(true);
    rig.close_sensor.set(true);
    rig.run_for(10);

    assert_eq!(rig.cover.state(), CoverState::SafetyLockout);
    assert_eq!(rig.pulses(), vec![0, 1_010]);
    assert_eq!(rig.sink.events(), vec![Open, SafetyLockout]);

    rig.run_for(2_000);
    assert_eq!(rig.sink.count(SafetyLockout), 1);
}

#[test]
fn stop_inside_pulse_delay_is_delivered_later() {
    let mut rig = RigBuilder::new(timing(15_000, 15_000)).build();
    rig.cover.command(CoverCommand::Open);
    rig.run_until(100);

    assert_eq!(rig.cover.command(CoverCommand::Stop), CommandOutcome::Stopped);
    assert_eq!(rig.cover.state(), CoverState::Stopped);
    let frozen = rig.cover.position().value();

    rig.run_until(490);
    assert_eq!(rig.cover.state(), CoverState::Stopped);
    assert_eq!(rig.pulses(), vec![0]);

    rig.run_until(500);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert_eq!(rig.pulses(), vec![0, 500]);
    assert_eq!(rig.cover.position().value(), frozen);
    assert_eq!(rig.sink.events(), vec![Open, Idle]);
}

#[test]
fn command_during_latch_is_queued_then_started() {
    let mut rig = RigBuilder::new(timing(15_000, 15_000)).build();
    rig.cover.command(CoverCommand::Open);
    rig.run_until(600);
    rig.cover.command(CoverCommand::Stop);
    rig.run_until(700);

    assert_eq!(rig.cover.command(CoverCommand::Close), CommandOutcome::Queued);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert_eq!(rig.cover.pending(), Some(CoverCommand::Close));

    rig.run_until(1_100);
    assert_eq!(rig.cover.state(), CoverState::Closing);
    assert_eq!(rig.pulses(), vec![0, 600, 1_100]);
}

#[test]
fn stop_cancels_queued_command() {
    let mut rig = RigBuilder::new(timing(15_000, 15_000)).build();
    rig.cover.command(CoverCommand::Open);
    rig.run_until(600);
    rig.cover.command(CoverCommand::Stop);
    rig.cover.command(CoverCommand::Close);
    assert_eq!(rig.cover.command(CoverCommand::Stop), CommandOutcome::Stopped);
    rig.run_for(2_000);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert_eq!(rig.pulses().len(), 2);
}

#[test]
fn position_at_current_cancels_queued_reversal() {
    let mut rig = RigBuilder::new(timing(10_000, 10_000)).build();
    rig.cover.calibrate(0.0).expect("idle");
    rig.cover.command(CoverCommand::Open);
    rig.run_until(3_000);

    assert_eq!(rig.cover.command(CoverCommand::Close), CommandOutcome::Queued);
    assert_eq!(rig.cover.state(), CoverState::Stopped);
    let here = rig.cover.position().value();
    assert_eq!(
        rig.cover.command(CoverCommand::Position(here)),
        CommandOutcome::Stopped
    );

    rig.run_until(4_000);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert!(approx(rig.cover.position().value(), 0.3));
    assert_eq!(rig.pulses(), vec![0, 3_000]);
    assert_eq!(rig.sink.events(), vec![Open, Idle]);
}

#[test]
fn sensor_wins_when_it_fires_on_the_timer_tick() {
    let mut rig = RigBuilder::new(timing(15_000, 15_000)).open_sensor().build();
    rig.cover.calibrate(0.0).expect("idle");
    rig.cover.command(CoverCommand::Open);

    rig.run_until(14_990);
    assert_eq!(rig.cover.state(), CoverState::Opening);
    rig.open_sensor.set(true);
    rig.run_until(15_000);

    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert_eq!(rig.cover.position().value(), 1.0);
    assert_eq!(rig.cover.position().confidence, Confidence::Exact);
    assert_eq!(rig.pulses(), vec![0, 15_000]);
    assert_eq!(rig.sink.events(), vec![Open, Open, Idle]);
}

#[test]
fn continuous_movement_guard_trips_lockout() {
    let mut rig = RigBuilder::new(timing(30_000, 30_000))
        .safety(20_000, 5)
        .build();
    rig.cover.calibrate(0.0).expect("idle");
    rig.cover.command(CoverCommand::Open);

    rig.run_until(19_990);
    assert_eq!(rig.cover.state(), CoverState::Opening);
    rig.run_until(20_000);
    assert_eq!(rig.cover.state(), CoverState::SafetyLockout);
    assert_eq!(rig.pulses(), vec![0, 20_000]);
    assert_eq!(rig.sink.events(), vec![Open, SafetyLockout]);
    assert!(approx(rig.cover.position().value(), 2.0 / 3.0));
}

#[test]
fn position_command_stops_mid_travel() {
    let mut rig = RigBuilder::new(timing(10_000, 10_000)).build();
    rig.cover.calibrate(0.0).expect("idle");

    assert_eq!(
        rig.cover.command(CoverCommand::Position(0.5)),
        CommandOutcome::Started
    );
    rig.run_until(5_000);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert!(approx(rig.cover.position().value(), 0.5));
    assert_eq!(rig.pulses(), vec![0, 5_000]);
    assert_eq!(rig.sink.events(), vec![Open, Open, Idle]);

    assert_eq!(
        rig.cover.command(CoverCommand::Position(0.505)),
        CommandOutcome::Ignored(IgnoreReason::AlreadyAtTarget)
    );
    assert_eq!(
        rig.cover.command(CoverCommand::Position(f32::NAN)),
        CommandOutcome::Ignored(IgnoreReason::InvalidTarget)
    );

    // Still inside the pulse delay of the stop pulse.
    assert_eq!(
        rig.cover.command(CoverCommand::Position(0.2)),
        CommandOutcome::Queued
    );
    rig.run_until(5_500);
    assert_eq!(rig.cover.state(), CoverState::Closing);
    rig.run_until(8_500);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert!(approx(rig.cover.position().value(), 0.2));
}

#[test]
fn same_direction_command_retargets_without_pulse() {
    let mut rig = RigBuilder::new(timing(10_000, 10_000)).build();
    rig.cover.calibrate(0.0).expect("idle");
    rig.cover.command(CoverCommand::Position(0.5));
    rig.run_until(1_000);

    assert_eq!(rig.cover.command(CoverCommand::Open), CommandOutcome::Retargeted);
    assert_eq!(
        rig.cover.command(CoverCommand::Open),
        CommandOutcome::Ignored(IgnoreReason::AlreadyMoving)
    );
    rig.run_until(5_000);
    assert_eq!(rig.cover.state(), CoverState::Opening);
    rig.run_until(10_000);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert_eq!(rig.cover.position().value(), 1.0);
    assert_eq!(rig.pulses(), vec![0, 10_000]);
}

#[test]
fn completion_without_stop_pulse_when_disabled() {
    let mut t = timing(4_000, 4_000);
    t.pulse_on_completion = false;
    let mut rig = RigBuilder::new(t).build();
    rig.cover.calibrate(0.0).expect("idle");
    rig.cover.command(CoverCommand::Open);
    rig.run_until(4_000);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert_eq!(rig.pulses(), vec![0]);
    assert_eq!(rig.sink.events(), vec![Open, Open, Idle]);

    // A mid-travel target still needs the stop pulse.
    rig.cover.command(CoverCommand::Position(0.5));
    rig.run_for(2_000);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert_eq!(rig.pulses(), vec![0, 4_000, 6_000]);
}

#[test]
fn toggle_follows_position_and_motion() {
    let mut rig = RigBuilder::new(timing(10_000, 10_000)).build();
    rig.cover.calibrate(0.2).expect("idle");

    assert_eq!(rig.cover.command(CoverCommand::Toggle), CommandOutcome::Started);
    assert_eq!(rig.cover.state(), CoverState::Opening);
    rig.run_until(1_000);
    assert_eq!(rig.cover.command(CoverCommand::Toggle), CommandOutcome::Stopped);
    assert!(approx(rig.cover.position().value(), 0.3));

    rig.run_until(1_600);
    assert_eq!(rig.cover.command(CoverCommand::Toggle), CommandOutcome::Started);
    assert_eq!(rig.cover.state(), CoverState::Opening);

    rig.cover.command(CoverCommand::Stop);
    rig.run_for(1_100);
    rig.cover.calibrate(0.8).expect("idle");
    rig.cover.command(CoverCommand::Toggle);
    assert_eq!(rig.cover.state(), CoverState::Closing);
}

#[test]
fn idle_cover_snaps_to_active_end_stop() {
    let mut rig = RigBuilder::new(timing(10_000, 10_000))
        .close_sensor()
        .build();
    assert!(!rig.cover.position().is_exact());
    rig.close_sensor.set(true);
    rig.run_for(10);
    assert!(rig.cover.position().is_exact());
    assert_eq!(rig.cover.position().value(), 0.0);
    assert_eq!(rig.cover.state(), CoverState::Idle);
    assert!(rig.sink.events().is_empty());
    assert!(rig.cover.traits().assumed_state);
}

#[test]
fn calibrate_refused_while_moving() {
    let mut rig = RigBuilder::new(timing(10_000, 10_000)).build();
    rig.cover.command(CoverCommand::Close);
    assert!(rig.cover.calibrate(0.3).is_err());
    assert!(rig.cover.calibrate(f32::INFINITY).is_err());
}

#[test]
fn report_tracks_live_position() {
    let mut rig = RigBuilder::new(timing(10_000, 10_000)).build();
    rig.cover.calibrate(0.0).expect("idle");
    rig.cover.command(CoverCommand::Open);
    rig.run_until(2_500);
    let r = rig.cover.report();
    assert_eq!(r.state, CoverState::Opening);
    assert!(approx(r.position.value(), 0.25));
    assert_eq!(r.cycles_in_window, 1);
    assert_eq!(r.operation(), impulse_core::CoverOperation::Opening);
}

#[test]
fn channel_sink_delivers_events_in_order() {
    use impulse_core::mocks::RecordingOutput;
    use impulse_core::{ChannelSink, ImpulseCover};
    use impulse_traits::ManualClock;
    use std::sync::Arc;

    let clock = ManualClock::new();
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut cover = ImpulseCover::builder()
        .with_output(RecordingOutput::new(clock.clone()))
        .with_timing(timing(1_000, 1_000))
        .with_event_sink(ChannelSink::new(tx))
        .with_clock(Arc::new(clock.clone()))
        .build()
        .expect("build");
    cover.calibrate(1.0).expect("idle");
    cover.command(CoverCommand::Close);
    for _ in 0..200 {
        clock.advance_ms(10);
        cover.tick();
    }
    let got: Vec<_> = rx.try_iter().collect();
    assert_eq!(got, vec![Close, Close, Idle]);
}
