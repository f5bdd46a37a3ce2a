mod common;

use common::{RigBuilder, timing};
use impulse_core::{CoverCommand, CoverEvent, CoverState};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Command(CoverCommand),
    Wait(u64),
    Reset,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Command(CoverCommand::Open)),
        Just(Step::Command(CoverCommand::Close)),
        Just(Step::Command(CoverCommand::Stop)),
        Just(Step::Command(CoverCommand::Toggle)),
        (0.0f32..=1.0).prop_map(|p| Step::Command(CoverCommand::Position(p))),
        (1u64..4_000).prop_map(Step::Wait),
        Just(Step::Reset),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Rising edges are never closer than the pulse delay, whatever the
    // command sequence and timing.
    #[test]
    fn pulses_respect_pulse_delay(
        delay in 100u64..1_500,
        steps in proptest::collection::vec(step(), 1..60),
    ) {
        let mut t = timing(3_000, 4_000);
        t.pulse_delay_ms = delay;
        let mut rig = RigBuilder::new(t).safety(60_000, 20).build();
        for s in steps {
            match s {
                Step::Command(c) => { rig.cover.command(c); }
                Step::Wait(ms) => rig.run_for(ms),
                Step::Reset => { rig.cover.reset(); }
            }
            let p = rig.cover.position().value();
            prop_assert!((0.0..=1.0).contains(&p));
        }
        rig.run_for(10_000);
        let edges = rig.pulses();
        for w in edges.windows(2) {
            prop_assert!(w[1] - w[0] >= delay, "pulses at {} and {}", w[0], w[1]);
        }
    }

    // Lockout is entered at most once per reset, and no start pulse is
    // emitted while it holds.
    #[test]
    fn lockout_fires_once_and_blocks_starts(
        max in 1u8..=4,
        steps in proptest::collection::vec(step(), 1..80),
    ) {
        let mut rig = RigBuilder::new(timing(1_000, 1_000)).safety(30_000, max).build();
        let mut resets = 0usize;
        for s in steps {
            let locked_before = rig.cover.state() == CoverState::SafetyLockout;
            let pulses_before = rig.pulses().len();
            match s {
                Step::Command(c) => {
                    rig.cover.command(c);
                    if locked_before {
                        prop_assert_eq!(rig.pulses().len(), pulses_before);
                        prop_assert_eq!(rig.cover.state(), CoverState::SafetyLockout);
                    }
                }
                Step::Wait(ms) => rig.run_for(ms),
                Step::Reset => {
                    if rig.cover.reset() {
                        resets += 1;
                    }
                }
            }
        }
        prop_assert!(rig.sink.count(CoverEvent::SafetyLockout) <= resets + 1);
    }
}
