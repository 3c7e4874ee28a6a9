mod support;

use core::time::Duration;

use button_core::control::HostTransition;
use button_core::power::{
    ButtonAction, PowerButtonStateMachine, PowerButtonTimings, PowerOpState, PowerStep,
};
use button_core::timer::PollTimer;
use heapless::Vec;

use support::{MockInstant, MockTimer};

type Machine = PowerButtonStateMachine<MockTimer>;

fn machine() -> Machine {
    let timings = PowerButtonTimings::new(
        Duration::from_secs(4),
        Duration::from_secs(30),
        Duration::from_secs(15),
        Duration::from_secs(1),
    );
    PowerButtonStateMachine::new(timings, MockTimer::new()).expect("timings are valid")
}

/// Delivers every due timer fire between `from` and `to` (inclusive), one
/// millisecond apart, the way the dispatcher would.
fn run_ticks(
    sm: &mut Machine,
    from: MockInstant,
    to: MockInstant,
) -> Vec<(MockInstant, PowerStep), 32> {
    let mut changes = Vec::new();
    let mut now = from;
    while now <= to {
        if sm.poll_timer(now) {
            let step = sm.on_tick(now);
            if step.changed() || step.action != ButtonAction::None {
                changes.push((now, step)).expect("change log full");
            }
        }
        now = MockInstant(now.0 + 1);
    }
    changes
}

#[test]
fn release_before_hold_cancels_without_request() {
    let mut sm = machine();
    sm.on_press(MockInstant::secs(0));

    let changes = run_ticks(&mut sm, MockInstant::secs(0), MockInstant::secs(2));
    assert!(changes.is_empty());

    let step = sm.on_release(MockInstant::secs(2));
    assert_eq!(step.to, PowerOpState::ButtonNotPressed);
    assert_eq!(step.action, ButtonAction::None);
    assert!(!sm.timer().is_running());
    assert_eq!(sm.deadline(), None);
}

#[test]
fn held_continuously_runs_dpo_then_fpo_then_long_press() {
    let mut sm = machine();
    let press = sm.on_press(MockInstant::secs(0));
    assert_eq!(press.to, PowerOpState::ButtonPressed);

    let changes = run_ticks(&mut sm, MockInstant::secs(0), MockInstant::secs(70));
    let summary: Vec<(u64, PowerOpState, ButtonAction), 8> = changes
        .iter()
        .map(|(at, step)| (at.0, step.to, step.action))
        .collect();

    // Deadlines are strict and ticks land on the poll grid, so each timeout is
    // observed on the first tick after it.
    assert_eq!(
        summary.as_slice(),
        &[
            (5_000, PowerOpState::DpoInitiated, ButtonAction::None),
            (36_000, PowerOpState::FpoInitiated, ButtonAction::None),
            (52_000, PowerOpState::ButtonNotPressed, ButtonAction::LongPress),
        ]
    );
    assert!(!sm.timer().is_running());
}

#[test]
fn nominal_timeline_follows_deadlines() {
    let mut sm = machine();
    sm.on_press(MockInstant::secs(0));
    assert_eq!(sm.deadline(), Some(MockInstant::secs(4)));

    assert_eq!(sm.on_tick(MockInstant::ms(4_001)).to, PowerOpState::DpoInitiated);
    assert_eq!(sm.deadline(), Some(MockInstant::ms(34_001)));

    assert_eq!(sm.on_tick(MockInstant::ms(34_002)).to, PowerOpState::FpoInitiated);
    assert_eq!(sm.deadline(), Some(MockInstant::ms(49_002)));

    let last = sm.on_tick(MockInstant::ms(49_003));
    assert_eq!(last.to, PowerOpState::ButtonNotPressed);
    assert_eq!(last.action, ButtonAction::LongPress);
}

#[test]
fn repeated_press_while_pressed_is_idempotent() {
    let mut sm = machine();
    sm.on_press(MockInstant::secs(0));
    let fire = sm.timer().next_fire();

    let again = sm.on_press(MockInstant::ms(1_500));
    assert!(!again.changed());
    assert_eq!(sm.state(), PowerOpState::ButtonPressed);
    assert_eq!(sm.deadline(), Some(MockInstant::secs(4)));
    assert_eq!(sm.timer().next_fire(), fire);
}

#[test]
fn release_during_dpo_completes_graceful_off_once() {
    let mut sm = machine();
    sm.on_press(MockInstant::secs(0));
    run_ticks(&mut sm, MockInstant::secs(0), MockInstant::secs(5));
    assert_eq!(sm.state(), PowerOpState::DpoInitiated);
    let dpo_deadline = sm.deadline();

    let release = sm.on_release(MockInstant::secs(10));
    assert_eq!(release.to, PowerOpState::DpoFpoSeparation);
    assert_eq!(sm.deadline(), dpo_deadline);

    let changes = run_ticks(&mut sm, MockInstant::secs(10), MockInstant::secs(80));
    let offs = changes
        .iter()
        .filter(|(_, step)| {
            step.action == ButtonAction::RequestHostTransition(HostTransition::Off)
        })
        .count();
    assert_eq!(offs, 1);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].0, MockInstant::secs(36));
    assert_eq!(changes[0].1.to, PowerOpState::ButtonNotPressed);
    assert!(!sm.timer().is_running());
}

#[test]
fn press_during_separation_escalates_to_fpo() {
    let mut sm = machine();
    sm.on_press(MockInstant::secs(0));
    run_ticks(&mut sm, MockInstant::secs(0), MockInstant::secs(5));
    sm.on_release(MockInstant::secs(10));

    let press = sm.on_press(MockInstant::secs(20));
    assert_eq!(press.from, PowerOpState::DpoFpoSeparation);
    assert_eq!(press.to, PowerOpState::FpoInitiated);
    assert_eq!(sm.deadline(), Some(MockInstant::secs(35)));
    assert_eq!(sm.timer().next_fire(), Some(MockInstant::secs(21)));

    let changes = run_ticks(&mut sm, MockInstant::secs(20), MockInstant::secs(60));
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].0, MockInstant::secs(36));
    assert_eq!(changes[0].1.action, ButtonAction::LongPress);
}

#[derive(Clone, Copy, Debug)]
enum Input {
    Press(u64),
    Release(u64),
    Tick(u64),
}

struct Case {
    name: &'static str,
    inputs: &'static [Input],
    state: PowerOpState,
    actions: &'static [ButtonAction],
}

const CASES: &[Case] = &[
    Case {
        name: "idle ignores release and ticks",
        inputs: &[Input::Release(100), Input::Tick(50_000)],
        state: PowerOpState::ButtonNotPressed,
        actions: &[],
    },
    Case {
        name: "tick exactly at hold deadline",
        inputs: &[Input::Press(0), Input::Tick(4_000)],
        state: PowerOpState::ButtonPressed,
        actions: &[],
    },
    Case {
        name: "tick past hold deadline",
        inputs: &[Input::Press(0), Input::Tick(4_001)],
        state: PowerOpState::DpoInitiated,
        actions: &[],
    },
    Case {
        name: "press ignored during dpo",
        inputs: &[Input::Press(0), Input::Tick(4_001), Input::Press(6_000)],
        state: PowerOpState::DpoInitiated,
        actions: &[],
    },
    Case {
        name: "separation times out on dpo deadline",
        inputs: &[
            Input::Press(0),
            Input::Tick(4_001),
            Input::Release(5_000),
            Input::Tick(34_001),
            Input::Tick(34_002),
        ],
        state: PowerOpState::ButtonNotPressed,
        actions: &[ButtonAction::RequestHostTransition(HostTransition::Off)],
    },
    Case {
        name: "fpo ignores release",
        inputs: &[
            Input::Press(0),
            Input::Tick(4_001),
            Input::Tick(34_002),
            Input::Release(35_000),
        ],
        state: PowerOpState::FpoInitiated,
        actions: &[],
    },
    Case {
        name: "restart after long press",
        inputs: &[
            Input::Press(0),
            Input::Tick(4_001),
            Input::Tick(34_002),
            Input::Tick(49_003),
            Input::Release(50_000),
            Input::Press(51_000),
        ],
        state: PowerOpState::ButtonPressed,
        actions: &[ButtonAction::LongPress],
    },
];

#[test]
fn replay_table_matches_transition_rules() {
    for case in CASES {
        let mut sm = machine();
        let mut actions: Vec<ButtonAction, 8> = Vec::new();
        for input in case.inputs {
            let step = match *input {
                Input::Press(at) => sm.on_press(MockInstant(at)),
                Input::Release(at) => sm.on_release(MockInstant(at)),
                Input::Tick(at) => sm.on_tick(MockInstant(at)),
            };
            if step.action != ButtonAction::None {
                actions.push(step.action).expect("action log full");
            }
        }

        assert_eq!(sm.state(), case.state, "{}", case.name);
        assert_eq!(actions.as_slice(), case.actions, "{}", case.name);
        assert_eq!(
            sm.timer().is_running(),
            sm.state().is_timed(),
            "{}: timer runs only in timed states",
            case.name
        );
    }
}
