mod common;

use std::time::Duration;

use uml_hsm::{Event, ModelBuilder, StateMachine, TransitionKind};

use common::{wait_until, DEFAULT_TIMEOUT};

fn flip_flop_machine() -> StateMachine {
    let mut builder = ModelBuilder::new();
    let root = builder.add_root("root");
    let region = builder.add_region(root);
    let initial = builder.add_initial(region, "initial");
    let off = builder.add_simple_state(region, "off");
    let on = builder.add_simple_state(region, "on");

    builder.add_transition(initial, off, TransitionKind::External, None::<&str>, None, None);
    builder.add_transition(off, on, TransitionKind::External, Some("flip"), None, None);
    builder.add_transition(on, off, TransitionKind::External, Some("flip"), None, None);

    StateMachine::new(builder.build().unwrap())
}

#[test]
fn starts_in_off() {
    let machine = flip_flop_machine();
    machine.start().unwrap();
    assert!(wait_until(&machine, "off", DEFAULT_TIMEOUT));
    machine.stop().unwrap();
}

#[test]
fn flip_toggles_back_and_forth() {
    let machine = flip_flop_machine();
    machine.start().unwrap();
    assert!(wait_until(&machine, "off", DEFAULT_TIMEOUT));

    machine.post(Event::new("flip")).unwrap();
    assert!(wait_until(&machine, "on", DEFAULT_TIMEOUT));
    assert!(!machine.is_in_state("off"));

    machine.post(Event::new("flip")).unwrap();
    assert!(wait_until(&machine, "off", DEFAULT_TIMEOUT));
    assert!(!machine.is_in_state("on"));

    machine.stop().unwrap();
}

#[test]
fn start_is_idempotent_and_errors_when_already_running() {
    let machine = flip_flop_machine();
    machine.start().unwrap();
    assert!(machine.start().is_err());
    machine.stop().unwrap();
    assert!(machine.stop().is_err());
}

#[test]
fn reset_clears_configuration_until_next_start() {
    let machine = flip_flop_machine();
    machine.start().unwrap();
    assert!(wait_until(&machine, "off", DEFAULT_TIMEOUT));
    machine.post(Event::new("flip")).unwrap();
    assert!(wait_until(&machine, "on", DEFAULT_TIMEOUT));

    machine.stop().unwrap();
    machine.reset().unwrap();
    assert!(!machine.is_in_state("on"));
    assert!(!machine.is_in_state("off"));

    machine.start().unwrap();
    assert!(wait_until(&machine, "off", DEFAULT_TIMEOUT));
    machine.stop().unwrap();
}

#[test]
fn unrecognized_event_is_unhandled_and_leaves_state_unchanged() {
    let machine = flip_flop_machine();
    machine.start().unwrap();
    assert!(wait_until(&machine, "off", DEFAULT_TIMEOUT));

    machine.post(Event::new("nonsense")).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert!(machine.is_in_state("off"));

    machine.stop().unwrap();
}
