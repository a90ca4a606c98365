mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use uml_hsm::context::Hooks;
use uml_hsm::error::ErrorKind;
use uml_hsm::model::{ActionFn, GuardFn};
use uml_hsm::{Event, ModelBuilder, StateMachine, TransitionKind};

use common::{wait_until, DEFAULT_TIMEOUT};

fn always(value: bool) -> GuardFn {
    Arc::new(move |_ctx| Ok(value))
}

fn failing_action() -> ActionFn {
    Arc::new(|_ctx| Err("boom".into()))
}

#[test]
fn first_passing_guard_wins_in_declaration_order() {
    let mut builder = ModelBuilder::new();
    let root = builder.add_root("root");
    let region = builder.add_region(root);
    let initial = builder.add_initial(region, "initial");
    let idle = builder.add_simple_state(region, "idle");
    let blocked = builder.add_simple_state(region, "blocked");
    let allowed = builder.add_simple_state(region, "allowed");

    builder.add_transition(initial, idle, TransitionKind::External, None::<&str>, None, None);
    // Declared first but its guard always fails: must be skipped in favor
    // of the next candidate rather than consuming the event unhandled.
    builder.add_transition(
        idle,
        blocked,
        TransitionKind::External,
        Some("go"),
        Some(always(false)),
        None,
    );
    builder.add_transition(
        idle,
        allowed,
        TransitionKind::External,
        Some("go"),
        Some(always(true)),
        None,
    );

    let machine = StateMachine::new(builder.build().unwrap());
    machine.start().unwrap();
    assert!(wait_until(&machine, "idle", DEFAULT_TIMEOUT));

    machine.post(Event::new("go")).unwrap();
    assert!(wait_until(&machine, "allowed", DEFAULT_TIMEOUT));
    assert!(!machine.is_in_state("blocked"));

    machine.stop().unwrap();
}

#[test]
fn guard_failure_leaves_event_unhandled_when_no_candidate_passes() {
    let mut builder = ModelBuilder::new();
    let root = builder.add_root("root");
    let region = builder.add_region(root);
    let initial = builder.add_initial(region, "initial");
    let idle = builder.add_simple_state(region, "idle");
    let target = builder.add_simple_state(region, "target");

    builder.add_transition(initial, idle, TransitionKind::External, None::<&str>, None, None);
    builder.add_transition(
        idle,
        target,
        TransitionKind::External,
        Some("go"),
        Some(always(false)),
        None,
    );

    let machine = StateMachine::new(builder.build().unwrap());
    machine.start().unwrap();
    assert!(wait_until(&machine, "idle", DEFAULT_TIMEOUT));

    machine.post(Event::new("go")).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert!(machine.is_in_state("idle"));
    assert!(!machine.is_in_state("target"));

    machine.stop().unwrap();
}

#[test]
fn action_failure_freezes_configuration_and_notifies_exception_hook() {
    let mut builder = ModelBuilder::new();
    let root = builder.add_root("root");
    let region = builder.add_region(root);
    let initial = builder.add_initial(region, "initial");
    let idle = builder.add_simple_state(region, "idle");
    let target = builder.add_simple_state(region, "target");

    builder.add_transition(initial, idle, TransitionKind::External, None::<&str>, None, None);
    builder.add_transition(
        idle,
        target,
        TransitionKind::External,
        Some("go"),
        None,
        Some(failing_action()),
    );

    let exceptions: Arc<Mutex<Vec<ErrorKind>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = exceptions.clone();
    let hooks = Hooks {
        on_exception: Some(Arc::new(move |kind, _state, _transition| {
            recorded.lock().unwrap().push(kind);
        })),
        ..Hooks::default()
    };

    let machine = StateMachine::with_hooks(builder.build().unwrap(), hooks);
    machine.start().unwrap();
    assert!(wait_until(&machine, "idle", DEFAULT_TIMEOUT));

    machine.post(Event::new("go")).unwrap();
    std::thread::sleep(Duration::from_millis(50));

    // "idle" was already exited before the transition's action ran; the
    // action's failure means "target" was never entered either.
    assert!(!machine.is_in_state("idle"));
    assert!(!machine.is_in_state("target"));
    assert_eq!(*exceptions.lock().unwrap(), vec![ErrorKind::ActionFailed]);

    machine.stop().unwrap();
}
