mod common;

use uml_hsm::{Event, ModelBuilder, StateMachine, TransitionKind};

use common::{wait_until, DEFAULT_TIMEOUT};

fn fork_join_machine() -> StateMachine {
    let mut builder = ModelBuilder::new();
    let root = builder.add_root("root");
    let top = builder.add_region(root);
    let top_initial = builder.add_initial(top, "top_initial");
    let working = builder.add_composite_state(top, "working");
    let finished = builder.add_simple_state(top, "finished");
    builder.add_transition(top_initial, working, TransitionKind::External, None::<&str>, None, None);

    let region_a = builder.add_region(working);
    let initial_a = builder.add_initial(region_a, "initial_a");
    let task_a = builder.add_simple_state(region_a, "taskA");
    builder.add_transition(initial_a, task_a, TransitionKind::External, None::<&str>, None, None);

    let region_b = builder.add_region(working);
    let initial_b = builder.add_initial(region_b, "initial_b");
    let task_b = builder.add_simple_state(region_b, "taskB");
    builder.add_transition(initial_b, task_b, TransitionKind::External, None::<&str>, None, None);

    let join = builder.add_fork_join(working, "join");
    builder.add_transition(task_a, join, TransitionKind::External, Some("doneA"), None, None);
    builder.add_transition(task_b, join, TransitionKind::External, Some("doneB"), None, None);
    builder.add_transition(join, finished, TransitionKind::External, None::<&str>, None, None);

    StateMachine::new(builder.build().unwrap())
}

#[test]
fn both_branches_run_concurrently_before_join() {
    let machine = fork_join_machine();
    machine.start().unwrap();
    assert!(wait_until(&machine, "taskA", DEFAULT_TIMEOUT));
    assert!(machine.is_in_state("taskB"));
    machine.stop().unwrap();
}

#[test]
fn join_waits_for_both_incoming_transitions() {
    let machine = fork_join_machine();
    machine.start().unwrap();
    assert!(wait_until(&machine, "taskA", DEFAULT_TIMEOUT));

    machine.post(Event::new("doneA")).unwrap();
    // Only one branch arrived: the machine must not have reached "finished"
    // yet, and "working" is still the active composite.
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert!(!machine.is_in_state("finished"));
    assert!(machine.is_in_state("taskB"));

    machine.post(Event::new("doneB")).unwrap();
    assert!(wait_until(&machine, "finished", DEFAULT_TIMEOUT));
    assert!(!machine.is_in_state("taskA"));
    assert!(!machine.is_in_state("taskB"));
    assert!(!machine.is_in_state("working"));

    machine.stop().unwrap();
}

#[test]
fn join_order_does_not_matter() {
    let machine = fork_join_machine();
    machine.start().unwrap();
    assert!(wait_until(&machine, "taskA", DEFAULT_TIMEOUT));

    machine.post(Event::new("doneB")).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert!(!machine.is_in_state("finished"));

    machine.post(Event::new("doneA")).unwrap();
    assert!(wait_until(&machine, "finished", DEFAULT_TIMEOUT));

    machine.stop().unwrap();
}
