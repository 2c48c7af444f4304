//! End-to-end scheduling scenarios: a single protocol, a batch sharing a
//! high-capacity station, online insertion, flex-and-reinsert, enforced
//! protocol order, and staged breakpoint solving.

use std::collections::HashMap;

use labsched::{Protocol, System, Task, Worker};

const SOLVE_TIME: f64 = 10.0;

fn workers() -> (Worker, Worker, Worker, Worker, Worker) {
    let hotplate = Worker::with_capacity("hotplate", 25).unwrap();
    let spincoater = Worker::with_capacity("spincoater", 1).unwrap();
    let storage = Worker::with_capacity("storage", 45).unwrap();
    let characterization = Worker::with_capacity("characterization", 1).unwrap();
    let arm = Worker::with_capacity("arm", 1).unwrap();
    (hotplate, spincoater, storage, characterization, arm)
}

fn transitions(
    hotplate: &Worker,
    spincoater: &Worker,
    storage: &Worker,
    characterization: &Worker,
    arm: &Worker,
) -> Vec<Task> {
    vec![
        Task::new_transition(
            28.0,
            storage.clone(),
            spincoater.clone(),
            vec![arm.clone()],
            vec![],
            false,
            HashMap::new(),
        )
        .unwrap(),
        Task::new_transition(
            20.0,
            spincoater.clone(),
            hotplate.clone(),
            vec![arm.clone()],
            vec![],
            false,
            HashMap::new(),
        )
        .unwrap(),
        Task::new_transition(
            15.0,
            hotplate.clone(),
            storage.clone(),
            vec![arm.clone()],
            vec![],
            false,
            HashMap::new(),
        )
        .unwrap(),
        Task::new_transition(
            15.0,
            storage.clone(),
            characterization.clone(),
            vec![arm.clone()],
            vec![],
            false,
            HashMap::new(),
        )
        .unwrap(),
        Task::new_transition(
            15.0,
            characterization.clone(),
            storage.clone(),
            vec![arm.clone()],
            vec![],
            false,
            HashMap::new(),
        )
        .unwrap(),
    ]
}

/// A System wired up like `example_system.py`'s fixtures: a spincoat ->
/// anneal -> rest -> characterize worklist, with storage as both endpoints.
fn build_system() -> (System, Worker, Worker, Worker, Worker) {
    let (hotplate, spincoater, storage, characterization, arm) = workers();
    let ts = transitions(&hotplate, &spincoater, &storage, &characterization, &arm);

    let system = System::new(
        vec![
            hotplate.clone(),
            spincoater.clone(),
            storage.clone(),
            characterization.clone(),
            arm,
        ],
        ts,
        Some(storage.clone()),
        Some(storage.clone()),
        false,
    )
    .unwrap();

    (system, hotplate, spincoater, storage, characterization)
}

fn sample_worklist(spincoater: &Worker, hotplate: &Worker, storage: &Worker, characterization: &Worker) -> Vec<Task> {
    let spincoat = Task::new(
        "spincoat",
        vec![spincoater.clone()],
        60.0,
        vec![],
        false,
        HashMap::new(),
        false,
        1,
    )
    .unwrap();
    let anneal = Task::new(
        "anneal",
        vec![hotplate.clone()],
        900.0,
        vec![],
        true,
        HashMap::new(),
        false,
        25,
    )
    .unwrap();
    let rest = Task::new(
        "rest",
        vec![storage.clone()],
        180.0,
        vec![],
        true,
        HashMap::new(),
        false,
        1,
    )
    .unwrap();
    let characterize = Task::new(
        "characterize",
        vec![characterization.clone()],
        300.0,
        vec![],
        false,
        HashMap::new(),
        false,
        1,
    )
    .unwrap();
    vec![spincoat, anneal, rest, characterize]
}

/// Invariant 1: protocol ordering, including exact-continuation for
/// immediate steps.
fn protocol_is_in_order(protocol: &Protocol) -> bool {
    for pair in protocol.worklist().windows(2) {
        let (task, following) = (&pair[0], &pair[1]);
        let (Some(task_end), Some(following_start)) = (task.end(), following.start()) else {
            return false;
        };
        if following.immediate() {
            if task_end != following_start {
                return false;
            }
        } else if task_end > following_start {
            return false;
        }
    }
    true
}

/// Invariant 2: worker capacity respected at every instant, via a sweep of
/// every distinct start/end timestamp on that worker.
fn capacity_respected(worker: &Worker, worklist: &[Task]) -> bool {
    let mut timestamps: Vec<i64> = worklist
        .iter()
        .flat_map(|t| [t.start(), t.end()])
        .flatten()
        .collect();
    timestamps.sort_unstable();
    timestamps.dedup();

    for &at in &timestamps {
        let load = worklist
            .iter()
            .filter(|t| matches!((t.start(), t.end()), (Some(s), Some(e)) if s <= at && at < e))
            .count() as u32;
        if load > worker.capacity() {
            return false;
        }
    }
    true
}

fn all_solved(protocol: &Protocol) -> bool {
    protocol.worklist().iter().all(|t| t.start().is_some() && t.end().is_some())
}

#[test]
fn s1_single_protocol_is_in_order_and_transitioned() {
    let (mut system, hotplate, spincoater, storage, characterization) = build_system();
    let worklist = sample_worklist(&spincoater, &hotplate, &storage, &characterization);

    let protocol = system
        .generate_protocol(worklist, None, 0, None, None)
        .unwrap();
    assert_eq!(protocol.len(), 9, "4 tasks + 5 transitions");

    system.solve(SOLVE_TIME).unwrap();

    assert!(all_solved(&protocol));
    assert!(protocol_is_in_order(&protocol));
    for w in system.workers() {
        assert!(capacity_respected(w, protocol.worklist()));
    }
}

#[test]
fn s2_ten_protocols_share_the_hotplate() {
    let (mut system, hotplate, spincoater, storage, characterization) = build_system();

    let mut protocols = Vec::new();
    for _ in 0..10 {
        let worklist = sample_worklist(&spincoater, &hotplate, &storage, &characterization);
        protocols.push(system.generate_protocol(worklist, None, 0, None, None).unwrap());
    }
    system.solve(SOLVE_TIME).unwrap();

    for protocol in &protocols {
        assert!(protocol_is_in_order(protocol));
    }

    let tasklist = system.scheduler().get_tasklist(false);
    let makespan = tasklist.iter().filter_map(Task::end).max().unwrap();
    let single_protocol_end = protocols[0]
        .worklist()
        .iter()
        .filter_map(Task::end)
        .max()
        .unwrap();
    assert!(
        makespan < 10 * single_protocol_end,
        "sharing the 25-slot hotplate must beat ten back-to-back runs"
    );
}

#[test]
fn s3_online_insert_preserves_prior_solution() {
    let (mut system, hotplate, spincoater, storage, characterization) = build_system();

    let mut protocols = Vec::new();
    for _ in 0..5 {
        let worklist = sample_worklist(&spincoater, &hotplate, &storage, &characterization);
        protocols.push(system.generate_protocol(worklist, None, 0, None, None).unwrap());
    }
    system.solve(SOLVE_TIME).unwrap();

    let prior_times: Vec<(i64, i64)> = protocols[2]
        .worklist()
        .iter()
        .map(|t| (t.start().unwrap(), t.end().unwrap()))
        .collect();

    let min_start = protocols[2].worklist().last().unwrap().end().unwrap();
    let new_worklist = sample_worklist(&spincoater, &hotplate, &storage, &characterization);
    let new_protocol = system
        .generate_protocol(new_worklist, None, min_start, None, None)
        .unwrap();
    system.solve(SOLVE_TIME).unwrap();

    let now_times: Vec<(i64, i64)> = protocols[2]
        .worklist()
        .iter()
        .map(|t| (t.start().unwrap(), t.end().unwrap()))
        .collect();
    assert_eq!(prior_times, now_times, "earlier protocols keep their times");
    assert!(protocol_is_in_order(&new_protocol));
}

#[test]
fn s4_flex_then_insert_resolves_consistently() {
    let (mut system, hotplate, spincoater, storage, characterization) = build_system();

    let mut protocols = Vec::new();
    for _ in 0..5 {
        let worklist = sample_worklist(&spincoater, &hotplate, &storage, &characterization);
        protocols.push(system.generate_protocol(worklist, None, 0, None, None).unwrap());
    }
    system.solve(SOLVE_TIME).unwrap();

    let cutoff = protocols[3].worklist().last().unwrap().end().unwrap();
    system.scheduler_mut().flex(cutoff);
    assert!(
        protocols.last().unwrap().worklist().last().unwrap().end().is_none(),
        "flex must clear the tail's solved end time"
    );

    let new_worklist = sample_worklist(&spincoater, &hotplate, &storage, &characterization);
    let new_protocol = system
        .generate_protocol(new_worklist, None, cutoff, None, None)
        .unwrap();
    system.solve(SOLVE_TIME).unwrap();

    for protocol in protocols.iter().chain(std::iter::once(&new_protocol)) {
        assert!(protocol_is_in_order(protocol));
    }
    for w in system.workers() {
        let all_tasks: Vec<Task> = protocols
            .iter()
            .chain(std::iter::once(&new_protocol))
            .flat_map(|p| p.worklist().to_vec())
            .collect();
        assert!(capacity_respected(w, &all_tasks));
    }
}

#[test]
fn s5_enforce_protocol_order_forces_first_protocol_to_start_at_zero() {
    // A single worker carries every step, so no transition graph is needed:
    // this isolates `enforce_protocol_order` from transition-splicing noise.
    let station = Worker::with_capacity("station", 1).unwrap();

    let mut system = System::new(
        vec![station.clone()],
        vec![],
        Some(station.clone()),
        None,
        false,
    )
    .unwrap();

    let long_task = Task::new("long", vec![station.clone()], 1000.0, vec![], false, HashMap::new(), false, 1).unwrap();
    let short_task = Task::new("short", vec![station.clone()], 1.0, vec![], false, HashMap::new(), false, 1).unwrap();

    let long_protocol = system
        .generate_protocol(vec![long_task], None, 0, None, None)
        .unwrap();
    for _ in 0..10 {
        system
            .generate_protocol(vec![short_task.clone()], None, 0, None, None)
            .unwrap();
    }
    system.solve(SOLVE_TIME).unwrap();
    assert!(long_protocol.worklist()[0].start().unwrap() > 0);

    system.scheduler_mut().flex(0);
    system.scheduler_mut().set_enforce_protocol_order(true);
    system.solve(SOLVE_TIME).unwrap();
    assert_eq!(long_protocol.worklist()[0].start().unwrap(), 0);
}

#[test]
fn s6_breakpoints_gate_solving_into_phases() {
    let station = Worker::with_capacity("station", 1).unwrap();

    let mut system = System::new(
        vec![station.clone()],
        vec![],
        Some(station.clone()),
        None,
        false,
    )
    .unwrap();

    let breakpoint_task = Task::new("task1", vec![station.clone()], 10.0, vec![], false, HashMap::new(), true, 1).unwrap();
    let chained = Task::new("task2", vec![station.clone()], 2.0, vec![], true, HashMap::new(), false, 1).unwrap();
    let trailing = Task::new("task3", vec![station.clone()], 2.0, vec![], false, HashMap::new(), false, 1).unwrap();

    let mut protocols = Vec::new();
    let mut breakpoint_instances = Vec::new();
    for _ in 0..10 {
        let protocol = system
            .generate_protocol(
                vec![breakpoint_task.clone(), chained.clone(), trailing.clone()],
                None,
                0,
                None,
                None,
            )
            .unwrap();
        breakpoint_instances.push(protocol.worklist()[0].clone());
        protocols.push(protocol);
    }

    system
        .scheduler_mut()
        .solve(SOLVE_TIME, &[breakpoint_instances.clone()])
        .unwrap();

    for protocol in &protocols {
        assert!(protocol_is_in_order(protocol));
    }

    let max_breakpoint_start = breakpoint_instances
        .iter()
        .map(|t| t.start().unwrap())
        .max()
        .unwrap();
    let min_past_breakpoint_start = protocols
        .iter()
        .map(|p| p.worklist()[2].start().unwrap())
        .min()
        .unwrap();
    assert!(max_breakpoint_start <= min_past_breakpoint_start);
}
