//! Constraint-model construction: lowers a tasklist plus worker/transition
//! topology into `good_lp` decision variables and linear constraints.
//!
//! `good_lp` has no native interval, no-overlap, cumulative or reservoir
//! primitives (unlike the CP-SAT-style solver this crate's interface is
//! modeled after), so each of those is lowered here to a standard big-M /
//! disjunctive / event-ordering linear encoding before being handed to the
//! backend.

use std::collections::{HashMap, HashSet};

use good_lp::{constraint, variable, Constraint, Expression, ProblemVariables, Solution, Variable};

use crate::id::Id;
use crate::protocol::Protocol;
use crate::task::Task;
use crate::worker::Worker;

use super::error::SchedulerError;

/// A task's start or end time as seen by the model: either a variable to be
/// solved for, or a constant already fixed by a previous solve pass.
#[derive(Clone, Copy)]
pub(crate) enum TaskVar {
    Constant(i64),
    Variable(Variable),
}

impl TaskVar {
    fn expr(&self) -> Expression {
        match self {
            TaskVar::Constant(v) => (*v as f64).into(),
            TaskVar::Variable(v) => (*v).into(),
        }
    }

    /// Reads back the solved value: the constant itself, or the variable's
    /// value rounded to the nearest integer.
    pub(crate) fn resolve(&self, solution: &dyn Solution) -> i64 {
        match self {
            TaskVar::Constant(v) => *v,
            TaskVar::Variable(v) => solution.value(*v).round() as i64,
        }
    }
}

/// The assembled model, ready to be handed to a [`super::solver::SolverBackend`].
pub(crate) struct ModelOutcome {
    pub vars: ProblemVariables,
    pub makespan: Variable,
    pub constraints: Vec<Constraint>,
    pub end_vars: HashMap<Id, TaskVar>,
    pub start_vars: HashMap<Id, TaskVar>,
}

fn resolve_end(task: &Task, end_vars: &HashMap<Id, TaskVar>) -> Result<TaskVar, SchedulerError> {
    if let Some(v) = end_vars.get(&task.id()) {
        return Ok(*v);
    }
    if let Some(e) = task.end() {
        return Ok(TaskVar::Constant(e));
    }
    Err(SchedulerError::ModelBuildFailed(format!(
        "task \"{}\" has no solved end time and is absent from the current tasklist",
        task.name()
    )))
}

fn resolve_start(task: &Task, start_vars: &HashMap<Id, TaskVar>) -> Result<TaskVar, SchedulerError> {
    if let Some(v) = start_vars.get(&task.id()) {
        return Ok(*v);
    }
    if let Some(s) = task.start() {
        return Ok(TaskVar::Constant(s));
    }
    Err(SchedulerError::ModelBuildFailed(format!(
        "task \"{}\" has no solved start time and is absent from the current tasklist",
        task.name()
    )))
}

/// Builds decision variables for every task in `tasklist`, plus the
/// worker-capacity, sample-span, protocol-order, and objective constraints.
pub(crate) fn build_model(
    tasklist: &[Task],
    workers: &[Worker],
    protocols: &[Protocol],
    enforce_protocol_order: bool,
    reservoir_workers: &HashSet<String>,
    horizon: i64,
) -> Result<ModelOutcome, SchedulerError> {
    let mut vars = ProblemVariables::new();
    let mut constraints = Vec::new();

    let mut end_vars: HashMap<Id, TaskVar> = HashMap::with_capacity(tasklist.len());
    for task in tasklist {
        let end_var = if let Some(e) = task.end() {
            TaskVar::Constant(e)
        } else {
            let lower = (task.duration() as i64 + task.min_start()) as f64;
            let v = vars.add(variable().integer().clamp(lower, horizon as f64));
            TaskVar::Variable(v)
        };
        end_vars.insert(task.id(), end_var);
    }

    let mut start_vars: HashMap<Id, TaskVar> = HashMap::with_capacity(tasklist.len());
    for task in tasklist {
        let precedent = task.precedent();
        let start_var = if task.immediate() && !precedent.is_empty() {
            let last = precedent.last().expect("checked non-empty above");
            resolve_end(last, &end_vars)?
        } else if let Some(s) = task.start() {
            TaskVar::Constant(s)
        } else {
            let v = vars.add(
                variable()
                    .integer()
                    .min(task.min_start() as f64)
                    .max(horizon as f64),
            );
            for p in &precedent {
                let p_end = resolve_end(p, &end_vars)?.expr();
                constraints.push(constraint!(v >= p_end));
            }
            TaskVar::Variable(v)
        };
        start_vars.insert(task.id(), start_var);
    }

    // `good_lp` has no `NewIntervalVar`-equivalent linking start, duration,
    // and end together: without this, end_var only carries a lower bound
    // (line above) and start_var floats independently, so the solver is
    // free to decouple them entirely. Tie them with an explicit equality
    // for every task whose start and end aren't both already-solved
    // constants (nothing to constrain there).
    for task in tasklist {
        let start_var = start_vars[&task.id()];
        let end_var = end_vars[&task.id()];
        if matches!((start_var, end_var), (TaskVar::Constant(_), TaskVar::Constant(_))) {
            continue;
        }
        constraints.push(constraint!(end_var.expr() - start_var.expr() == task.duration() as f64));
    }

    for worker in workers {
        // A shared high-capacity task instance (one Task id reused across
        // several protocols, e.g. the oven in S2) appears once per protocol
        // in `tasklist`. It must still contribute exactly one interval to
        // this worker's constraints, not one per occurrence, or the
        // per-task slot/ordering variables below end up keyed to the same
        // id multiple times and the pairwise loop emits a task against
        // itself.
        let mut seen_ids = HashSet::new();
        let on_worker: Vec<&Task> = tasklist
            .iter()
            .filter(|t| t.workers().iter().any(|w| w == worker))
            .filter(|t| seen_ids.insert(t.id()))
            .collect();
        if on_worker.len() < 2 {
            continue;
        }
        if worker.is_unit_capacity() {
            add_no_overlap(&mut vars, &mut constraints, &on_worker, &start_vars, &end_vars, horizon)?;
        } else if reservoir_workers.contains(worker.name()) {
            add_reservoir(&mut vars, &mut constraints, worker, &on_worker, &start_vars, &end_vars, horizon)?;
        } else {
            add_cumulative(
                &mut vars,
                &mut constraints,
                worker.capacity(),
                &on_worker,
                &start_vars,
                &end_vars,
                horizon,
            )?;
        }
    }

    add_sample_spans(&mut vars, &mut constraints, protocols, &start_vars, &end_vars, horizon)?;

    if enforce_protocol_order {
        add_protocol_order(&mut constraints, protocols, &start_vars)?;
    }

    let makespan = vars.add(variable().integer().min(0.0));
    for end_var in end_vars.values() {
        if let TaskVar::Variable(v) = end_var {
            constraints.push(constraint!(makespan >= *v));
        }
    }

    Ok(ModelOutcome {
        vars,
        makespan,
        constraints,
        end_vars,
        start_vars,
    })
}

/// Unit-capacity case: pairwise disjunctive big-M no-overlap.
fn add_no_overlap(
    vars: &mut ProblemVariables,
    constraints: &mut Vec<Constraint>,
    tasks: &[&Task],
    start_vars: &HashMap<Id, TaskVar>,
    end_vars: &HashMap<Id, TaskVar>,
    horizon: i64,
) -> Result<(), SchedulerError> {
    let m = horizon as f64;
    for i in 0..tasks.len() {
        for j in (i + 1)..tasks.len() {
            let start_i = resolve_start(tasks[i], start_vars)?.expr();
            let end_i = resolve_end(tasks[i], end_vars)?.expr();
            let start_j = resolve_start(tasks[j], start_vars)?.expr();
            let end_j = resolve_end(tasks[j], end_vars)?.expr();

            let order = vars.add(variable().binary());
            // end_i <= start_j + M*(1 - order)
            constraints.push(constraint!(end_i.clone() - start_j.clone() + m * order <= m));
            // end_j <= start_i + M*order
            constraints.push(constraint!(end_j - start_i - m * order <= 0.0));
        }
    }
    Ok(())
}

/// Capacity > 1 case: identical-parallel-slot assignment. Each task
/// picks exactly one of `capacity` slots; two tasks assigned the same slot
/// are ordered by the same big-M disjunction as the unit-capacity case, with
/// the ordering relaxed away (via two extra big-M slack terms) whenever they
/// land on different slots.
fn add_cumulative(
    vars: &mut ProblemVariables,
    constraints: &mut Vec<Constraint>,
    capacity: u32,
    tasks: &[&Task],
    start_vars: &HashMap<Id, TaskVar>,
    end_vars: &HashMap<Id, TaskVar>,
    horizon: i64,
) -> Result<(), SchedulerError> {
    let m = horizon as f64;
    let mut slot_of: HashMap<Id, Vec<Variable>> = HashMap::with_capacity(tasks.len());
    for task in tasks {
        let slots: Vec<Variable> = (0..capacity).map(|_| vars.add(variable().binary())).collect();
        let sum: Expression = slots.iter().copied().sum();
        constraints.push(constraint!(sum == 1.0));
        slot_of.insert(task.id(), slots);
    }

    for i in 0..tasks.len() {
        for j in (i + 1)..tasks.len() {
            let start_i = resolve_start(tasks[i], start_vars)?.expr();
            let end_i = resolve_end(tasks[i], end_vars)?.expr();
            let start_j = resolve_start(tasks[j], start_vars)?.expr();
            let end_j = resolve_end(tasks[j], end_vars)?.expr();

            let order = vars.add(variable().binary());
            let slots_i = &slot_of[&tasks[i].id()];
            let slots_j = &slot_of[&tasks[j].id()];
            for k in 0..capacity as usize {
                let x_ik = slots_i[k];
                let x_jk = slots_j[k];
                // end_i <= start_j + M*(1-order) + M*(1-x_ik) + M*(1-x_jk)
                constraints.push(constraint!(
                    end_i.clone() - start_j.clone() + m * order + m * x_ik + m * x_jk <= 3.0 * m
                ));
                // end_j <= start_i + M*order + M*(1-x_ik) + M*(1-x_jk)
                constraints.push(constraint!(
                    end_j.clone() - start_i.clone() - m * order + m * x_ik + m * x_jk <= 2.0 * m
                ));
            }
        }
    }
    Ok(())
}

/// Reservoir variant (opt-in): tracks a fill level that moves +1 at
/// every Transition whose destination is this worker and -1 at every
/// Transition whose source is this worker, starting from `initial_fill`, and
/// bounds the level within `[0, capacity]` at every event. Event order is
/// decided by the same pairwise big-M technique as no-overlap; since each
/// event's delta is a known constant, the level just after an event is a
/// linear expression in the ordering binaries.
fn add_reservoir(
    vars: &mut ProblemVariables,
    constraints: &mut Vec<Constraint>,
    worker: &Worker,
    tasks: &[&Task],
    start_vars: &HashMap<Id, TaskVar>,
    end_vars: &HashMap<Id, TaskVar>,
    horizon: i64,
) -> Result<(), SchedulerError> {
    struct Event<'a> {
        task: &'a Task,
        time: Expression,
        delta: i64,
    }

    let mut events = Vec::new();
    for task in tasks {
        if task.transition_destination().as_ref() == Some(worker) {
            events.push(Event {
                task,
                time: resolve_end(task, end_vars)?.expr(),
                delta: 1,
            });
        }
        if task.transition_source().as_ref() == Some(worker) {
            events.push(Event {
                task,
                time: resolve_start(task, start_vars)?.expr(),
                delta: -1,
            });
        }
    }
    if events.len() < 2 {
        return Ok(());
    }

    let m = horizon as f64;
    let mut order: HashMap<(usize, usize), Variable> = HashMap::new();
    for i in 0..events.len() {
        for j in (i + 1)..events.len() {
            let b = vars.add(variable().binary());
            order.insert((i, j), b);
            // event i before event j: time_i <= time_j + M*(1-b)
            constraints.push(constraint!(
                events[i].time.clone() - events[j].time.clone() + m * b <= m
            ));
            // event j before event i: time_j <= time_i + M*b
            constraints.push(constraint!(
                events[j].time.clone() - events[i].time.clone() - m * b <= 0.0
            ));
        }
    }

    for (e, event) in events.iter().enumerate() {
        let base: Expression = (worker.initial_fill() as f64).into();
        let own: Expression = if event.delta == 1 { 1.0.into() } else { (-1.0).into() };
        let mut level = base + own;
        for (f, other) in events.iter().enumerate() {
            if f == e {
                continue;
            }
            let before: Expression = if f < e {
                order[&(f, e)].into()
            } else {
                let complement: Expression = order[&(e, f)].into();
                Expression::from(1.0) - complement
            };
            level = if other.delta == 1 {
                level + before
            } else {
                level - before
            };
        }
        constraints.push(constraint!(level.clone() >= 0.0));
        constraints.push(constraint!(level <= worker.capacity() as f64));
        let _ = event.task;
    }

    Ok(())
}

/// Spans a sample's residency on a unit-capacity worker from the
/// arrival Transition's start to the first matching departure Transition's
/// end, and forbids these spans from interleaving per worker.
fn add_sample_spans(
    vars: &mut ProblemVariables,
    constraints: &mut Vec<Constraint>,
    protocols: &[Protocol],
    start_vars: &HashMap<Id, TaskVar>,
    end_vars: &HashMap<Id, TaskVar>,
    horizon: i64,
) -> Result<(), SchedulerError> {
    let mut spans_by_worker: HashMap<String, Vec<(Expression, Expression)>> = HashMap::new();

    for protocol in protocols {
        let worklist = protocol.worklist();
        for (i, t0) in worklist.iter().enumerate() {
            let Some(destination) = t0.transition_destination() else {
                continue;
            };
            if !destination.is_unit_capacity() {
                continue;
            }
            let departure = worklist[i + 1..].iter().find(|t1| {
                t1.transition_source()
                    .map(|s| s == destination)
                    .unwrap_or(false)
            });
            let Some(t1) = departure else {
                continue;
            };
            let (Ok(span_start), Ok(span_end)) =
                (resolve_start(t0, start_vars), resolve_end(t1, end_vars))
            else {
                continue;
            };
            spans_by_worker
                .entry(destination.name().to_string())
                .or_default()
                .push((span_start.expr(), span_end.expr()));
        }
    }

    let m = horizon as f64;
    for spans in spans_by_worker.values() {
        for i in 0..spans.len() {
            for j in (i + 1)..spans.len() {
                let (start_i, end_i) = spans[i].clone();
                let (start_j, end_j) = spans[j].clone();
                let order = vars.add(variable().binary());
                constraints.push(constraint!(end_i - start_j.clone() + m * order <= m));
                constraints.push(constraint!(end_j - start_i - m * order <= 0.0));
            }
        }
    }
    Ok(())
}

/// Strict start-time ordering between adjacent protocols' first
/// tasks, realized as `>= 1` since all scheduling variables are integers.
fn add_protocol_order(
    constraints: &mut Vec<Constraint>,
    protocols: &[Protocol],
    start_vars: &HashMap<Id, TaskVar>,
) -> Result<(), SchedulerError> {
    for pair in protocols.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let (Some(prev_first), Some(next_first)) = (prev.first(), next.first()) else {
            continue;
        };
        let prev_start = resolve_start(prev_first, start_vars)?.expr();
        let next_start = resolve_start(next_first, start_vars)?.expr();
        constraints.push(constraint!(next_start - prev_start >= 1.0));
    }
    Ok(())
}
