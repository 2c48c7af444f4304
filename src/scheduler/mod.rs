//! Scheduler: the core. Builds the constraint model for the current
//! tasklist, drives the solver, and writes solved times back onto the
//! protocols' tasks.

mod error;
mod model;
mod solver;
mod tasklist;

pub use error::SchedulerError;
pub use solver::SolverStatus;

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::protocol::Protocol;
use crate::task::Task;
use crate::worker::Worker;

use solver::{GoodLpBackend, SolverBackend};

/// Outcome of a [`Scheduler::solve`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveReport {
    pub status: SolverStatus,
}

/// The core scheduling engine.
///
/// Owns the set of registered protocols, the worker list they compete over,
/// and the flattened `tasklist` produced by the most recent solve pass.
/// `Scheduler::solve` is the only suspension point visible to callers: it
/// blocks for at most `solve_time` wall-clock seconds per phase.
pub struct Scheduler {
    workers: Vec<Worker>,
    protocols: Vec<Protocol>,
    enforce_protocol_order: bool,
    reservoir_workers: HashSet<String>,
    tasklist: Vec<Task>,
    last_tasklist_len: Option<usize>,
}

impl Scheduler {
    pub fn new(workers: Vec<Worker>, enforce_protocol_order: bool) -> Self {
        Self {
            workers,
            protocols: Vec::new(),
            enforce_protocol_order,
            reservoir_workers: HashSet::new(),
            tasklist: Vec::new(),
            last_tasklist_len: None,
        }
    }

    pub fn enforce_protocol_order(&self) -> bool {
        self.enforce_protocol_order
    }

    pub fn set_enforce_protocol_order(&mut self, flag: bool) {
        self.enforce_protocol_order = flag;
        self.last_tasklist_len = None;
    }

    /// Opts a worker into the reservoir formulation instead of the default
    /// cumulative constraint. Has no effect
    /// on unit-capacity workers, which always use no-overlap.
    pub fn enable_reservoir_for(&mut self, worker_name: impl Into<String>) {
        self.reservoir_workers.insert(worker_name.into());
    }

    /// Appends protocols not already registered (by `Protocol` equality,
    /// i.e. id-equal worklists).
    pub fn add_protocols(&mut self, protocols: Vec<Protocol>) {
        for p in protocols {
            if !self.protocols.contains(&p) {
                self.protocols.push(p);
            }
        }
    }

    pub fn clear_protocols(&mut self) {
        self.protocols.clear();
        self.tasklist.clear();
        self.last_tasklist_len = None;
    }

    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    /// Clears solved `start`/`end` fields for every task whose solved start
    /// is `>= t`, across every registered protocol, so a later `solve` can
    /// re-optimize the tail.
    ///
    /// Also invalidates the re-solve no-op check (see `solve_phase`): a solve
    /// immediately following a `flex` must actually run even if the
    /// tasklist's size comes out unchanged, since the tasklist-size check
    /// only guards against solving an untouched schedule twice in a row.
    pub fn flex(&mut self, t: i64) {
        for protocol in &self.protocols {
            for task in protocol.worklist() {
                if let Some(start) = task.start() {
                    if start >= t {
                        task.clear_solution();
                    }
                }
            }
        }
        self.last_tasklist_len = None;
    }

    /// Builds the model and runs the solver under a wall-clock budget,
    /// optionally staged across `breakpoints` phases.
    ///
    /// Each phase gets `solve_time / (1 + breakpoints.len())` seconds. After
    /// every staged phase a final, unconstrained-by-breakpoint pass is run
    /// over the full tasklist.
    pub fn solve(
        &mut self,
        solve_time: f64,
        breakpoints: &[Vec<Task>],
    ) -> Result<SolveReport, SchedulerError> {
        let phase_budget = solve_time / (1 + breakpoints.len()) as f64;

        let mut status = SolverStatus::Unknown;
        for bp in breakpoints {
            status = self.solve_phase(phase_budget, bp)?;
            eprintln!("intermediate solution status: {status}");
        }
        status = self.solve_phase(phase_budget, &[])?;
        eprintln!("solution status: {status}");

        Ok(SolveReport { status })
    }

    fn solve_phase(
        &mut self,
        solve_time: f64,
        breakpoints: &[Task],
    ) -> Result<SolverStatus, SchedulerError> {
        let tasklist = tasklist::build_tasklist(&self.protocols, breakpoints);

        if Some(tasklist.len()) == self.last_tasklist_len {
            eprintln!("previous solution still valid - add new protocols before solving again");
            self.tasklist = tasklist;
            return Ok(SolverStatus::Unknown);
        }

        let horizon = tasklist::horizon(&tasklist);
        let outcome = model::build_model(
            &tasklist,
            &self.workers,
            &self.protocols,
            self.enforce_protocol_order,
            &self.reservoir_workers,
            horizon,
        )?;

        let solved = GoodLpBackend.solve(outcome, solve_time)?;

        if solved.status.has_incumbent() {
            for task in &tasklist {
                if let (Some(&start), Some(&end)) =
                    (solved.starts.get(&task.id()), solved.ends.get(&task.id()))
                {
                    task.record_solution(start, end);
                }
            }
        }

        self.last_tasklist_len = Some(tasklist.len());
        self.tasklist = tasklist;
        Ok(solved.status)
    }

    /// Returns the tasklist from the most recent solve pass, sorted by
    /// start time. `only_recent` restricts the view to tasks newly solved in
    /// that pass (`solution_count <= 1`).
    pub fn get_tasklist(&self, only_recent: bool) -> Vec<Task> {
        let mut out: Vec<Task> = self
            .tasklist
            .iter()
            .filter(|t| !only_recent || t.solution_count() <= 1)
            .cloned()
            .collect();
        out.sort_by_key(|t| t.start().unwrap_or(i64::MAX));
        out
    }

    /// Same as [`Scheduler::get_tasklist`], grouped by each task's primary
    /// worker, insertion-ordered the same way the worker list was given to
    /// `Scheduler::new`.
    pub fn get_tasklist_by_worker(&self, only_recent: bool) -> IndexMap<String, Vec<Task>> {
        let mut out: IndexMap<String, Vec<Task>> = IndexMap::new();
        for w in &self.workers {
            out.insert(w.name().to_string(), Vec::new());
        }
        for task in &self.tasklist {
            if only_recent && task.solution_count() > 1 {
                continue;
            }
            out.entry(task.primary_worker().name().to_string())
                .or_default()
                .push(task.clone());
        }
        for bucket in out.values_mut() {
            bucket.sort_by_key(|t| t.start().unwrap_or(i64::MAX));
        }
        out
    }
}
