//! Solver backend: drives a real mixed-integer solver crate behind a small
//! trait, so the rest of the Scheduler never names a specific solver crate
//! directly, treating the constraint solver engine as an opaque external
//! collaborator reached here through `good_lp` rather than reimplemented.

use std::collections::HashMap;

use good_lp::{Expression, ResolutionError, Solution, SolverModel};

use crate::id::Id;

use super::error::SchedulerError;
use super::model::ModelOutcome;

/// Terminal status of one solve pass, mirroring the vocabulary CP-SAT itself
/// uses: `Optimal`/`Feasible` carry a usable incumbent, `Infeasible` and
/// `Unknown` do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unknown,
}

impl SolverStatus {
    /// Whether solved values from this pass should be trusted at all.
    pub fn has_incumbent(self) -> bool {
        matches!(self, SolverStatus::Optimal | SolverStatus::Feasible)
    }
}

impl std::fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SolverStatus::Optimal => "OPTIMAL",
            SolverStatus::Feasible => "FEASIBLE",
            SolverStatus::Infeasible => "INFEASIBLE",
            SolverStatus::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Solved start/end times for every task id that had a variable or constant
/// in the model, keyed by task id.
pub(crate) struct SolvedTimes {
    pub status: SolverStatus,
    pub starts: HashMap<Id, i64>,
    pub ends: HashMap<Id, i64>,
}

/// Abstraction over the underlying constraint solver. Isolating this as a
/// trait keeps `Scheduler` decoupled from `good_lp`'s own API, the way the
/// original implementation's direct `ortools.sat.python.cp_model` dependency
/// never leaked past its own `scheduler.py`.
pub(crate) trait SolverBackend {
    fn solve(&self, outcome: ModelOutcome, solve_time: f64) -> Result<SolvedTimes, SchedulerError>;
}

/// Default backend: a MILP lowering of the model, driven through `good_lp`'s
/// bundled SCIP solver (`scip`, `scip_bundled` features).
pub(crate) struct GoodLpBackend;

impl SolverBackend for GoodLpBackend {
    fn solve(&self, outcome: ModelOutcome, solve_time: f64) -> Result<SolvedTimes, SchedulerError> {
        let ModelOutcome {
            vars,
            makespan,
            constraints,
            end_vars,
            start_vars,
        } = outcome;

        let objective: Expression = makespan.into();
        let mut problem = vars
            .minimise(objective)
            .using(good_lp::solvers::scip::scip);

        // Best-effort wall-clock budget, the MILP equivalent of CP-SAT's
        // `max_time_in_seconds`. SCIP's bundled build runs a single-threaded
        // branch-and-bound search, unlike CP-SAT's `num_search_workers = 0`
        // auto-parallel search, so there is no thread count to set here.
        problem.as_inner_mut().set_time_limit(solve_time.max(0.0));

        for c in constraints {
            problem = problem.with(c);
        }

        match problem.solve() {
            Ok(solution) => {
                let starts = start_vars
                    .iter()
                    .map(|(id, v)| (id.clone(), v.resolve(&solution)))
                    .collect();
                let ends = end_vars
                    .iter()
                    .map(|(id, v)| (id.clone(), v.resolve(&solution)))
                    .collect();
                Ok(SolvedTimes {
                    status: SolverStatus::Feasible,
                    starts,
                    ends,
                })
            }
            Err(ResolutionError::Infeasible) => Ok(SolvedTimes {
                status: SolverStatus::Infeasible,
                starts: HashMap::new(),
                ends: HashMap::new(),
            }),
            Err(other) => {
                eprintln!("[Warning] solver returned a non-feasible status: {other}");
                Ok(SolvedTimes {
                    status: SolverStatus::Unknown,
                    starts: HashMap::new(),
                    ends: HashMap::new(),
                })
            }
        }
    }
}
