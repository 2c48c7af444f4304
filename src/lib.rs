//! Constraint-based scheduling of laboratory automation protocols across a
//! fixed pool of shared workers.
//!
//! Given a pool of [`Worker`]s with capacities, a directed multigraph of
//! permitted inter-worker [`Task`] transitions, and a set of [`Protocol`]s
//! (each an ordered worklist of tasks for one sample), [`Scheduler`] builds a
//! constraint model, drives a solver to minimize makespan, and writes a
//! start/end time back onto every task. [`System`] is the authoring layer
//! that expands abstract worklists into fully-transitioned protocols ready
//! to schedule.

pub mod id;
pub mod protocol;
pub mod scheduler;
#[cfg(feature = "serde")]
pub mod snapshot;
pub mod system;
pub mod task;
pub mod worker;

pub use id::generate_id;
pub use protocol::Protocol;
pub use scheduler::{Scheduler, SchedulerError, SolveReport, SolverStatus};
pub use system::{System, SystemError};
pub use task::{Task, TaskError, TaskKind};
pub use worker::{Worker, WorkerError};
