use thiserror::Error;

/// Errors raised by [`super::Scheduler`].
///
/// Solver *outcomes* (infeasible, unknown/no incumbent within the time
/// budget) are never represented here — they are reported via
/// [`super::SolverStatus`] instead, per the specification's contract that a
/// non-optimal terminal status is not an exception. Only genuine model-
/// construction failures are errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("the solver failed to build a model: {0}")]
    ModelBuildFailed(String),
}
