use thiserror::Error;

/// Errors raised while constructing a [`super::Task`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task {0} must specify at least one worker")]
    EmptyWorkerSet(String),

    #[error("task {0} capacity must be at least 1")]
    NonPositiveCapacity(String),

    #[error(
        "task {task} has capacity {task_capacity}, which exceeds the capacity {worker_capacity} \
         of required worker {worker}"
    )]
    CapacityExceedsWorker {
        task: String,
        task_capacity: u32,
        worker: String,
        worker_capacity: u32,
    },
}
