use thiserror::Error;

/// Errors raised by [`super::System`] construction and worklist expansion.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SystemError {
    #[error("duplicate worker name: {0}")]
    DuplicateWorkerName(String),

    #[error("starting worker {0} is not present in this system's workers")]
    UnknownStartingWorker(String),

    #[error("ending worker {0} is not present in this system's workers")]
    UnknownEndingWorker(String),

    #[error("transition references unknown worker: {0}")]
    UnknownTransitionWorker(String),

    #[error("task {0} passed as a transition is not a Transition")]
    NotATransition(String),

    #[error("protocol name \"{0}\" already exists - please select a unique name")]
    DuplicateProtocolName(String),

    #[error("no starting worker configured for this system or this call")]
    NoStartingWorker,

    #[error("no transition defined from {source} to {destination}")]
    NoTransitionDefined { source: String, destination: String },

    #[error("worklist must contain at least one task")]
    EmptyWorklist,
}
