//! Worker: a named resource with integer capacity.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Errors raised while constructing a [`Worker`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("worker capacity must be at least 1, got {0}")]
    NonPositiveCapacity(i64),

    #[error("worker initial fill {initial_fill} exceeds its capacity {capacity}")]
    InitialFillExceedsCapacity { initial_fill: u32, capacity: u32 },
}

#[derive(Debug)]
struct WorkerInner {
    name: String,
    capacity: u32,
    initial_fill: u32,
}

/// A named machine/station with integer capacity.
///
/// `Worker` is a cheap-to-clone handle (an [`Rc`] over an immutable inner
/// record): cloning shares the same underlying worker rather than copying
/// it, which is what lets a single `Worker` be referenced from many `Task`s,
/// the system's transition graph, and the worker registry at once. Equality
/// and hashing are by `name` only, matching the convention that a system
/// never has two distinct workers sharing a name.
#[derive(Debug, Clone)]
pub struct Worker(Rc<WorkerInner>);

impl Worker {
    /// Creates a new worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::NonPositiveCapacity`] if `capacity < 1`, or
    /// [`WorkerError::InitialFillExceedsCapacity`] if `initial_fill > capacity`.
    pub fn new(
        name: impl Into<String>,
        capacity: u32,
        initial_fill: u32,
    ) -> Result<Self, WorkerError> {
        if capacity < 1 {
            return Err(WorkerError::NonPositiveCapacity(capacity as i64));
        }
        if initial_fill > capacity {
            return Err(WorkerError::InitialFillExceedsCapacity {
                initial_fill,
                capacity,
            });
        }
        Ok(Self(Rc::new(WorkerInner {
            name: name.into(),
            capacity,
            initial_fill,
        })))
    }

    /// Convenience constructor for a worker with no initial fill.
    pub fn with_capacity(name: impl Into<String>, capacity: u32) -> Result<Self, WorkerError> {
        Self::new(name, capacity, 0)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn capacity(&self) -> u32 {
        self.0.capacity
    }

    pub fn initial_fill(&self) -> u32 {
        self.0.initial_fill
    }

    /// A worker with capacity 1 participates in the sample-span ordering
    /// rule for unit-capacity stations (see `scheduler::model`).
    pub fn is_unit_capacity(&self) -> bool {
        self.0.capacity == 1
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Worker: {}>", self.name())
    }
}

impl PartialEq for Worker {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Worker {}

impl std::hash::Hash for Worker {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Worker {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Worker", 3)?;
        s.serialize_field("name", self.name())?;
        s.serialize_field("capacity", &self.capacity())?;
        s.serialize_field("initial_fill", &self.initial_fill())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_capacity() {
        let err = Worker::new("hotplate", 0, 0).unwrap_err();
        assert_eq!(err, WorkerError::NonPositiveCapacity(0));
    }

    #[test]
    fn rejects_fill_above_capacity() {
        let err = Worker::new("storage", 10, 11).unwrap_err();
        assert_eq!(
            err,
            WorkerError::InitialFillExceedsCapacity {
                initial_fill: 11,
                capacity: 10
            }
        );
    }

    #[test]
    fn equality_is_by_name() {
        let a = Worker::with_capacity("arm", 1).unwrap();
        let b = Worker::new("arm", 99, 0).unwrap();
        assert_eq!(a, b, "workers with the same name must compare equal");
    }

    #[test]
    fn unit_capacity_flag() {
        assert!(Worker::with_capacity("spincoater", 1).unwrap().is_unit_capacity());
        assert!(!Worker::with_capacity("hotplate", 25).unwrap().is_unit_capacity());
    }

    #[test]
    fn clone_shares_handle() {
        let a = Worker::with_capacity("arm", 1).unwrap();
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.capacity(), b.capacity());
    }
}
