//! Task: an atomic unit of scheduled work, and its Transition specialization.
//!
//! Tasks and Transitions form a closed variant set from the scheduler's point
//! of view (duration, workers, precedents, immediacy, breakpoint, capacity,
//! plus source/destination for transitions). Rather than modeling this with a
//! trait object or subclassing, this module represents it as one shared core
//! record (`TaskInner`) plus a `TaskKind` tag carrying the transition-specific
//! extension, a "shared core + tagged extension"
//! approach to task polymorphism.

mod error;
pub use error::TaskError;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value as DetailValue;

use crate::id::{generate_id, Id};
use crate::worker::Worker;

/// Distinguishes a plain Task from a Transition between two Workers.
#[derive(Debug, Clone)]
pub enum TaskKind {
    Plain,
    Transition { source: Worker, destination: Worker },
}

#[derive(Debug)]
struct TaskInner {
    name: String,
    id: Id,
    workers: Vec<Worker>,
    duration: u32,
    precedent: Vec<Task>,
    immediate: bool,
    breakpoint: bool,
    capacity: u32,
    details: HashMap<String, DetailValue>,
    min_start: i64,
    kind: TaskKind,

    // Solved state, mutated in place by the Scheduler.
    start: Option<i64>,
    end: Option<i64>,
    solution_count: u32,

    // Assembly-only bookkeeping, used while a System expands worklists.
    utilized_capacity: u32,
}

/// A schedulable unit of work.
///
/// `Task` is a reference-counted handle over interior-mutable state
/// (`Rc<RefCell<TaskInner>>`). Cloning a `Task` handle (via `Clone`) shares
/// the same underlying task — this is what lets a single high-capacity task
/// instance (e.g. one oven run) be referenced from several `Protocol`
/// worklists at once, with solved times visible through every handle.
///
/// To produce a genuinely new task from a template, use [`Task::instantiate`]
/// instead of `Clone`: it allocates a fresh `id`, resets solved state and
/// `utilized_capacity`, and keeps the *same* precedent handles the template
/// had (precedent is preserved by reference, not recursively re-instantiated
/// — see `DESIGN.md` for the rationale).
#[derive(Debug, Clone)]
pub struct Task(Rc<RefCell<TaskInner>>);

impl Task {
    /// Creates a new plain task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::EmptyWorkerSet`] if `workers` is empty, or
    /// [`TaskError::CapacityExceedsWorker`] if `capacity > 1` and some worker
    /// has a smaller capacity than the task requests.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        workers: Vec<Worker>,
        duration_secs: f64,
        precedent: Vec<Task>,
        immediate: bool,
        details: HashMap<String, DetailValue>,
        breakpoint: bool,
        capacity: u32,
    ) -> Result<Self, TaskError> {
        Self::build(
            name.into(),
            workers,
            duration_secs,
            precedent,
            immediate,
            details,
            breakpoint,
            capacity,
            TaskKind::Plain,
        )
    }

    /// Creates a new Transition task between `source` and `destination`.
    ///
    /// The name is derived as `"<source>_to_<destination>"`.
    pub fn new_transition(
        duration_secs: f64,
        source: Worker,
        destination: Worker,
        workers: Vec<Worker>,
        precedent: Vec<Task>,
        immediate: bool,
        details: HashMap<String, DetailValue>,
    ) -> Result<Self, TaskError> {
        let name = format!("{}_to_{}", source.name(), destination.name());
        Self::build(
            name,
            workers,
            duration_secs,
            precedent,
            immediate,
            details,
            false,
            1,
            TaskKind::Transition {
                source,
                destination,
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        name: String,
        workers: Vec<Worker>,
        duration_secs: f64,
        precedent: Vec<Task>,
        immediate: bool,
        details: HashMap<String, DetailValue>,
        breakpoint: bool,
        capacity: u32,
        kind: TaskKind,
    ) -> Result<Self, TaskError> {
        if workers.is_empty() {
            return Err(TaskError::EmptyWorkerSet(name));
        }
        if capacity < 1 {
            return Err(TaskError::NonPositiveCapacity(name));
        }
        if capacity > 1 {
            for w in &workers {
                if capacity > w.capacity() {
                    return Err(TaskError::CapacityExceedsWorker {
                        task: name,
                        task_capacity: capacity,
                        worker: w.name().to_string(),
                        worker_capacity: w.capacity(),
                    });
                }
            }
            if immediate {
                eprintln!(
                    "[Warning] Task {name} has capacity {capacity} and immediate set to true. \
                     Schedules will typically be infeasible with immediate tasks of capacity > 1, \
                     as preceding Transition tasks cannot complete simultaneously!"
                );
            }
        }

        let duration = duration_secs.ceil() as u32;
        let id = generate_id(&name);

        Ok(Self(Rc::new(RefCell::new(TaskInner {
            name,
            id,
            workers,
            duration,
            precedent,
            immediate,
            breakpoint,
            capacity,
            details,
            min_start: 0,
            kind,
            start: None,
            end: None,
            solution_count: 0,
            utilized_capacity: 0,
        }))))
    }

    /// Produces a fresh instance of this task: a new `id`, reset solved
    /// state, and `utilized_capacity` zeroed. Precedent handles are shared
    /// with the template, not re-instantiated.
    pub fn instantiate(&self) -> Task {
        let inner = self.0.borrow();
        let id = generate_id(&inner.name);
        Task(Rc::new(RefCell::new(TaskInner {
            name: inner.name.clone(),
            id,
            workers: inner.workers.clone(),
            duration: inner.duration,
            precedent: inner.precedent.clone(),
            immediate: inner.immediate,
            breakpoint: inner.breakpoint,
            capacity: inner.capacity,
            details: inner.details.clone(),
            min_start: inner.min_start,
            kind: inner.kind.clone(),
            start: None,
            end: None,
            solution_count: 0,
            utilized_capacity: 0,
        })))
    }

    pub fn id(&self) -> Id {
        self.0.borrow().id.clone()
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn workers(&self) -> Vec<Worker> {
        self.0.borrow().workers.clone()
    }

    /// The task's "primary" worker: `workers()[0]`.
    pub fn primary_worker(&self) -> Worker {
        self.0.borrow().workers[0].clone()
    }

    pub fn duration(&self) -> u32 {
        self.0.borrow().duration
    }

    pub fn precedent(&self) -> Vec<Task> {
        self.0.borrow().precedent.clone()
    }

    pub fn immediate(&self) -> bool {
        self.0.borrow().immediate
    }

    pub fn breakpoint(&self) -> bool {
        self.0.borrow().breakpoint
    }

    pub fn capacity(&self) -> u32 {
        self.0.borrow().capacity
    }

    pub fn details(&self) -> HashMap<String, DetailValue> {
        self.0.borrow().details.clone()
    }

    pub fn min_start(&self) -> i64 {
        self.0.borrow().min_start
    }

    pub fn set_min_start(&self, min_start: i64) {
        self.0.borrow_mut().min_start = min_start;
    }

    /// Overrides the immediacy flag. Used by `System::generate_protocol` when
    /// splicing a Transition instance in ahead of a task: the transition
    /// inherits the task's own immediacy rather than carrying its template's.
    pub fn set_immediate(&self, immediate: bool) {
        self.0.borrow_mut().immediate = immediate;
    }

    pub fn start(&self) -> Option<i64> {
        self.0.borrow().start
    }

    pub fn end(&self) -> Option<i64> {
        self.0.borrow().end
    }

    pub fn solution_count(&self) -> u32 {
        self.0.borrow().solution_count
    }

    pub fn utilized_capacity(&self) -> u32 {
        self.0.borrow().utilized_capacity
    }

    /// Increments utilized capacity by one occupant, for shared-instance
    /// bookkeeping during protocol expansion.
    pub fn occupy_one_slot(&self) {
        self.0.borrow_mut().utilized_capacity += 1;
    }

    pub fn has_spare_capacity(&self) -> bool {
        let inner = self.0.borrow();
        inner.utilized_capacity < inner.capacity
    }

    /// Appends `p` to this task's precedent list if it is not already present.
    pub fn add_precedent_if_absent(&self, p: &Task) {
        let mut inner = self.0.borrow_mut();
        if !inner.precedent.iter().any(|existing| existing.id() == p.id()) {
            inner.precedent.push(p.clone());
        }
    }

    /// Overwrites the precedent list wholesale (used when inserting a
    /// transition ahead of a task during worklist expansion).
    pub fn set_precedent(&self, precedent: Vec<Task>) {
        self.0.borrow_mut().precedent = precedent;
    }

    /// Writes a solved (start, end) pair back onto this task and bumps
    /// `solution_count`. Called only by the Scheduler after a solve.
    pub fn record_solution(&self, start: i64, end: i64) {
        let mut inner = self.0.borrow_mut();
        inner.start = Some(start);
        inner.end = Some(end);
        inner.solution_count += 1;
    }

    /// Clears solved state back to "unsolved", used by `Scheduler::flex`.
    pub fn clear_solution(&self) {
        let mut inner = self.0.borrow_mut();
        inner.start = None;
        inner.end = None;
    }

    pub fn is_transition(&self) -> bool {
        matches!(self.0.borrow().kind, TaskKind::Transition { .. })
    }

    /// The transition's source worker, if this task is a Transition.
    pub fn transition_source(&self) -> Option<Worker> {
        match &self.0.borrow().kind {
            TaskKind::Transition { source, .. } => Some(source.clone()),
            TaskKind::Plain => None,
        }
    }

    /// The transition's destination worker, if this task is a Transition.
    pub fn transition_destination(&self) -> Option<Worker> {
        match &self.0.borrow().kind {
            TaskKind::Transition { destination, .. } => Some(destination.clone()),
            TaskKind::Plain => None,
        }
    }

    /// Builds the downstream-facing details map, folding in transition
    /// source/destination metadata the way `generate_details` does for
    /// subclassed tasks in systems with a class-based Task hierarchy.
    pub fn generate_details(&self) -> HashMap<String, DetailValue> {
        let inner = self.0.borrow();
        let mut out = inner.details.clone();
        if let TaskKind::Transition {
            source,
            destination,
        } = &inner.kind
        {
            out.insert("source".to_string(), DetailValue::String(source.name().to_string()));
            out.insert(
                "destination".to_string(),
                DetailValue::String(destination.name().to_string()),
            );
        }
        out
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.0.borrow().id == other.0.borrow().id
    }
}

impl Eq for Task {}

impl std::hash::Hash for Task {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.borrow().id.hash(state);
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        let label = if matches!(inner.kind, TaskKind::Transition { .. }) {
            "Transition"
        } else {
            "Task"
        };
        write!(
            f,
            "<{label}: {}, runs from {:?} - {:?}>",
            inner.name, inner.start, inner.end
        )
    }
}
