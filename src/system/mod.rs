//! System: the authoring layer. Owns the worker registry, the transition
//! multigraph, and the protocol registry; expands user-supplied abstract
//! worklists into fully-transitioned `Protocol`s and hands them to the
//! embedded [`Scheduler`].

mod error;
pub use error::SystemError;

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};

use crate::id::Id;
use crate::protocol::Protocol;
use crate::scheduler::Scheduler;
use crate::task::Task;
use crate::worker::Worker;

/// The authoring layer: owns workers, transitions, and protocol worklist
/// expansion.
///
/// `System` validates the worker/transition topology once at construction,
/// then repeatedly expands abstract worklists (plain sequences of
/// author-defined Task templates) into concrete, fully-transitioned
/// `Protocol`s via [`System::generate_protocol`]. Expanded protocols are
/// registered here *and* handed to the `Scheduler` this System owns.
pub struct System {
    workers: Vec<Worker>,
    transition_graph: DiGraph<String, Task>,
    node_of: HashMap<String, NodeIndex>,
    starting_worker: Option<Worker>,
    ending_worker: Option<Worker>,
    protocols: IndexMap<String, Protocol>,
    scheduler: Scheduler,

    /// Ephemeral assembly state: the current shared instance for every
    /// task template seen so far, keyed by the template's id, and the
    /// highest `min_start` any `generate_protocol` call has used.
    current_task_instances: HashMap<Id, Task>,
    latest_existing_start_time: i64,
}

impl System {
    /// Builds a new System.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::DuplicateWorkerName`] if two workers share a
    /// name, [`SystemError::UnknownStartingWorker`] /
    /// [`SystemError::UnknownEndingWorker`] if the given defaults are not
    /// among `workers`, [`SystemError::NotATransition`] if a `transitions`
    /// entry is not a Transition task, or
    /// [`SystemError::UnknownTransitionWorker`] if a transition references a
    /// worker absent from `workers`.
    pub fn new(
        workers: Vec<Worker>,
        transitions: Vec<Task>,
        starting_worker: Option<Worker>,
        ending_worker: Option<Worker>,
        enforce_protocol_order: bool,
    ) -> Result<Self, SystemError> {
        let mut seen = HashSet::with_capacity(workers.len());
        for w in &workers {
            if !seen.insert(w.name().to_string()) {
                return Err(SystemError::DuplicateWorkerName(w.name().to_string()));
            }
        }

        if let Some(sw) = &starting_worker {
            if !workers.contains(sw) {
                return Err(SystemError::UnknownStartingWorker(sw.name().to_string()));
            }
        }
        if let Some(ew) = &ending_worker {
            if !workers.contains(ew) {
                return Err(SystemError::UnknownEndingWorker(ew.name().to_string()));
            }
        }

        let mut transition_graph = DiGraph::new();
        let mut node_of = HashMap::with_capacity(workers.len());
        for w in &workers {
            let idx = transition_graph.add_node(w.name().to_string());
            node_of.insert(w.name().to_string(), idx);
        }

        for t in &transitions {
            if !t.is_transition() {
                return Err(SystemError::NotATransition(t.name()));
            }
            let source = t.transition_source().expect("checked is_transition above");
            let destination = t
                .transition_destination()
                .expect("checked is_transition above");
            let s_idx = *node_of
                .get(source.name())
                .ok_or_else(|| SystemError::UnknownTransitionWorker(source.name().to_string()))?;
            let d_idx = *node_of.get(destination.name()).ok_or_else(|| {
                SystemError::UnknownTransitionWorker(destination.name().to_string())
            })?;
            transition_graph.add_edge(s_idx, d_idx, t.clone());
        }

        Ok(Self {
            scheduler: Scheduler::new(workers.clone(), enforce_protocol_order),
            workers,
            transition_graph,
            node_of,
            starting_worker,
            ending_worker,
            protocols: IndexMap::new(),
            current_task_instances: HashMap::new(),
            latest_existing_start_time: 0,
        })
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn protocols(&self) -> impl Iterator<Item = &Protocol> {
        self.protocols.values()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// The workers reachable from `from` by following one or more
    /// transitions, in breadth-first order. Graph-level introspection built
    /// directly on `petgraph`'s traversal machinery, over and above what the
    /// the transition multigraph's own core responsibilities require.
    pub fn reachable_workers(&self, from: &Worker) -> Vec<String> {
        let Some(&start) = self.node_of.get(from.name()) else {
            return Vec::new();
        };
        let mut bfs = Bfs::new(&self.transition_graph, start);
        let mut out = Vec::new();
        while let Some(nx) = bfs.next(&self.transition_graph) {
            if nx != start {
                out.push(self.transition_graph[nx].clone());
            }
        }
        out
    }

    /// Expands a user-supplied abstract worklist into a fully-transitioned
    /// `Protocol`, registers it, and pushes it to the Scheduler.
    ///
    /// # Errors
    ///
    /// See [`SystemError`] for the individual failure cases: an empty
    /// worklist, a duplicate protocol name, no configured starting worker, or
    /// a missing transition between two consecutive workers.
    pub fn generate_protocol(
        &mut self,
        worklist: Vec<Task>,
        name: Option<String>,
        min_start: i64,
        starting_worker: Option<Worker>,
        ending_worker: Option<Worker>,
    ) -> Result<Protocol, SystemError> {
        if worklist.is_empty() {
            return Err(SystemError::EmptyWorklist);
        }

        let name = name.unwrap_or_else(|| format!("sample{}", self.protocols.len()));
        if self.protocols.contains_key(&name) {
            return Err(SystemError::DuplicateProtocolName(name));
        }

        // Step 2: a new batch started after the last solve boundary clears
        // the shared-instance cache so later tasks allocate fresh instances
        // rather than reusing ones that may already be scheduled.
        if min_start > self.latest_existing_start_time {
            self.current_task_instances.clear();
        }
        self.latest_existing_start_time = self.latest_existing_start_time.max(min_start);

        // Step 3: acquire an instance (shared or fresh) for every user task.
        let mut instances = Vec::with_capacity(worklist.len());
        for template in &worklist {
            let instance = match self.current_task_instances.get(&template.id()) {
                Some(existing) if existing.has_spare_capacity() => existing.clone(),
                _ => {
                    let fresh = template.instantiate();
                    self.current_task_instances
                        .insert(template.id(), fresh.clone());
                    fresh
                }
            };
            instance.occupy_one_slot();
            instances.push(instance);
        }

        // Step 4: chain precedence between consecutive instances.
        for pair in instances.windows(2) {
            pair[1].add_precedent_if_absent(&pair[0]);
        }

        // Step 5: walk the instances, splicing in a Transition whenever the
        // primary worker changes from the current location.
        let starting_worker = starting_worker
            .or_else(|| self.starting_worker.clone())
            .ok_or(SystemError::NoStartingWorker)?;

        let mut protocol_worklist = Vec::with_capacity(instances.len() * 2);
        let mut location = starting_worker;
        for instance in &instances {
            let destination = instance.primary_worker();
            if location != destination {
                let transition = self.instantiate_transition(&location, &destination)?;
                transition.set_immediate(instance.immediate());
                transition.set_precedent(instance.precedent());
                instance.set_precedent(vec![transition.clone()]);
                protocol_worklist.push(transition);
            }
            protocol_worklist.push(instance.clone());
            location = destination;
        }

        // Step 6: closing transition back to the ending worker, if one is
        // configured and the sample isn't already there.
        if let Some(ending) = ending_worker.or_else(|| self.ending_worker.clone()) {
            if location != ending {
                let last_immediate = instances
                    .last()
                    .map(Task::immediate)
                    .unwrap_or(false);
                let transition = self.instantiate_transition(&location, &ending)?;
                transition.set_immediate(last_immediate);
                if let Some(last) = protocol_worklist.last() {
                    transition.set_precedent(vec![last.clone()]);
                }
                protocol_worklist.push(transition);
            }
        }

        // Step 7: cumulative min_start, a lower-bound hint rather than an
        // equality constraint.
        let mut running = min_start;
        for task in &protocol_worklist {
            task.set_min_start(running);
            running += task.duration() as i64;
        }

        // Step 8: register and push to the scheduler.
        let protocol = Protocol::new(name.clone(), protocol_worklist);
        self.protocols.insert(name, protocol.clone());
        self.scheduler.add_protocols(vec![protocol.clone()]);
        Ok(protocol)
    }

    /// Convenience wrapper around `scheduler_mut().solve(solve_time, &[])`.
    pub fn solve(
        &mut self,
        solve_time: f64,
    ) -> Result<crate::scheduler::SolveReport, crate::scheduler::SchedulerError> {
        self.scheduler.solve(solve_time, &[])
    }

    fn instantiate_transition(
        &self,
        source: &Worker,
        destination: &Worker,
    ) -> Result<Task, SystemError> {
        let not_found = || SystemError::NoTransitionDefined {
            source: source.name().to_string(),
            destination: destination.name().to_string(),
        };
        let s_idx = *self.node_of.get(source.name()).ok_or_else(not_found)?;
        let d_idx = *self.node_of.get(destination.name()).ok_or_else(not_found)?;
        let template = self
            .transition_graph
            .edges_connecting(s_idx, d_idx)
            .next()
            .map(|e| e.weight())
            .ok_or_else(not_found)?;
        Ok(template.instantiate())
    }
}
