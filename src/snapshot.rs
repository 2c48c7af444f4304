//! Read-model snapshots for downstream consumers (a JSON dumper, a plotting
//! tool) that want a stable view of solved tasks and protocols without
//! depending on this crate's internal `Rc<RefCell<_>>` representation.
//!
//! Building a full export pipeline (file output, schema versioning) is out of
//! scope; this module only makes the snapshot types themselves `Serialize`,
//! gated behind the `serde` feature, the way a library exposes data for an
//! external collaborator to serialize.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value as DetailValue;

use crate::id::Id;
use crate::protocol::Protocol;
use crate::task::Task;

/// A point-in-time, serializable view of a solved (or unsolved) Task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub name: String,
    pub id: Id,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub details: HashMap<String, DetailValue>,
    pub precedent: Vec<Id>,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name(),
            id: task.id(),
            start: task.start(),
            end: task.end(),
            details: task.generate_details(),
            precedent: task.precedent().iter().map(Task::id).collect(),
        }
    }
}

/// A point-in-time, serializable view of a Protocol and its worklist.
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolSnapshot {
    pub name: String,
    pub id: Id,
    pub worklist: Vec<TaskSnapshot>,
}

impl From<&Protocol> for ProtocolSnapshot {
    fn from(protocol: &Protocol) -> Self {
        Self {
            name: protocol.name().to_string(),
            id: protocol.id().clone(),
            worklist: protocol.worklist().iter().map(TaskSnapshot::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::Worker;

    #[test]
    fn task_snapshot_carries_precedent_ids() {
        let storage = Worker::with_capacity("storage", 10).unwrap();
        let t0 = Task::new("a", vec![storage.clone()], 10.0, vec![], false, HashMap::new(), false, 1)
            .unwrap();
        let t1 = Task::new("b", vec![storage], 10.0, vec![t0.clone()], false, HashMap::new(), false, 1)
            .unwrap();

        let snapshot = TaskSnapshot::from(&t1);
        assert_eq!(snapshot.precedent, vec![t0.id()]);
        assert_eq!(snapshot.name, "b");
    }

    #[test]
    fn protocol_snapshot_serializes_to_expected_shape() {
        let storage = Worker::with_capacity("storage", 10).unwrap();
        let t0 = Task::new("a", vec![storage], 10.0, vec![], false, HashMap::new(), false, 1).unwrap();
        let protocol = Protocol::new("p", vec![t0]);

        let snapshot = ProtocolSnapshot::from(&protocol);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["name"], "p");
        assert_eq!(json["worklist"].as_array().unwrap().len(), 1);
    }
}
