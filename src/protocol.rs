//! Protocol: an ordered worklist of Tasks representing one sample's journey.

use crate::id::{generate_id, Id};
use crate::task::Task;

/// An ordered worklist of Tasks for one sample.
///
/// Two protocols are equal iff their worklists are id-equal element-wise.
/// Because [`Task::instantiate`] always mints a fresh id, two protocols built
/// from the same template worklist (e.g. to repeat a procedure for more
/// samples) are never equal to each other.
#[derive(Debug, Clone)]
pub struct Protocol {
    name: String,
    id: Id,
    worklist: Vec<Task>,
}

impl Protocol {
    /// Creates a new protocol from an already-expanded worklist.
    ///
    /// Worklist expansion (inserting transitions, chaining precedents,
    /// assigning `min_start`) happens in [`crate::system::System::generate_protocol`];
    /// this constructor just wraps the result.
    pub fn new(name: impl Into<String>, worklist: Vec<Task>) -> Self {
        let name = name.into();
        let id = generate_id(&name);
        Self { name, id, worklist }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn worklist(&self) -> &[Task] {
        &self.worklist
    }

    pub fn is_empty(&self) -> bool {
        self.worklist.is_empty()
    }

    pub fn len(&self) -> usize {
        self.worklist.len()
    }

    /// The first task in the worklist, if any.
    pub fn first(&self) -> Option<&Task> {
        self.worklist.first()
    }

    /// The last task in the worklist, if any.
    pub fn last(&self) -> Option<&Task> {
        self.worklist.last()
    }
}

impl PartialEq for Protocol {
    fn eq(&self, other: &Self) -> bool {
        self.worklist.len() == other.worklist.len()
            && self
                .worklist
                .iter()
                .zip(other.worklist.iter())
                .all(|(a, b)| a.id() == b.id())
    }
}

impl Eq for Protocol {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::Worker;
    use std::collections::HashMap;

    fn leaf_task(name: &str) -> Task {
        let w = Worker::with_capacity("storage", 10).unwrap();
        Task::new(name, vec![w], 10.0, vec![], false, HashMap::new(), false, 1).unwrap()
    }

    #[test]
    fn protocols_from_same_template_are_not_equal() {
        let template = vec![leaf_task("rest")];
        let instantiated_a: Vec<Task> = template.iter().map(Task::instantiate).collect();
        let instantiated_b: Vec<Task> = template.iter().map(Task::instantiate).collect();

        let p1 = Protocol::new("sample0", instantiated_a);
        let p2 = Protocol::new("sample1", instantiated_b);
        assert_ne!(p1, p2, "freshly instantiated protocols must not collide");
    }

    #[test]
    fn protocol_equals_itself() {
        let p = Protocol::new("sample0", vec![leaf_task("rest")]);
        assert_eq!(p, p.clone());
    }
}
