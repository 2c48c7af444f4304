//! Tasklist construction: flattening protocols into the subset of tasks
//! eligible for the current solve pass, respecting breakpoint phase
//! boundaries.

use crate::protocol::Protocol;
use crate::task::Task;

/// Builds the flattened tasklist for one solve pass.
///
/// For each protocol, admits every task up to and including the first task
/// present in `breakpoints` (or the entire worklist, if none of its tasks
/// appear in `breakpoints`). Past that point, a task is admitted only if it
/// is already solved, or if it is part of an unbroken `immediate = true`
/// chain immediately following the breakpoint — once that chain is broken by
/// a non-immediate, not-yet-solved task, nothing further from that protocol
/// is admitted this pass.
pub fn build_tasklist(protocols: &[Protocol], breakpoints: &[Task]) -> Vec<Task> {
    let mut tasklist = Vec::new();

    for protocol in protocols {
        let worklist = protocol.worklist();
        let mut cursor = 0;
        while cursor < worklist.len() {
            let task = &worklist[cursor];
            tasklist.push(task.clone());
            cursor += 1;
            if breakpoints.iter().any(|bp| bp.id() == task.id()) {
                break;
            }
        }

        let mut still_immediate = true;
        for task in &worklist[cursor..] {
            if !task.immediate() {
                still_immediate = false;
            }
            if still_immediate || task.start().is_some() {
                tasklist.push(task.clone());
            }
        }
    }

    tasklist
}

/// The solver horizon: a safe upper bound on all solved times, computed as
/// the sum of every tasklist task's duration plus the latest `min_start`
/// seen across the tasklist (0 if the tasklist is empty).
pub fn horizon(tasklist: &[Task]) -> i64 {
    let latest_min_start = tasklist.iter().map(Task::min_start).max().unwrap_or(0);
    let total_duration: i64 = tasklist.iter().map(|t| t.duration() as i64).sum();
    total_duration + latest_min_start
}
