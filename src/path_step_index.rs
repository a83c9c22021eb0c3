//! Per-path self-index (C3): for one path, the steps visiting each node,
//! in path order, supporting forward/backward navigation over repeats.

use rustc_hash::FxHashMap;

use crate::graph::{Handle, HandleGraph, NodeId, PathHandle, PathHandleGraph, StepHandle};

pub struct PathStepIndex {
    path: PathHandle,
    step_count: usize,
    /// Step indices visiting a given node, strictly increasing (the order
    /// steps are appended in while walking the path forward).
    by_node: FxHashMap<NodeId, Vec<usize>>,
}

impl PathStepIndex {
    pub fn build<G>(graph: &G, path: PathHandle) -> Self
    where
        G: PathHandleGraph,
    {
        let mut by_node: FxHashMap<NodeId, Vec<usize>> = FxHashMap::default();
        let mut step_count = 0usize;
        graph.for_each_step_in_path(path, |step| {
            let handle: Handle = graph.get_handle_of_step(step);
            by_node.entry(handle.id()).or_default().push(step.index);
            step_count += 1;
        });
        PathStepIndex {
            path,
            step_count,
            by_node,
        }
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Number of steps on this path visiting `node_id` (the per-handle
    /// weight used by [`crate::untangle::self_mean_coverage`]).
    pub fn count_on_node(&self, node_id: NodeId) -> usize {
        self.by_node.get(&node_id).map_or(0, Vec::len)
    }

    /// Dense index into `[0, step_count)`; the [`StepHandle::index`] field
    /// already serves this role by construction, so this is a direct
    /// passthrough rather than a separate lookup table.
    pub fn get_step_idx(&self, step: StepHandle) -> usize {
        debug_assert_eq!(step.path, self.path);
        step.index
    }

    /// Next step visiting `node_id` strictly after `step`, if any.
    pub fn get_next_step_on_node(&self, node_id: NodeId, step: StepHandle) -> (bool, StepHandle) {
        match self.by_node.get(&node_id) {
            Some(steps) => {
                let pos = steps.partition_point(|&idx| idx <= step.index);
                if pos < steps.len() {
                    (
                        true,
                        StepHandle {
                            path: self.path,
                            index: steps[pos],
                        },
                    )
                } else {
                    (false, step)
                }
            }
            None => (false, step),
        }
    }

    /// Previous step visiting `node_id` strictly before `step`, if any.
    pub fn get_prev_step_on_node(&self, node_id: NodeId, step: StepHandle) -> (bool, StepHandle) {
        match self.by_node.get(&node_id) {
            Some(steps) => {
                let pos = steps.partition_point(|&idx| idx < step.index);
                if pos > 0 {
                    (
                        true,
                        StepHandle {
                            path: self.path,
                            index: steps[pos - 1],
                        },
                    )
                } else {
                    (false, step)
                }
            }
            None => (false, step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::memgraph::MemGraph;

    const LOOP_GFA: &[u8] = b"S\t1\tA\nS\t2\tA\nS\t3\tA\nS\t4\tA\n\
L\t1\t+\t2\t+\t0M\nL\t2\t+\t3\t+\t0M\nL\t3\t+\t2\t+\t0M\nL\t2\t+\t4\t+\t0M\n\
P\tx\t1+,2+,3+,2+,4+\t*\n";

    #[test]
    fn finds_repeat_visits_to_a_node() {
        let g = MemGraph::from_gfa_bytes(LOOP_GFA);
        let path = g.get_path_handle("x").unwrap();
        let idx = PathStepIndex::build(&g, path);
        assert_eq!(idx.step_count(), 5);

        let node2 = NodeId(2);
        let first = StepHandle { path, index: 1 };
        let (found, next) = idx.get_next_step_on_node(node2, first);
        assert!(found);
        assert_eq!(next.index, 3);

        let (found, prev) = idx.get_prev_step_on_node(node2, next);
        assert!(found);
        assert_eq!(prev.index, 1);

        let (found, _) = idx.get_next_step_on_node(node2, next);
        assert!(!found);
    }
}
