//! Global step index (C2): base-pair offset of every step, for every
//! participating path, from that path's start.

use rustc_hash::FxHashMap;
use rayon::prelude::*;

use crate::graph::{HandleGraph, PathHandle, PathHandleGraph, StepHandle};

/// Offsets for one path: `offsets[i]` is the position of step `i`;
/// `offsets[step_count]` is the path's total length (the `path_end`
/// sentinel's position).
struct PathOffsets {
    offsets: Vec<u64>,
}

/// Prefix-sum position of every step across a fixed set of paths, built once
/// and read-only thereafter (§3 Lifecycle, §5 Shared resources).
pub struct StepIndex {
    by_path: FxHashMap<PathHandle, PathOffsets>,
}

impl StepIndex {
    /// Builds the index over `paths`, walking each path once. Parallelism is
    /// over paths, matching the "parallelism is over paths" requirement of
    /// §4.1.
    pub fn build<G>(graph: &G, paths: &[PathHandle]) -> Self
    where
        G: PathHandleGraph + Sync,
    {
        let entries: Vec<(PathHandle, PathOffsets)> = paths
            .par_iter()
            .map(|&path| {
                let mut offsets = Vec::new();
                let mut pos = 0u64;
                graph.for_each_step_in_path(path, |step| {
                    offsets.push(pos);
                    let handle = graph.get_handle_of_step(step);
                    pos += graph.get_length(handle);
                });
                offsets.push(pos);
                (path, PathOffsets { offsets })
            })
            .collect();

        let mut by_path = FxHashMap::default();
        by_path.reserve(entries.len());
        for (path, offsets) in entries {
            by_path.insert(path, offsets);
        }
        StepIndex { by_path }
    }

    /// Position of `step` (or of the `path_end` sentinel, if `step` is one).
    pub fn get_position(&self, step: StepHandle) -> u64 {
        self.by_path[&step.path].offsets[step.index]
    }

    pub fn get_path_length(&self, path: PathHandle) -> u64 {
        let offsets = &self.by_path[&path].offsets;
        offsets[offsets.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::memgraph::MemGraph;

    const TINY_GFA: &[u8] = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\n\
L\t1\t+\t2\t+\t0M\nL\t2\t+\t3\t+\t0M\nP\tx\t1+,2+,3+\t*\n";

    #[test]
    fn positions_are_prefix_sums() {
        let g = MemGraph::from_gfa_bytes(TINY_GFA);
        let path = g.get_path_handle("x").unwrap();
        let idx = StepIndex::build(&g, &[path]);
        assert_eq!(idx.get_position(g.path_begin(path)), 0);
        assert_eq!(idx.get_position(g.get_next_step(g.path_begin(path))), 10);
        assert_eq!(idx.get_position(g.path_end(path)), 30);
        assert_eq!(idx.get_path_length(path), 30);
    }
}
