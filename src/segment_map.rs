//! Segment map (C6) and matcher (C7).

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::cut::{merge_cuts, untangle_cuts};
use crate::graph::{Handle, NodeId, PathHandle, PathHandleGraph, StepHandle};
use crate::path_step_index::PathStepIndex;
use crate::step_index::StepIndex;

/// Node→(segment_id, is_rev) multimap over a set of target paths, built from
/// merged cuts (§4.5). Construction is once-only; queries are read-only
/// afterward, safe to share across the parallel query pass.
pub struct SegmentMap {
    segment_cut: Vec<StepHandle>,
    segment_length: Vec<u64>,
    segment_path: Vec<PathHandle>,
    /// `node_idx[nid - 1]..node_idx[nid]` indexes into `segments` for node
    /// id `nid` (1-based, dense).
    node_idx: Vec<usize>,
    segments: Vec<(u32, bool)>,
}

impl SegmentMap {
    /// Builds the map over `targets` (processed in the given order -- segment
    /// ids are assigned deterministically by that order, per §5 Ordering
    /// guarantees) using `is_cut` as the global cut predicate and `merge_dist`
    /// to suppress degenerate micro-segments.
    pub fn build<G>(
        graph: &G,
        step_index: &StepIndex,
        targets: &[PathHandle],
        is_cut: impl Fn(Handle) -> bool + Sync,
        merge_dist: u64,
    ) -> Self
    where
        G: PathHandleGraph + Sync,
    {
        let target_cuts: Vec<(PathHandle, Vec<StepHandle>)> = targets
            .par_iter()
            .map(|&path| {
                let path_idx = PathStepIndex::build(graph, path);
                let raw = untangle_cuts(
                    graph,
                    step_index,
                    &path_idx,
                    graph.path_begin(path),
                    graph.path_end(path),
                    &is_cut,
                );
                (path, merge_cuts(&raw, step_index, merge_dist))
            })
            .collect();

        let mut segment_cut = Vec::new();
        let mut segment_length: Vec<u64> = Vec::new();
        let mut segment_path: Vec<PathHandle> = Vec::new();
        let mut temp: Vec<(NodeId, u32, bool)> = Vec::new();
        let mut next_segment_id: u32 = 0;

        for (path, cuts) in &target_cuts {
            let mut cut_idx = 0usize;
            let mut current_segment: Option<u32> = None;
            graph.for_each_step_in_path(*path, |step| {
                if cut_idx < cuts.len() && step == cuts[cut_idx] {
                    segment_cut.push(step);
                    segment_length.push(0);
                    segment_path.push(*path);
                    current_segment = Some(next_segment_id);
                    next_segment_id += 1;
                    cut_idx += 1;
                }
                let handle = graph.get_handle_of_step(step);
                let seg_id = current_segment
                    .expect("merge_cuts always yields a cut at the first step of a path");
                temp.push((handle.id(), seg_id, handle.is_reverse()));
                segment_length[seg_id as usize] += graph.get_length(handle);
            });
        }

        temp.sort_by_key(|&(nid, _, _)| nid);

        let node_count = graph.get_node_count();
        let mut node_idx = vec![0usize; node_count + 1];
        let mut segments = Vec::with_capacity(temp.len());
        let mut cursor = 0usize;
        for nid in 1..=node_count {
            node_idx[nid - 1] = cursor;
            while cursor < temp.len() && temp[cursor].0 .0 as usize == nid {
                segments.push((temp[cursor].1, temp[cursor].2));
                cursor += 1;
            }
        }
        node_idx[node_count] = segments.len();

        SegmentMap {
            segment_cut,
            segment_length,
            segment_path,
            node_idx,
            segments,
        }
    }

    pub fn for_segment_on_node(&self, nid: NodeId, mut f: impl FnMut(u32, bool)) {
        let n = nid.0 as usize;
        if n == 0 || n > self.node_idx.len() - 1 {
            return;
        }
        for &(seg_id, is_rev) in &self.segments[self.node_idx[n - 1]..self.node_idx[n]] {
            f(seg_id, is_rev);
        }
    }

    pub fn get_segment_length(&self, id: u32) -> u64 {
        self.segment_length[id as usize]
    }

    pub fn get_segment_cut(&self, id: u32) -> StepHandle {
        self.segment_cut[id as usize]
    }

    pub fn get_segment_path(&self, id: u32) -> PathHandle {
        self.segment_path[id as usize]
    }

    pub fn num_segments(&self) -> u32 {
        self.segment_length.len() as u32
    }
}

/// One ranked mapping of a query interval onto a target segment (C7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentMapping {
    pub segment_id: u32,
    pub is_inv: bool,
    pub jaccard: f64,
}

/// Scans `[begin, end)`, aggregates per-target-segment intersection and
/// inverted-orientation base-pair counts, and returns Jaccard-ranked
/// mappings. Self-matches are not filtered (§4.6).
pub fn get_matches<G>(
    graph: &G,
    segment_map: &SegmentMap,
    begin: StepHandle,
    end: StepHandle,
    query_length: u64,
) -> Vec<SegmentMapping>
where
    G: PathHandleGraph,
{
    let mut isec: FxHashMap<u32, (u64, u64)> = FxHashMap::default();
    let mut s = begin;
    while s != end {
        let handle = graph.get_handle_of_step(s);
        let length = graph.get_length(handle);
        let query_rev = handle.is_reverse();
        segment_map.for_segment_on_node(handle.id(), |seg_id, is_rev| {
            let entry = isec.entry(seg_id).or_insert((0, 0));
            entry.0 += length;
            if is_rev != query_rev {
                entry.1 += length;
            }
        });
        s = graph.get_next_step(s);
    }

    let mut mappings: Vec<SegmentMapping> = isec
        .into_iter()
        .map(|(segment_id, (isec_bp, inv_bp))| {
            let is_inv = (inv_bp as f64) / (isec_bp as f64) > 0.5;
            let union_bp =
                segment_map.get_segment_length(segment_id) as f64 + query_length as f64 - isec_bp as f64;
            let jaccard = isec_bp as f64 / union_bp;
            SegmentMapping {
                segment_id,
                is_inv,
                jaccard,
            }
        })
        .collect();

    mappings.sort_by(|a, b| {
        b.jaccard
            .partial_cmp(&a.jaccard)
            .unwrap()
            .then(b.segment_id.cmp(&a.segment_id))
            .then(b.is_inv.cmp(&a.is_inv))
    });
    mappings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::memgraph::MemGraph;
    use crate::graph::HandleGraph;

    #[test]
    fn segment_lengths_sum_to_path_length() {
        let gfa = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\n\
L\t1\t+\t2\t+\t0M\nL\t2\t+\t3\t+\t0M\nP\tx\t1+,2+,3+\t*\n";
        let g = MemGraph::from_gfa_bytes(gfa);
        let path = g.get_path_handle("x").unwrap();
        let step_index = StepIndex::build(&g, &[path]);
        let map = SegmentMap::build(&g, &step_index, &[path], |_| false, 0);
        let total: u64 = (0..map.num_segments()).map(|i| map.get_segment_length(i)).sum();
        assert_eq!(total, step_index.get_path_length(path));
    }

    #[test]
    fn self_match_is_perfect() {
        let gfa = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\n\
L\t1\t+\t2\t+\t0M\nL\t2\t+\t3\t+\t0M\nP\tx\t1+,2+,3+\t*\n";
        let g = MemGraph::from_gfa_bytes(gfa);
        let path = g.get_path_handle("x").unwrap();
        let step_index = StepIndex::build(&g, &[path]);
        let map = SegmentMap::build(&g, &step_index, &[path], |_| false, 0);
        let matches = get_matches(&g, &map, g.path_begin(path), g.path_end(path), 30);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].jaccard, 1.0);
        assert!(!matches[0].is_inv);
    }

    #[test]
    fn majority_reversed_overlap_sets_is_inv() {
        // Same three nodes on both paths, two of three reversed on the
        // target: full Jaccard overlap but a majority-reversed orientation.
        let gfa = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\n\
P\tA\t1+,2+,3+\t*\nP\tB\t1-,2-,3+\t*\n";
        let g = MemGraph::from_gfa_bytes(gfa);
        let a = g.get_path_handle("A").unwrap();
        let b = g.get_path_handle("B").unwrap();
        let step_index = StepIndex::build(&g, &[a, b]);
        let map = SegmentMap::build(&g, &step_index, &[b], |_| false, 0);
        let matches = get_matches(&g, &map, g.path_begin(a), g.path_end(a), 30);
        assert_eq!(matches.len(), 1);
        assert!((matches[0].jaccard - 1.0).abs() < 1e-9);
        assert!(matches[0].is_inv);
    }

    #[test]
    fn empty_interval_returns_no_matches() {
        let gfa = b"S\t1\tAAAAAAAAAA\nP\tx\t1+\t*\n";
        let g = MemGraph::from_gfa_bytes(gfa);
        let path = g.get_path_handle("x").unwrap();
        let step_index = StepIndex::build(&g, &[path]);
        let map = SegmentMap::build(&g, &step_index, &[path], |_| false, 0);
        let begin = g.path_begin(path);
        let matches = get_matches(&g, &map, begin, begin, 0);
        assert!(matches.is_empty());
    }
}
