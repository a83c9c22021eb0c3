//! Cut detector (C4) and cut merger (C5).
//!
//! The detector is a work-queue walk rather than true recursion so that the
//! `seen_fwd`/`seen_rev` bitmaps stay flat `Vec<bool>`s sized once per call;
//! each step is visited at most twice across all queued intervals, bounding
//! the whole procedure to O(path length) as the algorithm requires.

use std::collections::VecDeque;

use crate::graph::{Handle, PathHandleGraph, StepHandle};
use crate::path_step_index::PathStepIndex;
use crate::step_index::StepIndex;

/// Produces the ordered, deduplicated cut steps segmenting `[start, end)`,
/// recursing into self-loops per §4.3. `is_cut` may always return `false`
/// (the bootstrap pass): cuts are then emitted only at loop boundaries and
/// interval endpoints.
pub fn untangle_cuts<G>(
    graph: &G,
    step_index: &StepIndex,
    path_idx: &PathStepIndex,
    start: StepHandle,
    end: StepHandle,
    is_cut: impl Fn(Handle) -> bool,
) -> Vec<StepHandle>
where
    G: PathHandleGraph,
{
    let mut cuts = Vec::new();
    let mut seen_fwd = vec![false; path_idx.step_count()];
    let mut seen_rev = vec![false; path_idx.step_count()];
    let mut queue: VecDeque<(StepHandle, StepHandle)> = VecDeque::new();
    queue.push_back((start, end));

    while let Some((start, end)) = queue.pop_front() {
        let start_pos = step_index.get_position(start);
        let end_pos = step_index.get_position(end);

        cuts.push(start);

        // Forward sweep.
        let mut s = start;
        while s != end {
            let idx = path_idx.get_step_idx(s);
            if seen_fwd[idx] {
                s = graph.get_next_step(s);
                continue;
            }
            let handle = graph.get_handle_of_step(s);
            if is_cut(handle) {
                cuts.push(s);
            }
            seen_fwd[idx] = true;
            let (found, o) = path_idx.get_next_step_on_node(handle.id(), s);
            if found {
                let pos_o = step_index.get_position(o);
                let pos_s = step_index.get_position(s);
                if start_pos < pos_o
                    && pos_o < end_pos
                    && pos_o > pos_s
                    && !seen_fwd[path_idx.get_step_idx(o)]
                {
                    queue.push_back((s, o));
                    s = o;
                    continue;
                }
            }
            s = graph.get_next_step(s);
        }

        if end == graph.path_begin(end.path) || !graph.has_previous_step(end) {
            continue;
        }

        // Reverse sweep.
        let mut s = graph.get_previous_step(end);
        loop {
            if step_index.get_position(s) <= start_pos {
                break;
            }
            let idx = path_idx.get_step_idx(s);
            if seen_rev[idx] {
                if !graph.has_previous_step(s) {
                    break;
                }
                s = graph.get_previous_step(s);
                continue;
            }
            let handle = graph.get_handle_of_step(s);
            if is_cut(handle) {
                cuts.push(s);
            }
            seen_rev[idx] = true;
            let (found, o) = path_idx.get_prev_step_on_node(handle.id(), s);
            if found {
                let pos_o = step_index.get_position(o);
                let pos_s = step_index.get_position(s);
                if start_pos < pos_o
                    && pos_o < end_pos
                    && pos_o < pos_s
                    && !seen_rev[path_idx.get_step_idx(o)]
                {
                    queue.push_back((o, s));
                    s = o;
                    continue;
                }
            }
            if !graph.has_previous_step(s) {
                break;
            }
            s = graph.get_previous_step(s);
        }

        cuts.push(end);
    }

    cuts.sort_by_key(|s| step_index.get_position(*s));
    cuts.dedup();
    cuts
}

/// Collapses cuts closer than `merge_dist`, keeping the first cut and every
/// subsequent cut whose position exceeds `last_kept + merge_dist` (C5).
pub fn merge_cuts(cuts: &[StepHandle], step_index: &StepIndex, merge_dist: u64) -> Vec<StepHandle> {
    let mut merged = Vec::new();
    let mut last_kept_pos: Option<u64> = None;
    for &cut in cuts {
        let pos = step_index.get_position(cut);
        let keep = match last_kept_pos {
            None => true,
            Some(last) => pos > last + merge_dist,
        };
        if keep {
            merged.push(cut);
            last_kept_pos = Some(pos);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::memgraph::MemGraph;
    use crate::graph::HandleGraph;

    fn positions(step_index: &StepIndex, cuts: &[StepHandle]) -> Vec<u64> {
        cuts.iter().map(|&s| step_index.get_position(s)).collect()
    }

    #[test]
    fn linear_path_with_no_cut_predicate_cuts_only_endpoints() {
        let gfa = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\n\
L\t1\t+\t2\t+\t0M\nL\t2\t+\t3\t+\t0M\nP\tx\t1+,2+,3+\t*\n";
        let g = MemGraph::from_gfa_bytes(gfa);
        let path = g.get_path_handle("x").unwrap();
        let step_index = StepIndex::build(&g, &[path]);
        let path_idx = PathStepIndex::build(&g, path);
        let cuts = untangle_cuts(
            &g,
            &step_index,
            &path_idx,
            g.path_begin(path),
            g.path_end(path),
            |_| false,
        );
        assert_eq!(positions(&step_index, &cuts), vec![0, 30]);
    }

    #[test]
    fn self_loop_forces_cuts_at_every_node_boundary() {
        // S3: A: n1 -> n2 -> n3 -> n2 -> n4, all node lengths 10.
        //
        // Note: spec.md's worked scenario S3 (§8) quotes cuts at
        // {0,10,20,30,40}, but neither this implementation nor the odgi
        // source it's grounded on produces that set: n3@20 is an interior
        // node on the loop, never a loop boundary nor an interval endpoint,
        // so it's never emitted as a cut. The driver and this test pass
        // `path_end` (not `path_back`) as the interval end (see DESIGN.md's
        // Open Questions), so the trailing cut lands on the one-past-the-end
        // sentinel at 50, not on the path's last occupied step at 40. The
        // set below is what the code actually produces; see DESIGN.md for
        // the resolution adopted here.
        let gfa = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\nS\t4\tTTTTTTTTTT\n\
L\t1\t+\t2\t+\t0M\nL\t2\t+\t3\t+\t0M\nL\t3\t+\t2\t+\t0M\nL\t2\t+\t4\t+\t0M\n\
P\tx\t1+,2+,3+,2+,4+\t*\n";
        let g = MemGraph::from_gfa_bytes(gfa);
        let path = g.get_path_handle("x").unwrap();
        let step_index = StepIndex::build(&g, &[path]);
        let path_idx = PathStepIndex::build(&g, path);
        let cuts = untangle_cuts(
            &g,
            &step_index,
            &path_idx,
            g.path_begin(path),
            g.path_end(path),
            |_| false,
        );
        assert_eq!(positions(&step_index, &cuts), vec![0, 10, 30, 50]);
    }

    #[test]
    fn merge_dist_collapses_close_cuts() {
        let gfa = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\n\
L\t1\t+\t2\t+\t0M\nL\t2\t+\t3\t+\t0M\nP\tx\t1+,2+,3+\t*\n";
        let g = MemGraph::from_gfa_bytes(gfa);
        let path = g.get_path_handle("x").unwrap();
        let step_index = StepIndex::build(&g, &[path]);
        let path_idx = PathStepIndex::build(&g, path);
        let cuts = untangle_cuts(
            &g,
            &step_index,
            &path_idx,
            g.path_begin(path),
            g.path_end(path),
            |h| matches!(h.id().0, 2),
        );
        // cuts at 0, 10 (node 2's start), 30 without merging.
        assert_eq!(positions(&step_index, &cuts), vec![0, 10, 30]);
        let merged = merge_cuts(&cuts, &step_index, 100);
        assert_eq!(positions(&step_index, &merged), vec![0]);
    }

    #[test]
    fn single_node_path_yields_one_segment() {
        let gfa = b"S\t1\tAAAAAAAAAA\nP\tx\t1+\t*\n";
        let g = MemGraph::from_gfa_bytes(gfa);
        let path = g.get_path_handle("x").unwrap();
        let step_index = StepIndex::build(&g, &[path]);
        let path_idx = PathStepIndex::build(&g, path);
        let cuts = untangle_cuts(
            &g,
            &step_index,
            &path_idx,
            g.path_begin(path),
            g.path_end(path),
            |_| false,
        );
        assert_eq!(positions(&step_index, &cuts), vec![0, 10]);
    }
}
