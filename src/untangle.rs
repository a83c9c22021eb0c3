//! Untangle driver (C8): orchestrates C2-C7 across all queries and targets
//! in parallel and emits BEDPE or PAF-like records.

use std::io::Write;
use std::sync::Mutex;

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::bitvec::AtomicBitVec;
use crate::cut::{merge_cuts, untangle_cuts};
use crate::error::UntangleError;
use crate::graph::{PathHandle, PathHandleGraph};
use crate::path_step_index::PathStepIndex;
use crate::segment_map::{get_matches, SegmentMap};
use crate::step_index::StepIndex;

/// Configuration options for a single untangle invocation (§6).
#[derive(Debug, Clone, Copy)]
pub struct UntangleConfig {
    pub merge_dist: u64,
    pub n_best: u32,
    pub min_jaccard: f64,
    pub paf_output: bool,
}

impl Default for UntangleConfig {
    fn default() -> Self {
        UntangleConfig {
            merge_dist: 0,
            n_best: 1,
            min_jaccard: 0.0,
            paf_output: false,
        }
    }
}

/// One emitted query-segment-to-target-segment mapping, fully resolved to
/// coordinates and names so it can be formatted without re-touching the
/// graph.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub query_name: String,
    pub query_len: u64,
    pub query_begin: u64,
    pub query_end: u64,
    pub target_name: String,
    pub target_len: u64,
    pub target_begin: u64,
    pub target_end: u64,
    pub jaccard: f64,
    pub is_inv: bool,
    pub self_cov: f64,
    pub nth_best: u32,
}

/// Mean, length-weighted count of same-path steps visiting each handle of
/// `[begin, end)` (§4.7): `Σ L_i · c_i / Σ L_i`. A handle visited multiple
/// times by `path` contributes multiply to both numerator and `c_i`, which is
/// intentional in repeat-rich regions (§9).
fn self_mean_coverage<G>(graph: &G, path_idx: &PathStepIndex, begin: crate::graph::StepHandle, end: crate::graph::StepHandle) -> f64
where
    G: PathHandleGraph,
{
    let mut sum = 0u64;
    let mut bp = 0u64;
    let mut s = begin;
    while s != end {
        let handle = graph.get_handle_of_step(s);
        let len = graph.get_length(handle);
        bp += len;
        sum += len * path_idx.count_on_node(handle.id()) as u64;
        s = graph.get_next_step(s);
    }
    if bp == 0 {
        0.0
    } else {
        sum as f64 / bp as f64
    }
}

fn union_sorted(queries: &[PathHandle], targets: &[PathHandle]) -> Vec<PathHandle> {
    let mut paths: Vec<PathHandle> = queries.iter().chain(targets.iter()).copied().collect();
    paths.sort_by_key(|p| p.0);
    paths.dedup();
    paths
}

/// Runs the untangle pipeline (C2-C7 orchestration, §4.7) and writes records
/// to `out` as they are produced. Queries are processed in parallel; writes
/// are serialized behind a single output mutex (§5).
pub fn untangle<G, W>(
    graph: &G,
    queries: &[PathHandle],
    targets: &[PathHandle],
    config: &UntangleConfig,
    out: &mut W,
) -> Result<(), UntangleError>
where
    G: PathHandleGraph + Sync,
    W: Write + Send,
{
    log::info!(
        "untangling {} queries against {} targets",
        queries.len(),
        targets.len()
    );
    let paths = union_sorted(queries, targets);

    log::info!("building step index over {} paths", paths.len());
    let step_index = StepIndex::build(graph, &paths);

    log::info!("establishing initial cuts for {} paths", paths.len());
    let cut_nodes = AtomicBitVec::new(graph.get_node_count() + 1);
    paths.par_iter().for_each(|&path| {
        let path_idx = PathStepIndex::build(graph, path);
        let cuts = merge_cuts(
            &untangle_cuts(
                graph,
                &step_index,
                &path_idx,
                graph.path_begin(path),
                graph.path_end(path),
                |_| false,
            ),
            &step_index,
            config.merge_dist,
        );
        let path_back_idx = path_idx.step_count();
        for step in cuts {
            // The final cut in the list may be the `path_end` sentinel
            // (no node lives there); only real steps carry a handle.
            if step.index < path_back_idx {
                let handle = graph.get_handle_of_step(step);
                cut_nodes.set(handle.id().0 as usize);
            }
        }
    });

    log::info!("building target segment index over {} targets", targets.len());
    let segment_map = SegmentMap::build(
        graph,
        &step_index,
        targets,
        |h| cut_nodes.test(h.id().0 as usize),
        config.merge_dist,
    );

    let path_to_len: FxHashMap<PathHandle, u64> = paths
        .iter()
        .map(|&p| (p, step_index.get_path_length(p)))
        .collect();

    if config.paf_output {
        log::info!("writing PAF for {} queries", queries.len());
    } else {
        log::info!("writing pair BED for {} queries", queries.len());
        out.write_all(
            b"#query.name\tquery.start\tquery.end\tref.name\tref.start\tref.end\tscore\tinv\tself.cov\tnth.best\n",
        )?;
    }

    let out = Mutex::new(out);
    queries.par_iter().try_for_each(|&query| -> Result<(), UntangleError> {
        let path_idx = PathStepIndex::build(graph, query);
        let cuts = merge_cuts(
            &untangle_cuts(
                graph,
                &step_index,
                &path_idx,
                graph.path_begin(query),
                graph.path_end(query),
                |h| cut_nodes.test(h.id().0 as usize),
            ),
            &step_index,
            config.merge_dist,
        );

        if cuts.len() < 2 {
            // Empty query (§7): fewer than 2 cuts means no segment boundary
            // pair exists, so there is nothing to emit and this is not an
            // error.
            return Ok(());
        }

        let query_name = graph.get_path_name(query).to_string();
        let query_path_len = path_to_len[&query];

        let mut lines = String::new();
        for window in cuts.windows(2) {
            let (begin, end) = (window[0], window[1]);
            let begin_pos = step_index.get_position(begin);
            let end_pos = step_index.get_position(end);
            let length = end_pos - begin_pos;
            let target_mappings = get_matches(graph, &segment_map, begin, end, length);
            if target_mappings.is_empty() {
                continue;
            }
            let self_cov = self_mean_coverage(graph, &path_idx, begin, end);

            let mut nth_best = 0u32;
            for target_mapping in &target_mappings {
                nth_best += 1;
                if nth_best > config.n_best {
                    break;
                }
                if target_mapping.jaccard < config.min_jaccard {
                    continue;
                }
                let target_begin_step = segment_map.get_segment_cut(target_mapping.segment_id);
                let target_begin_pos = step_index.get_position(target_begin_step);
                let target_end_pos =
                    target_begin_pos + segment_map.get_segment_length(target_mapping.segment_id);
                let target_path = segment_map.get_segment_path(target_mapping.segment_id);

                let mapping = Mapping {
                    query_name: query_name.clone(),
                    query_len: query_path_len,
                    query_begin: begin_pos,
                    query_end: end_pos,
                    target_name: graph.get_path_name(target_path).to_string(),
                    target_len: path_to_len[&target_path],
                    target_begin: target_begin_pos,
                    target_end: target_end_pos,
                    jaccard: target_mapping.jaccard,
                    is_inv: target_mapping.is_inv,
                    self_cov,
                    nth_best,
                };
                if config.paf_output {
                    lines.push_str(&format_paf(&mapping));
                } else {
                    lines.push_str(&format_bedpe(&mapping));
                }
            }
        }

        if !lines.is_empty() {
            let mut guard = out.lock().unwrap();
            guard.write_all(lines.as_bytes())?;
        }
        Ok(())
    })?;

    Ok(())
}

/// BEDPE record (§6): 0-based half-open coordinates on both sides.
fn format_bedpe(m: &Mapping) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
        m.query_name,
        m.query_begin,
        m.query_end,
        m.target_name,
        m.target_begin,
        m.target_end,
        m.jaccard,
        if m.is_inv { '-' } else { '+' },
        m.self_cov,
        m.nth_best,
    )
}

/// PAF-like record (§6): columns 4 and 9 are emitted as `end - 1` (closed),
/// a deliberate quirk inconsistent with standard half-open PAF, kept for
/// downstream-tool compatibility (§9).
fn format_paf(m: &Mapping) -> String {
    let block_len = (m.target_end - m.target_begin).max(m.query_end - m.query_begin);
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\tjc:f:{}\tsc:f:{}\tnb:i:{}\n",
        m.query_name,
        m.query_len,
        m.query_begin,
        m.query_end - 1,
        if m.is_inv { '-' } else { '+' },
        m.target_name,
        m.target_len,
        m.target_begin,
        m.target_end - 1,
        0,
        block_len,
        255,
        m.jaccard,
        m.self_cov,
        m.nth_best,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::memgraph::MemGraph;

    fn run(gfa: &[u8], query: &str, target: &str, config: &UntangleConfig) -> String {
        let g = MemGraph::from_gfa_bytes(gfa);
        let q = g.get_path_handle(query).unwrap();
        let t = g.get_path_handle(target).unwrap();
        let mut out = Vec::new();
        untangle(&g, &[q], &[t], config, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    // S1: two identical linear paths map onto each other perfectly.
    #[test]
    fn identical_paths_map_with_jaccard_one() {
        let gfa = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\n\
L\t1\t+\t2\t+\t0M\nL\t2\t+\t3\t+\t0M\n\
P\tA\t1+,2+,3+\t*\nP\tB\t1+,2+,3+\t*\n";
        let config = UntangleConfig {
            merge_dist: 0,
            n_best: 1,
            min_jaccard: 0.0,
            paf_output: false,
        };
        let out = run(gfa, "A", "B", &config);
        let data_line = out.lines().nth(1).unwrap();
        let cols: Vec<&str> = data_line.split('\t').collect();
        assert_eq!(cols, vec!["A", "0", "30", "B", "0", "30", "1", "+", "1", "1"]);
    }

    // A majority-reversed target (2 of 3 shared nodes flipped) still gives
    // full node-overlap Jaccard (1.0, per §4.6's length-only intersection)
    // but flips the inversion flag once inverted bp is the majority.
    //
    // Note: spec.md's worked scenario S2 (§8) quotes jaccard=0.5 for a
    // single-inverted-node case, but §4.6's own formula (isec_bp accumulates
    // unconditionally per overlapping node, regardless of orientation) never
    // produces that figure for any single-node inversion over an otherwise
    // fully shared node set -- see DESIGN.md's Open Questions for the
    // resolution adopted here (follow §4.6 and the odgi source verbatim).
    #[test]
    fn majority_inversion_flips_flag_at_full_jaccard() {
        let gfa = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\n\
P\tA\t1+,2+,3+\t*\nP\tB\t1-,2-,3+\t*\n";
        let config = UntangleConfig {
            merge_dist: 0,
            n_best: 1,
            min_jaccard: 0.0,
            paf_output: false,
        };
        let out = run(gfa, "A", "B", &config);
        let data_line = out.lines().nth(1).unwrap();
        let cols: Vec<&str> = data_line.split('\t').collect();
        assert_eq!(cols[0], "A");
        assert_eq!(cols[3], "B");
        assert_eq!(cols[6].parse::<f64>().unwrap(), 1.0);
        assert_eq!(cols[7], "-");
    }

    // A target with one shared neighbor replaced by an unrelated node halves
    // the node-overlap Jaccard without touching orientation.
    #[test]
    fn partial_node_overlap_yields_half_jaccard() {
        let gfa = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\nS\t4\tTTTTTTTTTT\n\
P\tA\t1+,2+,3+\t*\nP\tB\t1+,4+,3+\t*\n";
        let config = UntangleConfig {
            merge_dist: 0,
            n_best: 1,
            min_jaccard: 0.0,
            paf_output: false,
        };
        let out = run(gfa, "A", "B", &config);
        let data_line = out.lines().nth(1).unwrap();
        let cols: Vec<&str> = data_line.split('\t').collect();
        assert_eq!(cols[6].parse::<f64>().unwrap(), 0.5);
        assert_eq!(cols[7], "+");
    }

    #[test]
    fn paf_output_uses_closed_end_coordinates() {
        let gfa = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\n\
P\tA\t1+,2+,3+\t*\nP\tB\t1+,2+,3+\t*\n";
        let config = UntangleConfig {
            merge_dist: 0,
            n_best: 1,
            min_jaccard: 0.0,
            paf_output: true,
        };
        let out = run(gfa, "A", "B", &config);
        let cols: Vec<&str> = out.lines().next().unwrap().split('\t').collect();
        // query end (col 4, 0-indexed 3) is end_pos - 1 = 29, closed.
        assert_eq!(cols[3], "29");
        assert_eq!(cols[8], "29");
        assert_eq!(cols[9], "0");
        assert_eq!(cols[11], "255");
    }

    #[test]
    fn n_best_one_caps_records_per_segment() {
        // Three targets identical to the query: n_best=1 emits exactly one
        // record for the single query segment.
        let gfa = b"S\t1\tAAAAAAAAAA\nS\t2\tCCCCCCCCCC\nS\t3\tGGGGGGGGGG\n\
P\tA\t1+,2+,3+\t*\nP\tB\t1+,2+,3+\t*\nP\tC\t1+,2+,3+\t*\n";
        let g = MemGraph::from_gfa_bytes(gfa);
        let q = g.get_path_handle("A").unwrap();
        let b = g.get_path_handle("B").unwrap();
        let c = g.get_path_handle("C").unwrap();
        let config = UntangleConfig {
            merge_dist: 0,
            n_best: 1,
            min_jaccard: 0.0,
            paf_output: false,
        };
        let mut out = Vec::new();
        untangle(&g, &[q], &[b, c], &config, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().filter(|l| !l.starts_with('#')).count(), 1);
    }
}
