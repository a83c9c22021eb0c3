//! An immutable, load-once graph backend built from a GFA1 file.
//!
//! Grounded on the teacher's `GraphAuxilliary` (owns flat `Vec`s keyed by a
//! dense node id, built once from a single GFA pass) combined with
//! `rs-handlegraph`'s `HashGraph` (per-node `occurrences` list and per-path
//! `Vec<Handle>` storage, needed here for `for_each_step_on_handle`).

use std::collections::HashMap;
use std::fs::File;
use std::io::Read as _;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::UntangleError;
use crate::graph::gfa::{self, ParsedGfa};
use crate::graph::{GoLeft, Handle, HandleGraph, NodeId, Orientation, PathHandle, PathHandleGraph, StepHandle};

struct NodeRecord {
    sequence: Vec<u8>,
    /// Forward-oriented neighbors reachable from this node's right end.
    right_edges: Vec<Handle>,
    /// Forward-oriented neighbors reachable from this node's left end.
    left_edges: Vec<Handle>,
    /// Every step, on any path, that lands on this node (either orientation).
    occurrences: Vec<StepHandle>,
}

struct PathRecord {
    name: String,
    steps: Vec<Handle>,
}

/// A whole graph loaded into memory from one GFA1 file.
///
/// Node ids are dense and 1-based, assigned in the order `S` lines appear
/// (the order [`crate::segment_map`]'s CSR index relies on).
pub struct MemGraph {
    nodes: Vec<NodeRecord>,
    name_to_id: FxHashMap<Vec<u8>, NodeId>,
    paths: Vec<PathRecord>,
    path_name_to_handle: HashMap<String, PathHandle>,
}

impl MemGraph {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, UntangleError> {
        let mut file = File::open(path.as_ref()).map_err(UntangleError::Io)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(UntangleError::Io)?;
        Ok(Self::from_gfa_bytes(&contents[..]))
    }

    pub fn from_gfa_bytes(data: &[u8]) -> Self {
        let parsed: ParsedGfa = gfa::parse_gfa(data);
        Self::from_parsed(parsed)
    }

    fn from_parsed(parsed: ParsedGfa) -> Self {
        let mut name_to_id = FxHashMap::default();
        let mut nodes: Vec<NodeRecord> = Vec::with_capacity(parsed.segments.len());
        for (i, seg) in parsed.segments.into_iter().enumerate() {
            let id = NodeId((i + 1) as u64);
            name_to_id.insert(seg.name, id);
            nodes.push(NodeRecord {
                sequence: seg.sequence,
                right_edges: Vec::new(),
                left_edges: Vec::new(),
                occurrences: Vec::new(),
            });
        }

        for link in &parsed.links {
            let from_id = *name_to_id
                .get(&link.from)
                .unwrap_or_else(|| panic!("L line references unknown segment"));
            let to_id = *name_to_id
                .get(&link.to)
                .unwrap_or_else(|| panic!("L line references unknown segment"));
            let from = Handle::pack(from_id, link.from_orient == Orientation::Reverse);
            let to = Handle::pack(to_id, link.to_orient == Orientation::Reverse);
            add_edge(&mut nodes, from, to);
        }

        let mut paths = Vec::with_capacity(parsed.paths.len());
        let mut path_name_to_handle = HashMap::with_capacity(parsed.paths.len());
        for (path_idx, p) in parsed.paths.into_iter().enumerate() {
            let path_handle = PathHandle(path_idx as u32);
            let mut steps = Vec::with_capacity(p.steps.len());
            for (step_idx, (seg_name, orient)) in p.steps.into_iter().enumerate() {
                let id = *name_to_id
                    .get(&seg_name)
                    .unwrap_or_else(|| panic!("path references unknown segment"));
                let handle = Handle::pack(id, orient == Orientation::Reverse);
                steps.push(handle);
                nodes[id.0 as usize - 1].occurrences.push(StepHandle {
                    path: path_handle,
                    index: step_idx,
                });
            }
            path_name_to_handle.insert(p.name.clone(), path_handle);
            paths.push(PathRecord { name: p.name, steps });
        }

        MemGraph {
            nodes,
            name_to_id,
            paths,
            path_name_to_handle,
        }
    }

    pub fn node_id_by_name(&self, name: &[u8]) -> Option<NodeId> {
        self.name_to_id.get(name).copied()
    }

    fn node(&self, handle: Handle) -> &NodeRecord {
        &self.nodes[handle.id().0 as usize - 1]
    }
}

/// Adds both directions of an edge, oriented the way odgi's bidirected model
/// requires: `from`'s right neighbor is `to`; `to`'s right neighbor (when
/// approached from its own left side) is `from`, via each handle's flip.
fn add_edge(nodes: &mut [NodeRecord], from: Handle, to: Handle) {
    nodes[from.id().0 as usize - 1].right_edges.push(to);
    nodes[to.id().0 as usize - 1].left_edges.push(from);
    let from_flip = from.flip();
    let to_flip = to.flip();
    nodes[to_flip.id().0 as usize - 1].right_edges.push(from_flip);
    nodes[from_flip.id().0 as usize - 1].left_edges.push(to_flip);
}

impl HandleGraph for MemGraph {
    fn get_length(&self, handle: Handle) -> u64 {
        self.node(handle).sequence.len() as u64
    }

    fn get_sequence(&self, handle: Handle) -> Vec<u8> {
        let seq = &self.node(handle).sequence;
        if handle.is_reverse() {
            reverse_complement(seq)
        } else {
            seq.clone()
        }
    }

    fn get_node_count(&self) -> usize {
        self.nodes.len()
    }

    fn for_each_handle(&self, mut f: impl FnMut(Handle)) {
        for i in 0..self.nodes.len() {
            f(Handle::pack(NodeId((i + 1) as u64), false));
        }
    }

    fn get_degree(&self, handle: Handle, go_left: GoLeft) -> usize {
        let node = self.node(handle);
        let edges = if go_left ^ handle.is_reverse() {
            &node.left_edges
        } else {
            &node.right_edges
        };
        edges.len()
    }

    fn follow_edges(&self, handle: Handle, go_left: GoLeft, mut f: impl FnMut(Handle) -> bool) {
        let node = self.node(handle);
        let edges = if go_left ^ handle.is_reverse() {
            &node.left_edges
        } else {
            &node.right_edges
        };
        for &next in edges {
            let oriented = if handle.is_reverse() { next.flip() } else { next };
            if !f(oriented) {
                break;
            }
        }
    }
}

impl PathHandleGraph for MemGraph {
    fn get_path_name(&self, path: PathHandle) -> &str {
        &self.paths[path.0 as usize].name
    }

    fn get_path_handle(&self, name: &str) -> Option<PathHandle> {
        self.path_name_to_handle.get(name).copied()
    }

    fn path_back(&self, path: PathHandle) -> StepHandle {
        StepHandle {
            path,
            index: self.paths[path.0 as usize].steps.len() - 1,
        }
    }

    fn path_end(&self, path: PathHandle) -> StepHandle {
        StepHandle {
            path,
            index: self.paths[path.0 as usize].steps.len(),
        }
    }

    fn get_handle_of_step(&self, step: StepHandle) -> Handle {
        self.paths[step.path.0 as usize].steps[step.index]
    }

    fn for_each_step_in_path(&self, path: PathHandle, mut f: impl FnMut(StepHandle)) {
        let count = self.paths[path.0 as usize].steps.len();
        for index in 0..count {
            f(StepHandle { path, index });
        }
    }

    fn for_each_step_on_handle(&self, handle: Handle, mut f: impl FnMut(StepHandle)) {
        for &step in &self.node(handle).occurrences {
            f(step);
        }
    }
}

/// Grounded on `rs-handlegraph`'s `dna::revcomp`; inlined here to avoid
/// pulling in a whole bioinformatics-sequence crate for one function.
fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            b'a' => b't',
            b'c' => b'g',
            b'g' => b'c',
            b't' => b'a',
            other => other,
        })
        .collect()
}

impl MemGraph {
    pub fn paths(&self) -> impl Iterator<Item = PathHandle> + '_ {
        (0..self.paths.len()).map(|i| PathHandle(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY_GFA: &[u8] = b"H\tVN:Z:1.0\n\
S\t1\tAAA\n\
S\t2\tCCC\n\
S\t3\tGGG\n\
L\t1\t+\t2\t+\t0M\n\
L\t2\t+\t3\t+\t0M\n\
P\tx\t1+,2+,3+\t*\n";

    #[test]
    fn loads_dense_node_ids() {
        let g = MemGraph::from_gfa_bytes(TINY_GFA);
        assert_eq!(g.get_node_count(), 3);
        assert_eq!(g.node_id_by_name(b"1"), Some(NodeId(1)));
        assert_eq!(g.node_id_by_name(b"3"), Some(NodeId(3)));
    }

    #[test]
    fn path_steps_walk_in_order() {
        let g = MemGraph::from_gfa_bytes(TINY_GFA);
        let path = g.get_path_handle("x").unwrap();
        let mut seen = Vec::new();
        g.for_each_step_in_path(path, |s| seen.push(g.get_handle_of_step(s).id().0));
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn reverse_handle_reverse_complements_sequence() {
        let g = MemGraph::from_gfa_bytes(TINY_GFA);
        let h = Handle::pack(NodeId(2), true);
        assert_eq!(g.get_sequence(h), b"GGG".to_vec());
    }

    #[test]
    fn degree_counts_both_ends() {
        let g = MemGraph::from_gfa_bytes(TINY_GFA);
        let middle = Handle::pack(NodeId(2), false);
        assert_eq!(g.get_degree(middle, false), 1);
        assert_eq!(g.get_degree(middle, true), 1);
        let first = Handle::pack(NodeId(1), false);
        assert_eq!(g.get_degree(first, true), 0);
    }

    #[test]
    fn for_each_step_on_handle_finds_occurrence() {
        let g = MemGraph::from_gfa_bytes(TINY_GFA);
        let h = Handle::pack(NodeId(2), false);
        let mut count = 0;
        g.for_each_step_on_handle(h, |_| count += 1);
        assert_eq!(count, 1);
    }
}
