//! Read-only graph query contract (C1) consumed by the untangle core.
//!
//! Everything downstream of this module (step index, cut detector, segment
//! map, matcher, driver, unitig extractor) is generic over [`HandleGraph`]
//! and [`PathHandleGraph`]; it never assumes a particular storage backend.
//! [`memgraph::MemGraph`] is the one concrete, GFA-loaded backend this crate
//! ships so the core is actually runnable; the on-disk container, its
//! serialization, and any mutation operations are out of scope here.

mod gfa;
pub mod memgraph;

use std::fmt;

/// Positive integer identifying a node. Dense and 1-based in every backend
/// shipped by this crate; [`segment_map`](crate::segment_map) relies on that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Orientation {
    Forward,
    Reverse,
}

impl Orientation {
    pub fn flip(self) -> Self {
        match self {
            Orientation::Forward => Orientation::Reverse,
            Orientation::Reverse => Orientation::Forward,
        }
    }

    pub fn to_pm(self) -> char {
        match self {
            Orientation::Forward => '+',
            Orientation::Reverse => '-',
        }
    }
}

/// A node paired with an orientation bit, packed into a single `u64` the way
/// `rs-handlegraph`'s `Handle` does: `id << 1 | is_reverse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u64);

impl Handle {
    pub fn pack(id: NodeId, is_reverse: bool) -> Self {
        Handle((id.0 << 1) | (is_reverse as u64))
    }

    pub fn id(self) -> NodeId {
        NodeId(self.0 >> 1)
    }

    pub fn is_reverse(self) -> bool {
        (self.0 & 1) == 1
    }

    pub fn orientation(self) -> Orientation {
        if self.is_reverse() {
            Orientation::Reverse
        } else {
            Orientation::Forward
        }
    }

    pub fn flip(self) -> Self {
        Handle(self.0 ^ 1)
    }

    pub fn forward(self) -> Self {
        Handle(self.0 & !1)
    }
}

/// Which direction edges are followed from a handle: `true` = against the
/// handle's orientation (the "previous" direction), `false` = "next".
pub type GoLeft = bool;

/// Opaque identifier of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathHandle(pub u32);

/// A position within a specific path's walk. `index == step_count` denotes
/// the one-past-the-end sentinel returned by [`PathHandleGraph::path_end`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepHandle {
    pub path: PathHandle,
    pub index: usize,
}

/// Read-only query contract over nodes and edges.
pub trait HandleGraph {
    fn get_length(&self, handle: Handle) -> u64;
    fn get_sequence(&self, handle: Handle) -> Vec<u8>;
    fn get_id(&self, handle: Handle) -> NodeId {
        handle.id()
    }
    fn get_is_reverse(&self, handle: Handle) -> bool {
        handle.is_reverse()
    }
    fn get_node_count(&self) -> usize;
    fn for_each_handle(&self, f: impl FnMut(Handle));
    fn get_degree(&self, handle: Handle, go_left: GoLeft) -> usize;
    /// Visits neighboring handles. The callback may return `false` to stop
    /// early, mirroring odgi's `follow_edges`.
    fn follow_edges(&self, handle: Handle, go_left: GoLeft, f: impl FnMut(Handle) -> bool);
}

/// Read-only query contract over paths and steps, layered atop [`HandleGraph`].
pub trait PathHandleGraph: HandleGraph {
    fn get_path_name(&self, path: PathHandle) -> &str;
    fn get_path_handle(&self, name: &str) -> Option<PathHandle>;
    fn path_begin(&self, path: PathHandle) -> StepHandle {
        StepHandle { path, index: 0 }
    }
    fn path_back(&self, path: PathHandle) -> StepHandle;
    fn path_end(&self, path: PathHandle) -> StepHandle;
    fn get_handle_of_step(&self, step: StepHandle) -> Handle;
    fn get_path_handle_of_step(&self, step: StepHandle) -> PathHandle {
        step.path
    }
    fn get_next_step(&self, step: StepHandle) -> StepHandle {
        StepHandle {
            path: step.path,
            index: step.index + 1,
        }
    }
    fn get_previous_step(&self, step: StepHandle) -> StepHandle {
        StepHandle {
            path: step.path,
            index: step.index - 1,
        }
    }
    fn has_previous_step(&self, step: StepHandle) -> bool {
        step.index > 0
    }
    fn for_each_step_in_path(&self, path: PathHandle, f: impl FnMut(StepHandle));
    /// Visits every step, on any path, whose handle's node id matches
    /// `handle`'s node id (orientation-agnostic, per odgi's
    /// `for_each_step_on_handle`).
    fn for_each_step_on_handle(&self, handle: Handle, f: impl FnMut(StepHandle));
}
