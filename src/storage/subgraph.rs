//! Derived graphs that remember where their vertices and edges came from.

use super::immutable::ImmutableGraph;
use crate::types::{EdgeId, VertexId};

/// A derived graph plus its local-to-parent id mappings.
#[derive(Clone, Debug)]
pub struct Subgraph {
    /// The derived graph, numbered locally from 0.
    pub graph: ImmutableGraph,
    /// `induced_vertices[i]` is the parent id of local vertex `i`.
    pub induced_vertices: Vec<VertexId>,
    /// `induced_edges[i]` is the parent id of local edge `i`.
    pub induced_edges: Vec<EdgeId>,
}

/// A partition subgraph extended with a halo of boundary vertices and edges.
#[derive(Clone, Debug)]
pub struct HaloSubgraph {
    /// Graph and id mappings; vertex ids ascend with parent ids.
    pub subgraph: Subgraph,
    /// True for vertices that belong to the seed set.
    pub inner_nodes: Vec<bool>,
    /// True for edges whose source belongs to the seed set and that were
    /// discovered in the first hop.
    pub inner_edges: Vec<bool>,
}

impl HaloSubgraph {
    /// Number of seed vertices held.
    pub fn num_inner_nodes(&self) -> usize {
        self.inner_nodes.iter().filter(|&&inner| inner).count()
    }

    /// Number of halo vertices held.
    pub fn num_halo_nodes(&self) -> usize {
        self.inner_nodes.len() - self.num_inner_nodes()
    }
}
