//! Tagged graph variant and the query surface shared by both variants.

use std::fmt;

use super::csr::EdgeArray;
use super::immutable::ImmutableGraph;
use super::mutable::MutableGraph;
use crate::types::{Result, StrataError, VertexId};

/// Structural queries every graph variant answers.
pub trait GraphQuery {
    /// Number of vertices.
    fn num_vertices(&self) -> u64;
    /// Number of edges.
    fn num_edges(&self) -> u64;
    /// Whether parallel edges may exist.
    fn is_multigraph(&self) -> bool;
    /// Whether the structure is frozen.
    fn is_readonly(&self) -> bool;
    /// Destinations of the out-edges of `v`, parallel edges repeated.
    fn succ_vec(&self, v: VertexId) -> Result<Vec<VertexId>>;
    /// Sources of the in-edges of `v`, parallel edges repeated.
    fn pred_vec(&self, v: VertexId) -> Result<Vec<VertexId>>;
    /// In-edges of every vertex in `vids`, grouped by vertex in the given order.
    fn in_edges(&self, vids: &[VertexId]) -> Result<EdgeArray>;
}

impl GraphQuery for ImmutableGraph {
    fn num_vertices(&self) -> u64 {
        ImmutableGraph::num_vertices(self)
    }

    fn num_edges(&self) -> u64 {
        ImmutableGraph::num_edges(self)
    }

    fn is_multigraph(&self) -> bool {
        ImmutableGraph::is_multigraph(self)
    }

    fn is_readonly(&self) -> bool {
        true
    }

    fn succ_vec(&self, v: VertexId) -> Result<Vec<VertexId>> {
        self.successors(v, 1)
    }

    fn pred_vec(&self, v: VertexId) -> Result<Vec<VertexId>> {
        self.predecessors(v, 1)
    }

    fn in_edges(&self, vids: &[VertexId]) -> Result<EdgeArray> {
        ImmutableGraph::in_edges(self, vids)
    }
}

impl GraphQuery for MutableGraph {
    fn num_vertices(&self) -> u64 {
        MutableGraph::num_vertices(self)
    }

    fn num_edges(&self) -> u64 {
        MutableGraph::num_edges(self)
    }

    fn is_multigraph(&self) -> bool {
        MutableGraph::is_multigraph(self)
    }

    fn is_readonly(&self) -> bool {
        false
    }

    fn succ_vec(&self, v: VertexId) -> Result<Vec<VertexId>> {
        Ok(self.successors(v)?.to_vec())
    }

    fn pred_vec(&self, v: VertexId) -> Result<Vec<VertexId>> {
        Ok(self.predecessors(v)?.to_vec())
    }

    fn in_edges(&self, vids: &[VertexId]) -> Result<EdgeArray> {
        MutableGraph::in_edges(self, vids)
    }
}

/// Variant tag of a [`Graph`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GraphVariant {
    /// Adjacency-list graph.
    Mutable,
    /// CSR-backed graph.
    Immutable,
}

impl fmt::Display for GraphVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GraphVariant::Mutable => "mutable",
            GraphVariant::Immutable => "immutable",
        })
    }
}

/// A graph of either variant.
#[derive(Clone, Debug)]
pub enum Graph {
    /// Adjacency-list graph.
    Mutable(MutableGraph),
    /// CSR-backed graph.
    Immutable(ImmutableGraph),
}

impl Graph {
    /// Variant tag.
    pub fn variant(&self) -> GraphVariant {
        match self {
            Graph::Mutable(_) => GraphVariant::Mutable,
            Graph::Immutable(_) => GraphVariant::Immutable,
        }
    }

    /// The CSR-backed graph, if this is one.
    pub fn as_immutable(&self) -> Option<&ImmutableGraph> {
        match self {
            Graph::Immutable(g) => Some(g),
            Graph::Mutable(_) => None,
        }
    }

    /// The adjacency-list graph, if this is one.
    pub fn as_mutable(&self) -> Option<&MutableGraph> {
        match self {
            Graph::Mutable(g) => Some(g),
            Graph::Immutable(_) => None,
        }
    }

    /// The CSR-backed graph, or a precondition error naming `op`.
    pub fn require_immutable(&self, op: &str) -> Result<&ImmutableGraph> {
        self.as_immutable().ok_or_else(|| {
            StrataError::Precondition(format!("{op} requires an immutable graph"))
        })
    }

    /// The adjacency-list graph, or a precondition error naming `op`.
    pub fn require_mutable(&self, op: &str) -> Result<&MutableGraph> {
        self.as_mutable()
            .ok_or_else(|| StrataError::Precondition(format!("{op} requires a mutable graph")))
    }

    /// Freezes into an [`ImmutableGraph`], cloning the CSR handles when
    /// already immutable.
    pub fn to_immutable(&self) -> Result<ImmutableGraph> {
        match self {
            Graph::Immutable(g) => Ok(g.clone()),
            Graph::Mutable(g) => g.to_immutable(),
        }
    }

    fn query(&self) -> &dyn GraphQuery {
        match self {
            Graph::Mutable(g) => g,
            Graph::Immutable(g) => g,
        }
    }
}

impl GraphQuery for Graph {
    fn num_vertices(&self) -> u64 {
        self.query().num_vertices()
    }

    fn num_edges(&self) -> u64 {
        self.query().num_edges()
    }

    fn is_multigraph(&self) -> bool {
        self.query().is_multigraph()
    }

    fn is_readonly(&self) -> bool {
        self.query().is_readonly()
    }

    fn succ_vec(&self, v: VertexId) -> Result<Vec<VertexId>> {
        self.query().succ_vec(v)
    }

    fn pred_vec(&self, v: VertexId) -> Result<Vec<VertexId>> {
        self.query().pred_vec(v)
    }

    fn in_edges(&self, vids: &[VertexId]) -> Result<EdgeArray> {
        self.query().in_edges(vids)
    }
}

impl From<ImmutableGraph> for Graph {
    fn from(g: ImmutableGraph) -> Self {
        Graph::Immutable(g)
    }
}

impl From<MutableGraph> for Graph {
    fn from(g: MutableGraph) -> Self {
        Graph::Mutable(g)
    }
}
