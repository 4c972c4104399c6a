//! Growable adjacency-list graph.
//!
//! Used as a convenience input and output format for the operations that
//! are defined on editable graphs (line graph, mutable bidirection).

use super::csr::{Csr, EdgeArray};
use super::immutable::{EdgeDir, ImmutableGraph};
use crate::types::{EdgeId, Result, StrataError, VertexId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct EdgeList {
    nbrs: Vec<VertexId>,
    ids: Vec<EdgeId>,
}

/// Adjacency-list graph that supports adding vertices and edges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutableGraph {
    succ: Vec<EdgeList>,
    pred: Vec<EdgeList>,
    edge_src: Vec<VertexId>,
    edge_dst: Vec<VertexId>,
    multigraph: bool,
}

impl MutableGraph {
    /// An empty graph. Simple graphs reject parallel edges.
    pub fn new(multigraph: bool) -> Self {
        Self {
            multigraph,
            ..Self::default()
        }
    }

    /// Builds a graph with `num_vertices` vertices and the given edges.
    pub fn from_coo(
        num_vertices: u64,
        src: &[VertexId],
        dst: &[VertexId],
        multigraph: bool,
    ) -> Result<Self> {
        if src.len() != dst.len() {
            return Err(StrataError::Construction(format!(
                "COO length mismatch: {} sources vs {} destinations",
                src.len(),
                dst.len()
            )));
        }
        let mut g = Self::new(multigraph);
        g.add_vertices(num_vertices);
        for (&s, &d) in src.iter().zip(dst) {
            g.add_edge(s, d)
                .map_err(|err| StrataError::Construction(err.to_string()))?;
        }
        Ok(g)
    }

    /// Appends `n` isolated vertices.
    pub fn add_vertices(&mut self, n: u64) {
        let total = self.succ.len() + n as usize;
        self.succ.resize_with(total, EdgeList::default);
        self.pred.resize_with(total, EdgeList::default);
    }

    /// Appends edge `src -> dst` and returns its id.
    pub fn add_edge(&mut self, src: VertexId, dst: VertexId) -> Result<EdgeId> {
        self.check_vertex(src)?;
        self.check_vertex(dst)?;
        if !self.multigraph && self.succ[src as usize].nbrs.contains(&dst) {
            return Err(StrataError::Precondition(format!(
                "edge {src} -> {dst} already exists in a simple graph"
            )));
        }
        let id = self.edge_src.len() as EdgeId;
        self.succ[src as usize].nbrs.push(dst);
        self.succ[src as usize].ids.push(id);
        self.pred[dst as usize].nbrs.push(src);
        self.pred[dst as usize].ids.push(id);
        self.edge_src.push(src);
        self.edge_dst.push(dst);
        Ok(id)
    }

    /// Appends one edge per `(srcs[i], dsts[i])` pair.
    pub fn add_edges(&mut self, srcs: &[VertexId], dsts: &[VertexId]) -> Result<()> {
        if srcs.len() != dsts.len() {
            return Err(StrataError::Query(format!(
                "cannot pair {} sources with {} destinations",
                srcs.len(),
                dsts.len()
            )));
        }
        for (&s, &d) in srcs.iter().zip(dsts) {
            self.add_edge(s, d)?;
        }
        Ok(())
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> u64 {
        self.succ.len() as u64
    }

    /// Number of edges.
    pub fn num_edges(&self) -> u64 {
        self.edge_src.len() as u64
    }

    /// Whether parallel edges are allowed.
    pub fn is_multigraph(&self) -> bool {
        self.multigraph
    }

    pub(crate) fn check_vertex(&self, v: VertexId) -> Result<()> {
        if v < self.num_vertices() {
            Ok(())
        } else {
            Err(StrataError::Query(format!(
                "vertex {v} out of range 0..{}",
                self.num_vertices()
            )))
        }
    }

    /// Destinations of the out-edges of `v`, in insertion order.
    pub fn successors(&self, v: VertexId) -> Result<&[VertexId]> {
        self.check_vertex(v)?;
        Ok(&self.succ[v as usize].nbrs)
    }

    /// Sources of the in-edges of `v`, in insertion order.
    pub fn predecessors(&self, v: VertexId) -> Result<&[VertexId]> {
        self.check_vertex(v)?;
        Ok(&self.pred[v as usize].nbrs)
    }

    /// Ids of the out-edges of `v`, aligned with [`MutableGraph::successors`].
    pub fn out_edge_ids(&self, v: VertexId) -> Result<&[EdgeId]> {
        self.check_vertex(v)?;
        Ok(&self.succ[v as usize].ids)
    }

    /// Endpoints of edge `eid`.
    pub fn find_edge(&self, eid: EdgeId) -> Result<(VertexId, VertexId)> {
        let idx = eid as usize;
        match (self.edge_src.get(idx), self.edge_dst.get(idx)) {
            (Some(&s), Some(&d)) => Ok((s, d)),
            _ => Err(StrataError::Query(format!(
                "edge {eid} out of range 0..{}",
                self.num_edges()
            ))),
        }
    }

    /// In-edges of every vertex in `vids`, grouped by vertex.
    pub fn in_edges(&self, vids: &[VertexId]) -> Result<EdgeArray> {
        let mut out = EdgeArray::default();
        for &v in vids {
            self.check_vertex(v)?;
            let list = &self.pred[v as usize];
            for (&s, &id) in list.nbrs.iter().zip(&list.ids) {
                out.push(s, v, id);
            }
        }
        Ok(out)
    }

    /// Every edge in id order.
    pub fn edges(&self) -> EdgeArray {
        EdgeArray {
            src: self.edge_src.clone(),
            dst: self.edge_dst.clone(),
            id: (0..self.num_edges()).collect(),
        }
    }

    /// Freezes into an out-indexed [`ImmutableGraph`] with the same edge ids.
    pub fn to_immutable(&self) -> Result<ImmutableGraph> {
        let csr = Csr::from_coo(self.num_vertices(), &self.edge_src, &self.edge_dst, None)?;
        Ok(ImmutableGraph::from_parts(
            csr,
            EdgeDir::Out,
            Some(self.multigraph),
        ))
    }
}
