//! Read-only graph backed by one or two CSR directions.
//!
//! The direction supplied at construction is the primary view. The opposite
//! direction is derived on first access through a [`OnceLock`], so concurrent
//! first readers build it exactly once and never observe a partial value.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::csr::{Csr, EdgeArray};
use super::subgraph::Subgraph;
use crate::types::{EdgeId, Result, StrataError, VertexId};

/// Which endpoint a CSR is indexed by.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EdgeDir {
    /// Rows are destinations; a row lists the sources of its in-edges.
    In,
    /// Rows are sources; a row lists the destinations of its out-edges.
    Out,
}

impl EdgeDir {
    /// The other direction.
    pub fn flip(self) -> Self {
        match self {
            EdgeDir::In => EdgeDir::Out,
            EdgeDir::Out => EdgeDir::In,
        }
    }
}

impl FromStr for EdgeDir {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in" => Ok(EdgeDir::In),
            "out" => Ok(EdgeDir::Out),
            other => Err(StrataError::Construction(format!(
                "unknown edge direction '{other}', expected 'in' or 'out'"
            ))),
        }
    }
}

impl fmt::Display for EdgeDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EdgeDir::In => "in",
            EdgeDir::Out => "out",
        })
    }
}

/// Layout requested from [`ImmutableGraph::adjacency`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AdjFormat {
    /// Row-compressed arrays.
    Csr,
    /// Coordinate list.
    Coo,
}

impl FromStr for AdjFormat {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csr" => Ok(AdjFormat::Csr),
            "coo" => Ok(AdjFormat::Coo),
            other => Err(StrataError::Query(format!(
                "unknown adjacency format '{other}', expected 'csr' or 'coo'"
            ))),
        }
    }
}

/// Materialized adjacency returned by [`ImmutableGraph::adjacency`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Adjacency {
    /// Shared CSR view.
    Csr(Arc<Csr>),
    /// Coordinate list in row-major order.
    Coo {
        /// Row endpoint of each entry.
        row: Vec<VertexId>,
        /// Column endpoint of each entry.
        col: Vec<VertexId>,
        /// Edge id of each entry.
        edge_ids: Vec<EdgeId>,
    },
}

/// Immutable compressed-adjacency graph.
#[derive(Clone)]
pub struct ImmutableGraph {
    primary: Arc<Csr>,
    primary_dir: EdgeDir,
    derived: OnceLock<Arc<Csr>>,
    multigraph: bool,
    num_bits: u8,
}

impl fmt::Debug for ImmutableGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImmutableGraph")
            .field("num_vertices", &self.num_vertices())
            .field("num_edges", &self.num_edges())
            .field("primary_dir", &self.primary_dir)
            .field("derived_cached", &self.derived.get().is_some())
            .field("multigraph", &self.multigraph)
            .field("num_bits", &self.num_bits)
            .finish()
    }
}

impl ImmutableGraph {
    /// Builds from COO arrays with sequential edge ids `0..E`.
    ///
    /// When `multigraph` is `None` it is inferred from the edge list.
    pub fn from_coo(
        num_vertices: u64,
        src: &[VertexId],
        dst: &[VertexId],
        multigraph: Option<bool>,
    ) -> Result<Self> {
        let csr = Csr::from_coo(num_vertices, src, dst, None)?;
        Ok(Self::from_parts(csr, EdgeDir::Out, multigraph))
    }

    /// Builds from COO arrays carrying explicit edge ids.
    pub fn from_coo_with_edge_ids(
        num_vertices: u64,
        src: &[VertexId],
        dst: &[VertexId],
        edge_ids: &[EdgeId],
        multigraph: Option<bool>,
    ) -> Result<Self> {
        let csr = Csr::from_coo(num_vertices, src, dst, Some(edge_ids))?;
        Ok(Self::from_parts(csr, EdgeDir::Out, multigraph))
    }

    /// Adopts CSR arrays for direction `dir` without recomputation.
    pub fn from_csr(
        indptr: Vec<u64>,
        indices: Vec<VertexId>,
        edge_ids: Vec<EdgeId>,
        dir: EdgeDir,
        multigraph: Option<bool>,
    ) -> Result<Self> {
        let csr = Csr::new(indptr, indices, edge_ids)?;
        Ok(Self::from_parts(csr, dir, multigraph))
    }

    /// Wraps an already validated CSR.
    pub fn from_parts(csr: Csr, dir: EdgeDir, multigraph: Option<bool>) -> Self {
        let multigraph = multigraph.unwrap_or_else(|| csr.has_duplicate());
        Self {
            primary: Arc::new(csr),
            primary_dir: dir,
            derived: OnceLock::new(),
            multigraph,
            num_bits: 64,
        }
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> u64 {
        self.primary.num_vertices()
    }

    /// Number of edges.
    pub fn num_edges(&self) -> u64 {
        self.primary.num_edges()
    }

    /// Whether parallel edges may exist.
    pub fn is_multigraph(&self) -> bool {
        self.multigraph
    }

    /// Bit width of vertex and edge ids.
    pub fn num_bits(&self) -> u8 {
        self.num_bits
    }

    /// Returns a copy tagged with `bits`-wide ids after checking every id fits.
    pub fn as_num_bits(&self, bits: u8) -> Result<ImmutableGraph> {
        let limit = match bits {
            32 => u64::from(u32::MAX),
            64 => u64::MAX,
            other => {
                return Err(StrataError::Precondition(format!(
                    "unsupported id width {other}, expected 32 or 64"
                )))
            }
        };
        let csr = &self.primary;
        let too_wide = self.num_vertices() > limit
            || self.num_edges() > limit
            || csr.edge_ids().iter().any(|&id| id > limit);
        if too_wide {
            return Err(StrataError::Precondition(format!(
                "graph ids do not fit in {bits} bits"
            )));
        }
        let mut out = self.clone();
        out.num_bits = bits;
        Ok(out)
    }

    /// Direction the graph was constructed from.
    pub fn primary_dir(&self) -> EdgeDir {
        self.primary_dir
    }

    /// Returns the CSR for `dir` only when it exists without building it.
    pub fn cached_csr(&self, dir: EdgeDir) -> Option<&Arc<Csr>> {
        if dir == self.primary_dir {
            Some(&self.primary)
        } else {
            self.derived.get()
        }
    }

    /// In-edge CSR, built on first access.
    pub fn in_csr(&self) -> &Arc<Csr> {
        self.csr(EdgeDir::In)
    }

    /// Out-edge CSR, built on first access.
    pub fn out_csr(&self) -> &Arc<Csr> {
        self.csr(EdgeDir::Out)
    }

    /// CSR for `dir`, built from the primary view on first access.
    pub fn csr(&self, dir: EdgeDir) -> &Arc<Csr> {
        if dir == self.primary_dir {
            return &self.primary;
        }
        self.derived.get_or_init(|| {
            debug!(
                dir = %dir,
                vertices = self.primary.num_vertices(),
                edges = self.primary.num_edges(),
                "graph.csr.build_derived"
            );
            Arc::new(self.primary.transpose())
        })
    }

    /// Sorts the rows of every cached direction in place.
    pub fn sort_csr(&mut self) {
        Arc::make_mut(&mut self.primary).sort();
        if let Some(derived) = self.derived.get_mut() {
            Arc::make_mut(derived).sort();
        }
    }

    /// Whether every cached direction has ascending rows.
    pub fn is_sorted(&self) -> bool {
        self.primary.is_sorted() && self.derived.get().map_or(true, |d| d.is_sorted())
    }

    /// Whether `v` is a vertex of this graph.
    pub fn has_vertex(&self, v: VertexId) -> bool {
        v < self.num_vertices()
    }

    pub(crate) fn check_vertex(&self, v: VertexId) -> Result<()> {
        if self.has_vertex(v) {
            Ok(())
        } else {
            Err(StrataError::Query(format!(
                "vertex {v} out of range 0..{}",
                self.num_vertices()
            )))
        }
    }

    /// Whether at least one edge `src -> dst` exists.
    pub fn has_edge_between(&self, src: VertexId, dst: VertexId) -> Result<bool> {
        Ok(!self.edge_id(src, dst)?.is_empty())
    }

    /// Vertices reached from `v` along in-edges after `radius` hops.
    pub fn predecessors(&self, v: VertexId, radius: u64) -> Result<Vec<VertexId>> {
        self.expand(EdgeDir::In, v, radius)
    }

    /// Vertices reached from `v` along out-edges after `radius` hops.
    pub fn successors(&self, v: VertexId, radius: u64) -> Result<Vec<VertexId>> {
        self.expand(EdgeDir::Out, v, radius)
    }

    fn expand(&self, dir: EdgeDir, v: VertexId, radius: u64) -> Result<Vec<VertexId>> {
        self.check_vertex(v)?;
        if radius == 0 {
            return Err(StrataError::Query("radius must be at least 1".into()));
        }
        let csr = self.csr(dir);
        let mut frontier = vec![v];
        for _ in 0..radius {
            let mut next = Vec::new();
            for &u in &frontier {
                next.extend_from_slice(csr.row(u).0);
            }
            frontier = next;
        }
        Ok(frontier)
    }

    /// All edge ids from `src` to `dst`; empty when none exist.
    pub fn edge_id(&self, src: VertexId, dst: VertexId) -> Result<Vec<EdgeId>> {
        self.check_vertex(src)?;
        self.check_vertex(dst)?;
        match self.cached_csr(EdgeDir::Out) {
            Some(out) => Ok(out.find(src, dst)),
            None => Ok(self.in_csr().find(dst, src)),
        }
    }

    /// Edge ids for each `(srcs[i], dsts[i])` pair.
    ///
    /// A length-1 side is broadcast against the other. Pairs with several
    /// parallel edges contribute one entry per edge; pairs with none
    /// contribute nothing.
    pub fn edge_ids(&self, srcs: &[VertexId], dsts: &[VertexId]) -> Result<EdgeArray> {
        let pairs = broadcast_len(srcs.len(), dsts.len())?;
        let mut out = EdgeArray::default();
        for i in 0..pairs {
            let src = srcs[if srcs.len() == 1 { 0 } else { i }];
            let dst = dsts[if dsts.len() == 1 { 0 } else { i }];
            for id in self.edge_id(src, dst)? {
                out.push(src, dst, id);
            }
        }
        Ok(out)
    }

    /// In-edges of every vertex in `vids`, grouped by vertex in the given order.
    pub fn in_edges(&self, vids: &[VertexId]) -> Result<EdgeArray> {
        let csr = self.in_csr();
        let mut out = EdgeArray::default();
        for &v in vids {
            self.check_vertex(v)?;
            let (srcs, ids) = csr.row(v);
            for (&s, &id) in srcs.iter().zip(ids) {
                out.push(s, v, id);
            }
        }
        Ok(out)
    }

    /// Out-edges of every vertex in `vids`, grouped by vertex in the given order.
    pub fn out_edges(&self, vids: &[VertexId]) -> Result<EdgeArray> {
        let csr = self.out_csr();
        let mut out = EdgeArray::default();
        for &v in vids {
            self.check_vertex(v)?;
            let (dsts, ids) = csr.row(v);
            for (&d, &id) in dsts.iter().zip(ids) {
                out.push(v, d, id);
            }
        }
        Ok(out)
    }

    /// Number of in-edges of `v`.
    pub fn in_degree(&self, v: VertexId) -> Result<u64> {
        self.check_vertex(v)?;
        Ok(self.in_csr().degree(v))
    }

    /// Number of out-edges of `v`.
    pub fn out_degree(&self, v: VertexId) -> Result<u64> {
        self.check_vertex(v)?;
        Ok(self.out_csr().degree(v))
    }

    /// In-degree of each vertex in `vids`.
    pub fn in_degrees(&self, vids: &[VertexId]) -> Result<Vec<u64>> {
        vids.iter().map(|&v| self.in_degree(v)).collect()
    }

    /// Out-degree of each vertex in `vids`.
    pub fn out_degrees(&self, vids: &[VertexId]) -> Result<Vec<u64>> {
        vids.iter().map(|&v| self.out_degree(v)).collect()
    }

    /// Every edge, in source-major order or ordered by edge id.
    pub fn edges(&self, by_id: bool) -> EdgeArray {
        let (src, dst, id) = self.out_csr().to_coo();
        if !by_id {
            return EdgeArray { src, dst, id };
        }
        let mut order: Vec<usize> = (0..id.len()).collect();
        order.sort_by_key(|&i| id[i]);
        let mut out = EdgeArray::default();
        for i in order {
            out.push(src[i], dst[i], id[i]);
        }
        out
    }

    /// Induced subgraph on `vids`; local vertex `i` is `vids[i]`.
    pub fn vertex_subgraph(&self, vids: &[VertexId]) -> Result<Subgraph> {
        let (csr, induced_edges) = self.primary.vertex_subgraph(vids)?;
        let graph = ImmutableGraph::from_parts(csr, self.primary_dir, Some(self.multigraph));
        Ok(Subgraph {
            graph,
            induced_vertices: vids.to_vec(),
            induced_edges,
        })
    }

    /// Subgraph made of the edges `eids`; local edge `i` is `eids[i]`.
    ///
    /// With `preserve_nodes` every parent vertex is kept under its own id,
    /// otherwise only edge endpoints are kept, numbered in discovery order.
    pub fn edge_subgraph(&self, eids: &[EdgeId], preserve_nodes: bool) -> Result<Subgraph> {
        let all = self.edges(false);
        let mut by_id: FxHashMap<EdgeId, (VertexId, VertexId)> = FxHashMap::default();
        for i in 0..all.len() {
            by_id.insert(all.id[i], (all.src[i], all.dst[i]));
        }
        let mut seen = FxHashSet::default();
        let mut src = Vec::with_capacity(eids.len());
        let mut dst = Vec::with_capacity(eids.len());
        for &eid in eids {
            if !seen.insert(eid) {
                return Err(StrataError::Precondition(format!(
                    "edge {eid} listed twice in subgraph selection"
                )));
            }
            let &(s, d) = by_id
                .get(&eid)
                .ok_or_else(|| StrataError::Query(format!("edge {eid} does not exist")))?;
            src.push(s);
            dst.push(d);
        }

        let induced_vertices: Vec<VertexId> = if preserve_nodes {
            (0..self.num_vertices()).collect()
        } else {
            let mut local: FxHashMap<VertexId, VertexId> = FxHashMap::default();
            let mut order = Vec::new();
            for v in src.iter_mut().chain(dst.iter_mut()) {
                let next = local.len() as VertexId;
                let id = *local.entry(*v).or_insert_with(|| {
                    order.push(*v);
                    next
                });
                *v = id;
            }
            order
        };
        let graph = ImmutableGraph::from_coo(
            induced_vertices.len() as u64,
            &src,
            &dst,
            Some(self.multigraph),
        )?;
        Ok(Subgraph {
            graph,
            induced_vertices,
            induced_edges: eids.to_vec(),
        })
    }

    /// Adjacency with rows = destinations, or rows = sources when `transpose`.
    pub fn adjacency(&self, transpose: bool, format: AdjFormat) -> Adjacency {
        let csr = if transpose {
            self.out_csr()
        } else {
            self.in_csr()
        };
        match format {
            AdjFormat::Csr => Adjacency::Csr(Arc::clone(csr)),
            AdjFormat::Coo => {
                let (row, col, edge_ids) = csr.to_coo();
                Adjacency::Coo { row, col, edge_ids }
            }
        }
    }

    /// Same edge set with every edge flipped. Cached views are reused.
    pub fn reverse(&self) -> ImmutableGraph {
        let derived = OnceLock::new();
        if let Some(d) = self.derived.get() {
            let _ = derived.set(Arc::clone(d));
        }
        ImmutableGraph {
            primary: Arc::clone(&self.primary),
            primary_dir: self.primary_dir.flip(),
            derived,
            multigraph: self.multigraph,
            num_bits: self.num_bits,
        }
    }
}

fn broadcast_len(a: usize, b: usize) -> Result<usize> {
    match (a, b) {
        (1, n) | (n, 1) => Ok(n),
        (x, y) if x == y => Ok(x),
        (x, y) => Err(StrataError::Query(format!(
            "cannot pair {x} sources with {y} destinations"
        ))),
    }
}
