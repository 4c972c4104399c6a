//! Disjoint union and its inverse, contiguous range partitioning.
//!
//! Immutable graphs are combined and split through their in-edge CSR, so a
//! union followed by a partition with the same sizes reproduces each input
//! edge for edge.

use tracing::debug;

use crate::storage::{Csr, EdgeDir, Graph, GraphQuery, GraphVariant, ImmutableGraph, MutableGraph};
use crate::types::{Result, StrataError};

/// Concatenates `graphs` into one graph of the same variant.
///
/// Vertices of input `k` are shifted by the vertex count of inputs `0..k`,
/// and edge ids likewise by their edge count.
pub fn disjoint_union(graphs: &[Graph]) -> Result<Graph> {
    let first = graphs
        .first()
        .ok_or_else(|| StrataError::Precondition("disjoint union of an empty graph list".into()))?;
    let variant = first.variant();
    if let Some(pos) = graphs.iter().position(|g| g.variant() != variant) {
        return Err(StrataError::Precondition(format!(
            "disjoint union mixes variants: input 0 is {variant}, input {pos} is {}",
            graphs[pos].variant()
        )));
    }
    let union = match variant {
        GraphVariant::Mutable => Graph::Mutable(union_mutable(graphs)?),
        GraphVariant::Immutable => Graph::Immutable(union_immutable(graphs)?),
    };
    debug!(
        inputs = graphs.len(),
        variant = %variant,
        "graph.op.disjoint_union"
    );
    Ok(union)
}

fn union_mutable(graphs: &[Graph]) -> Result<MutableGraph> {
    let parts = graphs
        .iter()
        .map(|g| g.require_mutable("disjoint_union"))
        .collect::<Result<Vec<_>>>()?;
    let mut out = MutableGraph::new(parts.iter().any(|g| g.is_multigraph()));
    for g in parts {
        let offset = out.num_vertices();
        out.add_vertices(g.num_vertices());
        let edges = g.edges();
        for (&s, &d) in edges.src.iter().zip(&edges.dst) {
            out.add_edge(s + offset, d + offset)?;
        }
    }
    Ok(out)
}

fn union_immutable(graphs: &[Graph]) -> Result<ImmutableGraph> {
    let parts = graphs
        .iter()
        .map(|g| g.require_immutable("disjoint_union"))
        .collect::<Result<Vec<_>>>()?;
    let num_vertices: u64 = parts.iter().map(|g| g.num_vertices()).sum();
    let num_edges: u64 = parts.iter().map(|g| g.num_edges()).sum();
    let mut indptr = Vec::with_capacity(num_vertices as usize + 1);
    let mut indices = Vec::with_capacity(num_edges as usize);
    let mut edge_ids = Vec::with_capacity(num_edges as usize);
    indptr.push(0u64);
    let (mut vertex_offset, mut edge_offset) = (0u64, 0u64);
    for g in &parts {
        let csr = g.in_csr();
        indptr.extend(csr.indptr()[1..].iter().map(|&p| p + edge_offset));
        indices.extend(csr.indices().iter().map(|&c| c + vertex_offset));
        edge_ids.extend(csr.edge_ids().iter().map(|&id| id + edge_offset));
        vertex_offset += csr.num_vertices();
        edge_offset += csr.num_edges();
    }
    let multigraph = parts.iter().any(|g| g.is_multigraph());
    ImmutableGraph::from_csr(indptr, indices, edge_ids, EdgeDir::In, Some(multigraph))
}

/// Splits `g` into `num` equally sized contiguous vertex ranges.
pub fn disjoint_partition_by_num(g: &Graph, num: u64) -> Result<Vec<Graph>> {
    let n = g.num_vertices();
    if num == 0 || n % num != 0 {
        return Err(StrataError::Precondition(format!(
            "{num} partitions do not evenly divide {n} vertices"
        )));
    }
    let sizes = vec![n / num; num as usize];
    disjoint_partition_by_sizes(g, &sizes)
}

/// Splits `g` into contiguous vertex ranges of the given sizes, relabelling
/// each range from 0.
///
/// Every edge must stay inside its range and the edge ids of range `k` must
/// be the block that follows the edges of ranges `0..k`; that is exactly the
/// shape [`disjoint_union`] produces.
pub fn disjoint_partition_by_sizes(g: &Graph, sizes: &[u64]) -> Result<Vec<Graph>> {
    let n = g.num_vertices();
    let total: u64 = sizes.iter().sum();
    if total != n {
        return Err(StrataError::Precondition(format!(
            "partition sizes sum to {total} but the graph has {n} vertices"
        )));
    }
    let parts = match g {
        Graph::Mutable(m) => partition_mutable(m, sizes)?
            .into_iter()
            .map(Graph::Mutable)
            .collect(),
        Graph::Immutable(i) => partition_immutable(i, sizes)?
            .into_iter()
            .map(Graph::Immutable)
            .collect(),
    };
    debug!(parts = sizes.len(), vertices = n, "graph.op.partition_by_sizes");
    Ok(parts)
}

fn partition_immutable(g: &ImmutableGraph, sizes: &[u64]) -> Result<Vec<ImmutableGraph>> {
    let csr = g.in_csr();
    let (indptr, indices, edge_ids) = (csr.indptr(), csr.indices(), csr.edge_ids());
    let mut out = Vec::with_capacity(sizes.len());
    let (mut start, mut edge_offset) = (0u64, 0u64);
    for (part, &size) in sizes.iter().enumerate() {
        let end = start + size;
        let lo = indptr[start as usize];
        let hi = indptr[end as usize];
        let part_edges = hi - lo;
        let part_indptr: Vec<u64> = indptr[start as usize..=end as usize]
            .iter()
            .map(|&p| p - lo)
            .collect();
        let mut part_indices = Vec::with_capacity(part_edges as usize);
        let mut part_ids = Vec::with_capacity(part_edges as usize);
        for pos in lo as usize..hi as usize {
            let (src, id) = (indices[pos], edge_ids[pos]);
            if !(start..end).contains(&src) {
                return Err(crossing_edge(part, id));
            }
            if !(edge_offset..edge_offset + part_edges).contains(&id) {
                return Err(StrataError::Precondition(format!(
                    "edge id {id} of partition {part} lies outside its block \
                     {edge_offset}..{}",
                    edge_offset + part_edges
                )));
            }
            part_indices.push(src - start);
            part_ids.push(id - edge_offset);
        }
        let csr = Csr::new(part_indptr, part_indices, part_ids)?;
        out.push(ImmutableGraph::from_parts(csr, EdgeDir::In, None));
        start = end;
        edge_offset += part_edges;
    }
    Ok(out)
}

fn partition_mutable(g: &MutableGraph, sizes: &[u64]) -> Result<Vec<MutableGraph>> {
    let edges = g.edges();
    let mut out = Vec::with_capacity(sizes.len());
    let (mut start, mut edge_offset) = (0u64, 0usize);
    for (part, &size) in sizes.iter().enumerate() {
        let end = start + size;
        let mut part_edges = 0usize;
        for v in start..end {
            part_edges += g.successors(v)?.len();
        }
        let mut mg = MutableGraph::new(g.is_multigraph());
        mg.add_vertices(size);
        for i in edge_offset..edge_offset + part_edges {
            let (s, d) = (edges.src[i], edges.dst[i]);
            if !(start..end).contains(&s) || !(start..end).contains(&d) {
                return Err(crossing_edge(part, edges.id[i]));
            }
            mg.add_edge(s - start, d - start)?;
        }
        out.push(mg);
        start = end;
        edge_offset += part_edges;
    }
    Ok(out)
}

fn crossing_edge(part: usize, id: u64) -> StrataError {
    StrataError::Precondition(format!(
        "edge {id} crosses the boundary of partition {part}"
    ))
}
