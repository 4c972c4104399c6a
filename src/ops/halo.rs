//! Partition subgraphs extended with a halo of in-neighbors.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::storage::{GraphQuery, HaloSubgraph, ImmutableGraph, Subgraph};
use crate::types::{EdgeId, Result, StrataError, VertexId};

/// Extracts the subgraph around `seeds`, walking in-edges for `num_hops`
/// rounds.
///
/// The first round collects every in-edge of the seeds; each later round
/// collects the in-edges of the vertices first reached in the previous
/// round. An edge is inner when it was found in the first round and its
/// source is a seed. Local vertex ids ascend with parent ids.
///
/// With `num_hops == 0` the result is the induced subgraph on the seeds.
pub fn get_subgraph_with_halo<G: GraphQuery + ?Sized>(
    g: &G,
    seeds: &[VertexId],
    num_hops: usize,
) -> Result<HaloSubgraph> {
    let mut all_nodes: FxHashMap<VertexId, bool> = FxHashMap::default();
    let mut frontier = Vec::with_capacity(seeds.len());
    for &v in seeds {
        if all_nodes.insert(v, true).is_none() {
            frontier.push(v);
        }
    }

    let mut edge_src = Vec::new();
    let mut edge_dst = Vec::new();
    let mut edge_eid: Vec<EdgeId> = Vec::new();
    let mut inner_edges = Vec::new();

    let first = g.in_edges(&frontier)?;
    let mut next = Vec::new();
    for i in 0..first.len() {
        let src = first.src[i];
        let inner = all_nodes.get(&src).copied().unwrap_or(false);
        if num_hops == 0 && !inner {
            continue;
        }
        edge_src.push(src);
        edge_dst.push(first.dst[i]);
        edge_eid.push(first.id[i]);
        inner_edges.push(inner);
        if !all_nodes.contains_key(&src) {
            all_nodes.insert(src, false);
            next.push(src);
        }
    }

    for _ in 1..num_hops {
        frontier = std::mem::take(&mut next);
        if frontier.is_empty() {
            break;
        }
        let hop = g.in_edges(&frontier)?;
        for i in 0..hop.len() {
            let src = hop.src[i];
            edge_src.push(src);
            edge_dst.push(hop.dst[i]);
            edge_eid.push(hop.id[i]);
            inner_edges.push(false);
            if !all_nodes.contains_key(&src) {
                all_nodes.insert(src, false);
                next.push(src);
            }
        }
    }

    let mut old_ids: Vec<VertexId> = all_nodes.keys().copied().collect();
    old_ids.sort_unstable();
    let old_to_new: FxHashMap<VertexId, VertexId> = old_ids
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, i as VertexId))
        .collect();
    let relabel = |ids: &[VertexId]| -> Vec<VertexId> { ids.iter().map(|v| old_to_new[v]).collect() };
    let new_src = relabel(&edge_src);
    let new_dst = relabel(&edge_dst);
    let inner_nodes = old_ids.iter().map(|v| all_nodes[v]).collect();

    let graph = ImmutableGraph::from_coo(
        old_ids.len() as u64,
        &new_src,
        &new_dst,
        Some(g.is_multigraph()),
    )?;
    debug!(
        seeds = seeds.len(),
        vertices = old_ids.len(),
        edges = edge_eid.len(),
        num_hops,
        "graph.halo.extract"
    );
    Ok(HaloSubgraph {
        subgraph: Subgraph {
            graph,
            induced_vertices: old_ids,
            induced_edges: edge_eid,
        },
        inner_nodes,
        inner_edges,
    })
}

/// Builds one halo subgraph per partition id.
///
/// `node_parts[v]` is the partition of vertex `v`. The result is indexed by
/// partition id `0..=max`; ids that own no vertex get an empty subgraph.
/// Partition ids must be below the vertex count.
/// The in-edge CSR is built once up front, then partitions are extracted in
/// parallel.
pub fn partition_with_halo(
    g: &ImmutableGraph,
    node_parts: &[u64],
    num_hops: usize,
) -> Result<Vec<HaloSubgraph>> {
    if node_parts.len() as u64 != g.num_vertices() {
        return Err(StrataError::Precondition(format!(
            "{} partition assignments for {} vertices",
            node_parts.len(),
            g.num_vertices()
        )));
    }
    let Some(&max_part) = node_parts.iter().max() else {
        return Ok(Vec::new());
    };
    let num_parts = usize::try_from(max_part)
        .ok()
        .and_then(|m| m.checked_add(1))
        .filter(|&n| n <= node_parts.len())
        .ok_or_else(|| {
            StrataError::Precondition(format!(
                "partition id {max_part} exceeds the vertex count {}",
                node_parts.len()
            ))
        })?;
    let mut members: Vec<Vec<VertexId>> = vec![Vec::new(); num_parts];
    for (v, &part) in node_parts.iter().enumerate() {
        members[part as usize].push(v as VertexId);
    }

    g.in_csr();
    let subgraphs = members
        .par_iter()
        .map(|nodes| get_subgraph_with_halo(g, nodes, num_hops))
        .collect::<Result<Vec<_>>>()?;

    let halo: usize = subgraphs.iter().map(HaloSubgraph::num_halo_nodes).sum();
    info!(
        parts = num_parts,
        num_hops,
        halo_nodes = halo,
        "graph.halo.partition"
    );
    Ok(subgraphs)
}
