//! Structure-level transforms: reversal, line graph, simple-graph and
//! bidirected conversions.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::storage::{Csr, EdgeDir, Graph, GraphQuery, ImmutableGraph, MutableGraph};
use crate::types::{Result, VertexId};

/// Flips every edge of an immutable graph.
pub fn reverse(g: &Graph) -> Result<ImmutableGraph> {
    Ok(g.require_immutable("reverse")?.reverse())
}

/// Builds the line graph of a mutable graph.
///
/// Vertex `i` of the result is edge `i` of `g`. Edge `i = (u, v)` connects to
/// every out-edge `j = (v, w)` of `v`, except the ones leading straight back
/// to `u` when `backtracking` is false.
pub fn line_graph(g: &Graph, backtracking: bool) -> Result<MutableGraph> {
    let mg = g.require_mutable("line_graph")?;
    let mut lg = MutableGraph::new(false);
    lg.add_vertices(mg.num_edges());
    let edges = mg.edges();
    for i in 0..edges.len() {
        let (u, v) = (edges.src[i], edges.dst[i]);
        let succ = mg.successors(v)?;
        let ids = mg.out_edge_ids(v)?;
        for (&w, &j) in succ.iter().zip(ids) {
            if backtracking || w != u {
                lg.add_edge(edges.id[i], j)?;
            }
        }
    }
    debug!(
        vertices = lg.num_vertices(),
        edges = lg.num_edges(),
        backtracking,
        "graph.op.line_graph"
    );
    Ok(lg)
}

/// Removes parallel edges, keeping the first occurrence of every
/// `(src, dst)` pair. Edges are renumbered `0..E'` in source-major order.
pub fn to_simple_graph<G: GraphQuery + ?Sized>(g: &G) -> Result<ImmutableGraph> {
    let n = g.num_vertices();
    let mut indptr = Vec::with_capacity(n as usize + 1);
    indptr.push(0u64);
    let mut indices = Vec::new();
    let mut seen = FxHashSet::default();
    for src in 0..n {
        seen.clear();
        for dst in g.succ_vec(src)? {
            if seen.insert(dst) {
                indices.push(dst);
            }
        }
        indptr.push(indices.len() as u64);
    }
    let edge_ids = (0..indices.len() as u64).collect();
    let csr = Csr::new(indptr, indices, edge_ids)?;
    Ok(ImmutableGraph::from_parts(csr, EdgeDir::Out, Some(false)))
}

/// Counts `u -> v` edges for every ordered pair that has at least one.
fn pair_counts<G: GraphQuery + ?Sized>(g: &G) -> Result<FxHashMap<(VertexId, VertexId), u64>> {
    let mut counts = FxHashMap::default();
    for u in 0..g.num_vertices() {
        for v in g.succ_vec(u)? {
            *counts.entry((u, v)).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

fn bidirected_count(
    counts: &FxHashMap<(VertexId, VertexId), u64>,
    u: VertexId,
    v: VertexId,
) -> u64 {
    let fwd = counts.get(&(u, v)).copied().unwrap_or(0);
    let bwd = counts.get(&(v, u)).copied().unwrap_or(0);
    fwd.max(bwd)
}

/// Mutable bidirected copy of `g`.
///
/// Every unordered pair `{u, v}` with `k = max(count(u->v), count(v->u)) > 0`
/// yields `k` edges `u -> v` followed by `k` edges `v -> u`; a self-loop pair
/// yields its `k` loops once. Pairs are emitted in ascending `(u, v)` order.
pub fn to_bidirected_mutable_graph<G: GraphQuery + ?Sized>(g: &G) -> Result<MutableGraph> {
    let counts = pair_counts(g)?;
    let mut pairs: Vec<(VertexId, VertexId)> = counts
        .keys()
        .map(|&(u, v)| if u <= v { (u, v) } else { (v, u) })
        .collect();
    pairs.sort_unstable();
    pairs.dedup();

    let mut bg = MutableGraph::new(g.is_multigraph());
    bg.add_vertices(g.num_vertices());
    for (u, v) in pairs {
        let k = bidirected_count(&counts, u, v);
        for _ in 0..k {
            bg.add_edge(u, v)?;
        }
        if u != v {
            for _ in 0..k {
                bg.add_edge(v, u)?;
            }
        }
    }
    debug!(
        vertices = bg.num_vertices(),
        edges = bg.num_edges(),
        "graph.op.bidirected_mutable"
    );
    Ok(bg)
}

/// Immutable bidirected copy of `g`.
///
/// For each vertex `u`, its distinct neighbors are collected predecessors
/// first, then successors, each in adjacency order; every neighbor `v`
/// contributes `max(count(u->v), count(v->u))` edges `v -> u`.
pub fn to_bidirected_immutable_graph<G: GraphQuery + ?Sized>(g: &G) -> Result<ImmutableGraph> {
    let counts = pair_counts(g)?;
    let mut srcs = Vec::new();
    let mut dsts = Vec::new();
    let mut seen = FxHashSet::default();
    for u in 0..g.num_vertices() {
        seen.clear();
        let mut nbrs = Vec::new();
        for v in g.pred_vec(u)?.into_iter().chain(g.succ_vec(u)?) {
            if seen.insert(v) {
                nbrs.push(v);
            }
        }
        for v in nbrs {
            let k = bidirected_count(&counts, u, v);
            for _ in 0..k {
                srcs.push(v);
                dsts.push(u);
            }
        }
    }
    debug!(
        vertices = g.num_vertices(),
        edges = srcs.len(),
        "graph.op.bidirected_immutable"
    );
    ImmutableGraph::from_coo(g.num_vertices(), &srcs, &dsts, Some(g.is_multigraph()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrataError;

    #[test]
    fn reverse_requires_immutable_input() {
        let g: Graph = MutableGraph::from_coo(2, &[0], &[1], false).unwrap().into();
        let err = reverse(&g).unwrap_err();
        assert!(matches!(err, StrataError::Precondition(_)));
    }

    #[test]
    fn line_graph_of_triangle() {
        // 0 -> 1 (e0), 1 -> 2 (e1), 2 -> 0 (e2), 1 -> 0 (e3)
        let g: Graph = MutableGraph::from_coo(3, &[0, 1, 2, 1], &[1, 2, 0, 0], false)
            .unwrap()
            .into();
        let lg = line_graph(&g, false).unwrap();
        assert_eq!(lg.num_vertices(), 4);
        assert_eq!(lg.successors(0).unwrap(), &[1]);
        assert_eq!(lg.successors(3).unwrap(), &[] as &[VertexId]);
        let with_back = line_graph(&g, true).unwrap();
        assert_eq!(with_back.successors(0).unwrap(), &[1, 3]);
        assert_eq!(with_back.successors(3).unwrap(), &[0]);
    }

    #[test]
    fn simple_graph_drops_parallel_edges() {
        let g = ImmutableGraph::from_coo(3, &[0, 0, 0, 2], &[1, 1, 2, 2], None).unwrap();
        let s = to_simple_graph(&g).unwrap();
        assert_eq!(s.num_edges(), 3);
        assert!(!s.is_multigraph());
        assert_eq!(s.edge_id(0, 1).unwrap(), vec![0]);
        assert_eq!(s.edge_id(2, 2).unwrap(), vec![2]);
    }

    #[test]
    fn bidirected_takes_max_pair_count() {
        // two 0 -> 1 edges, one 1 -> 0 edge, one loop on 2
        let g = ImmutableGraph::from_coo(3, &[0, 0, 1, 2], &[1, 1, 0, 2], None).unwrap();
        let m = to_bidirected_mutable_graph(&g).unwrap();
        assert_eq!(m.num_edges(), 5);
        assert_eq!(m.successors(0).unwrap(), &[1, 1]);
        assert_eq!(m.successors(1).unwrap(), &[0, 0]);
        assert_eq!(m.successors(2).unwrap(), &[2]);

        let i = to_bidirected_immutable_graph(&g).unwrap();
        assert_eq!(i.num_edges(), 5);
        assert_eq!(i.edge_id(0, 1).unwrap().len(), 2);
        assert_eq!(i.edge_id(1, 0).unwrap().len(), 2);
        assert_eq!(i.edge_id(2, 2).unwrap().len(), 1);
    }
}
