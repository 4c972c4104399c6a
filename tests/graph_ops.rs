#![allow(clippy::uninlined_format_args)]

use strata::ops::{
    disjoint_partition_by_num, disjoint_partition_by_sizes, disjoint_union, expand_ids,
    get_subgraph_with_halo, line_graph, map_parent_id_to_subgraph_id, partition_with_halo,
    reverse, to_bidirected_immutable_graph, to_bidirected_mutable_graph, to_simple_graph,
};
use strata::storage::{Graph, GraphQuery, ImmutableGraph, MutableGraph};
use strata::{ErrorKind, MISSING_ID};

/// Graphs with (2, 3, 1) vertices and (1, 2, 0) edges.
fn setup_union_inputs(immutable: bool) -> Vec<Graph> {
    let coo: [(u64, &[u64], &[u64]); 3] = [(2, &[0], &[1]), (3, &[0, 1], &[1, 2]), (1, &[], &[])];
    coo.iter()
        .map(|&(n, src, dst)| {
            if immutable {
                Graph::from(ImmutableGraph::from_coo(n, src, dst, None).unwrap())
            } else {
                Graph::from(MutableGraph::from_coo(n, src, dst, false).unwrap())
            }
        })
        .collect()
}

fn setup_chain(length: u64) -> ImmutableGraph {
    let src: Vec<u64> = (0..length - 1).collect();
    let dst: Vec<u64> = (1..length).collect();
    ImmutableGraph::from_coo(length, &src, &dst, None).unwrap()
}

/// 0->1 (e0), 0->2 (e1), 1->2 (e2), 2->3 (e3), 0->1 (e4)
fn setup_multigraph() -> ImmutableGraph {
    ImmutableGraph::from_coo(4, &[0, 0, 1, 2, 0], &[1, 2, 2, 3, 1], None).unwrap()
}

#[test]
fn union_offsets_vertices_and_edges() {
    for immutable in [true, false] {
        let inputs = setup_union_inputs(immutable);
        let union = disjoint_union(&inputs).unwrap();
        assert_eq!(union.num_vertices(), 6);
        assert_eq!(union.num_edges(), 3);
        assert_eq!(union.succ_vec(0).unwrap(), vec![1]);
        assert_eq!(union.succ_vec(2).unwrap(), vec![3]);
        assert_eq!(union.succ_vec(3).unwrap(), vec![4]);
        assert!(union.succ_vec(5).unwrap().is_empty());
        assert_eq!(union.is_readonly(), immutable);

        let frozen = union.to_immutable().unwrap();
        assert_eq!(frozen.edge_id(0, 1).unwrap(), vec![0]);
        assert_eq!(frozen.edge_id(2, 3).unwrap(), vec![1]);
        assert_eq!(frozen.edge_id(3, 4).unwrap(), vec![2]);
    }
}

#[test]
fn partition_by_sizes_inverts_union() {
    for immutable in [true, false] {
        let inputs = setup_union_inputs(immutable);
        let union = disjoint_union(&inputs).unwrap();
        let parts = disjoint_partition_by_sizes(&union, &[2, 3, 1]).unwrap();
        assert_eq!(parts.len(), 3);
        for (part, input) in parts.iter().zip(&inputs) {
            assert_eq!(part.variant(), input.variant());
            assert_eq!(part.num_vertices(), input.num_vertices());
            assert_eq!(part.num_edges(), input.num_edges());
            for v in 0..part.num_vertices() {
                assert_eq!(part.succ_vec(v).unwrap(), input.succ_vec(v).unwrap());
            }
        }
        let middle = parts[1].to_immutable().unwrap();
        assert_eq!(middle.edge_id(1, 2).unwrap(), vec![1]);
    }
}

#[test]
fn partition_rejects_bad_sizes_and_crossing_edges() {
    let union = disjoint_union(&setup_union_inputs(true)).unwrap();
    let err = disjoint_partition_by_sizes(&union, &[2, 2]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);

    let err = disjoint_partition_by_num(&union, 4).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);

    // Sizes [2, 2, 2] split the 3-vertex component.
    let err = disjoint_partition_by_num(&union, 3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[test]
fn partition_by_num_splits_evenly() {
    let inputs: Vec<Graph> = (0..3)
        .map(|_| Graph::from(ImmutableGraph::from_coo(2, &[1], &[0], None).unwrap()))
        .collect();
    let union = disjoint_union(&inputs).unwrap();
    let parts = disjoint_partition_by_num(&union, 3).unwrap();
    assert_eq!(parts.len(), 3);
    for part in &parts {
        assert_eq!(part.num_vertices(), 2);
        assert_eq!(part.pred_vec(0).unwrap(), vec![1]);
    }
}

#[test]
fn union_rejects_empty_and_mixed_inputs() {
    assert_eq!(disjoint_union(&[]).unwrap_err().kind(), ErrorKind::Precondition);
    let mut mixed = setup_union_inputs(true);
    mixed.extend(setup_union_inputs(false));
    assert_eq!(disjoint_union(&mixed).unwrap_err().kind(), ErrorKind::Precondition);
}

#[test]
fn line_graph_with_and_without_backtracking() {
    let g: Graph = MutableGraph::from_coo(3, &[0, 1, 2, 1], &[1, 2, 0, 0], false)
        .unwrap()
        .into();
    let lg = line_graph(&g, true).unwrap();
    assert_eq!(lg.num_vertices(), 4);
    assert_eq!(lg.num_edges(), 5);
    assert_eq!(lg.successors(0).unwrap(), &[1, 3]);

    let lg = line_graph(&g, false).unwrap();
    assert_eq!(lg.num_edges(), 3);
    assert_eq!(lg.successors(0).unwrap(), &[1]);
    assert!(lg.successors(3).unwrap().is_empty());

    let frozen: Graph = setup_multigraph().into();
    assert_eq!(line_graph(&frozen, true).unwrap_err().kind(), ErrorKind::Precondition);
}

#[test]
fn simple_graph_drops_parallel_edges() {
    let g = setup_multigraph();
    let simple = to_simple_graph(&g).unwrap();
    assert!(!simple.is_multigraph());
    assert_eq!(simple.num_edges(), 4);
    assert_eq!(simple.successors(0, 1).unwrap(), vec![1, 2]);
    assert_eq!(simple.edge_id(2, 3).unwrap(), vec![3]);

    let again = to_simple_graph(&simple).unwrap();
    assert_eq!(again.edges(true), simple.edges(true));
}

#[test]
fn bidirected_mutable_pairs_edges() {
    let g = setup_multigraph();
    let bg = to_bidirected_mutable_graph(&g).unwrap();
    assert_eq!(bg.num_edges(), 10);
    assert!(bg.is_multigraph());
    assert_eq!(bg.find_edge(0).unwrap(), (0, 1));
    assert_eq!(bg.find_edge(2).unwrap(), (1, 0));
    assert_eq!(bg.successors(3).unwrap(), &[2]);

    let looped = ImmutableGraph::from_coo(1, &[0], &[0], None).unwrap();
    assert_eq!(to_bidirected_mutable_graph(&looped).unwrap().num_edges(), 1);
}

#[test]
fn bidirected_immutable_is_symmetric() {
    let g = setup_multigraph();
    let bg = to_bidirected_immutable_graph(&g).unwrap();
    assert_eq!(bg.num_edges(), 10);
    assert_eq!(bg.in_degrees(&[0, 1, 2, 3]).unwrap(), vec![3, 3, 3, 1]);
    for u in 0..4 {
        for v in 0..4 {
            assert_eq!(
                bg.edge_id(u, v).unwrap().len(),
                bg.edge_id(v, u).unwrap().len(),
                "pair ({}, {})",
                u,
                v
            );
        }
    }
    assert_eq!(bg.edge_id(0, 1).unwrap().len(), 2);
}

#[test]
fn reverse_requires_immutable_graph() {
    let g: Graph = setup_chain(3).into();
    let r = reverse(&g).unwrap();
    assert_eq!(r.successors(2, 1).unwrap(), vec![1]);
}

#[test]
fn halo_collects_in_neighbors_per_hop() {
    let g = setup_chain(5);

    let halo = get_subgraph_with_halo(&g, &[2, 3], 1).unwrap();
    assert_eq!(halo.subgraph.induced_vertices, vec![1, 2, 3]);
    assert_eq!(halo.inner_nodes, vec![false, true, true]);
    assert_eq!(halo.subgraph.induced_edges, vec![1, 2]);
    assert_eq!(halo.inner_edges, vec![false, true]);
    assert_eq!(halo.num_halo_nodes(), 1);
    assert!(halo.subgraph.graph.has_edge_between(0, 1).unwrap());

    let halo = get_subgraph_with_halo(&g, &[2, 3], 2).unwrap();
    assert_eq!(halo.subgraph.induced_vertices, vec![0, 1, 2, 3]);
    assert_eq!(halo.subgraph.induced_edges, vec![1, 2, 0]);
    assert_eq!(halo.inner_edges, vec![false, true, false]);
}

#[test]
fn halo_with_zero_hops_is_induced_subgraph() {
    let g = setup_chain(5);
    let halo = get_subgraph_with_halo(&g, &[3, 2, 3], 0).unwrap();
    assert_eq!(halo.subgraph.induced_vertices, vec![2, 3]);
    assert_eq!(halo.subgraph.induced_edges, vec![2]);
    assert_eq!(halo.inner_nodes, vec![true, true]);
    assert_eq!(halo.inner_edges, vec![true]);
}

#[test]
fn partition_with_halo_indexes_by_part() {
    let g = setup_chain(5);
    let parts = partition_with_halo(&g, &[0, 0, 1, 1, 1], 1).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].subgraph.induced_vertices, vec![0, 1]);
    assert_eq!(parts[0].num_halo_nodes(), 0);
    assert_eq!(parts[1].subgraph.induced_vertices, vec![1, 2, 3, 4]);
    assert_eq!(parts[1].inner_nodes, vec![false, true, true, true]);

    let sparse = partition_with_halo(&g, &[2; 5], 1).unwrap();
    assert_eq!(sparse.len(), 3);
    assert_eq!(sparse[0].subgraph.graph.num_vertices(), 0);
    assert_eq!(sparse[2].num_inner_nodes(), 5);

    let err = partition_with_halo(&g, &[0, 0], 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    let err = partition_with_halo(&g, &[0, 0, 0, 0, 7], 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[test]
fn parent_ids_map_to_local_positions() {
    assert_eq!(map_parent_id_to_subgraph_id(&[5, 3, 9], &[9, 4, 5]), vec![2, MISSING_ID, 0]);
    assert_eq!(map_parent_id_to_subgraph_id(&[1, 3, 5, 7], &[7, 2]), vec![3, MISSING_ID]);
    assert_eq!(map_parent_id_to_subgraph_id(&[2, 2, 4], &[2]), vec![0]);
    assert_eq!(map_parent_id_to_subgraph_id(&[4, 2, 2], &[2]), vec![1]);
    assert!(map_parent_id_to_subgraph_id(&[1, 2], &[]).is_empty());
}

#[test]
fn expand_ids_repeats_by_offsets() {
    assert_eq!(expand_ids(&[7, 8, 9], &[0, 2, 2, 3]).unwrap(), vec![7, 7, 9]);
    assert!(expand_ids(&[], &[0]).unwrap().is_empty());
    assert_eq!(expand_ids(&[7], &[0]).unwrap_err().kind(), ErrorKind::Precondition);
    assert_eq!(expand_ids(&[7, 8], &[0, 3, 1]).unwrap_err().kind(), ErrorKind::Precondition);
    assert_eq!(expand_ids(&[7], &[1, 2]).unwrap_err().kind(), ErrorKind::Precondition);
}
