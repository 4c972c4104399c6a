use proptest::prelude::*;
use strata::net::{ArrayMeta, KvStoreMsg, MessageKind, Tensor};
use strata::ops::{
    disjoint_partition_by_sizes, disjoint_union, map_parent_id_to_subgraph_id, to_simple_graph,
};
use strata::storage::{Graph, ImmutableGraph};
use strata::MISSING_ID;

fn arb_coo() -> impl Strategy<Value = (u64, Vec<(u64, u64)>)> {
    (1u64..16).prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..48)))
}

fn build((n, edges): &(u64, Vec<(u64, u64)>)) -> ImmutableGraph {
    let src: Vec<u64> = edges.iter().map(|e| e.0).collect();
    let dst: Vec<u64> = edges.iter().map(|e| e.1).collect();
    ImmutableGraph::from_coo(*n, &src, &dst, None).unwrap()
}

fn arb_kind() -> impl Strategy<Value = MessageKind> {
    prop::sample::select(MessageKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_csr_neighbors_match_coo_multiset(coo in arb_coo()) {
        let g = build(&coo);
        let (n, edges) = &coo;
        for v in 0..*n {
            let mut out = g.successors(v, 1).unwrap();
            let mut expected: Vec<u64> = edges.iter().filter(|e| e.0 == v).map(|e| e.1).collect();
            out.sort_unstable();
            expected.sort_unstable();
            prop_assert_eq!(out, expected);

            let mut inc = g.predecessors(v, 1).unwrap();
            let mut expected: Vec<u64> = edges.iter().filter(|e| e.1 == v).map(|e| e.0).collect();
            inc.sort_unstable();
            expected.sort_unstable();
            prop_assert_eq!(inc, expected);
        }
    }

    #[test]
    fn prop_partition_inverts_union(coos in prop::collection::vec(arb_coo(), 1..4)) {
        let inputs: Vec<ImmutableGraph> = coos.iter().map(build).collect();
        let graphs: Vec<Graph> = inputs.iter().cloned().map(Graph::from).collect();
        let sizes: Vec<u64> = inputs.iter().map(|g| g.num_vertices()).collect();
        let union = disjoint_union(&graphs).unwrap();
        let parts = disjoint_partition_by_sizes(&union, &sizes).unwrap();
        prop_assert_eq!(parts.len(), inputs.len());
        for (part, input) in parts.iter().zip(&inputs) {
            let part = part.as_immutable().unwrap();
            prop_assert_eq!(part.num_vertices(), input.num_vertices());
            prop_assert_eq!(part.edges(true), input.edges(true));
        }
    }

    #[test]
    fn prop_parent_ids_map_to_positions(
        raw in prop::collection::vec(0u64..64, 0..32),
        query in prop::collection::vec(0u64..64, 0..32),
        sort in any::<bool>(),
    ) {
        let mut parents = Vec::new();
        for id in raw {
            if !parents.contains(&id) {
                parents.push(id);
            }
        }
        if sort {
            parents.sort_unstable();
        }
        let mapped = map_parent_id_to_subgraph_id(&parents, &query);
        prop_assert_eq!(mapped.len(), query.len());
        for (q, m) in query.iter().zip(&mapped) {
            match parents.iter().position(|p| p == q) {
                Some(pos) => prop_assert_eq!(*m, pos as i64),
                None => prop_assert_eq!(*m, MISSING_ID),
            }
        }
    }

    #[test]
    fn prop_simple_graph_is_idempotent(coo in arb_coo()) {
        let g = build(&coo);
        let once = to_simple_graph(&g).unwrap();
        let twice = to_simple_graph(&once).unwrap();
        prop_assert_eq!(once.edges(true), twice.edges(true));
        let mut pairs: Vec<(u64, u64)> = coo.1.clone();
        pairs.sort_unstable();
        pairs.dedup();
        prop_assert_eq!(once.num_edges(), pairs.len() as u64);
        prop_assert!(!once.is_multigraph());
    }

    #[test]
    fn prop_array_meta_round_trips(
        kind in arb_kind(),
        shapes in prop::collection::vec(prop::collection::vec(0i64..1000, 0..4), 0..6),
    ) {
        let mut meta = ArrayMeta::new(kind);
        for shape in shapes {
            meta.add_shape(shape);
        }
        let bytes = meta.encode().unwrap();
        prop_assert_eq!(bytes.len(), meta.encoded_len());
        prop_assert_eq!(ArrayMeta::decode(&bytes).unwrap(), meta);
    }

    #[test]
    fn prop_kv_header_round_trips(
        kind in arb_kind().prop_filter("kv kinds", |k| k.is_kv()),
        rank in any::<i32>(),
        name in "[a-z_]{0,12}",
    ) {
        let msg = KvStoreMsg {
            kind,
            rank,
            name: kind.carries_name().then_some(name),
            id: None,
            data: None,
        };
        // Encoding validates the tensor sections; decoding leaves them empty.
        let mut full = msg.clone();
        if kind.carries_ids() {
            full.id = Some(Tensor::from_i64(&[1]));
        }
        if kind.carries_data() {
            full.data = Some(Tensor::from_f32(vec![1], &[0.5]).unwrap());
        }
        let header = full.encode_header().unwrap();
        prop_assert_eq!(KvStoreMsg::decode_header(&header).unwrap(), msg);
    }
}
