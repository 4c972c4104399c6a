//! Stateless graph algorithms.
//!
//! Every operation reads its inputs and returns freshly built graphs; no
//! input graph is modified. Operations that only make sense for one graph
//! variant take a [`Graph`](crate::storage::Graph) and reject the other
//! variant with a precondition error.

mod halo;
mod ids;
mod partition;
mod transform;

pub use halo::{get_subgraph_with_halo, partition_with_halo};
pub use ids::{expand_ids, map_parent_id_to_subgraph_id};
pub use partition::{disjoint_partition_by_num, disjoint_partition_by_sizes, disjoint_union};
pub use transform::{
    line_graph, reverse, to_bidirected_immutable_graph, to_bidirected_mutable_graph,
    to_simple_graph,
};
