//! Graph storage: CSR arrays, the immutable and mutable graph variants, and
//! the derived subgraph records returned by graph operations.

pub mod csr;
pub mod immutable;
pub mod mutable;
pub mod subgraph;
pub mod variant;

pub use csr::{Csr, EdgeArray};
pub use immutable::{AdjFormat, Adjacency, EdgeDir, ImmutableGraph};
pub use mutable::MutableGraph;
pub use subgraph::{HaloSubgraph, Subgraph};
pub use variant::{Graph, GraphQuery, GraphVariant};
