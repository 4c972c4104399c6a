//! Strata: immutable graph storage, structural graph operations and a
//! point-to-point transport for shipping graph pieces between workers.
//!
//! - [`storage`] holds the CSR-backed [`ImmutableGraph`](storage::ImmutableGraph),
//!   the adjacency-list [`MutableGraph`](storage::MutableGraph) and the
//!   [`Graph`](storage::Graph) variant that operations dispatch on.
//! - [`ops`] derives new graphs: reversal, line graphs, simple and
//!   bidirected graphs, disjoint union/partition and halo subgraphs.
//! - [`net`] moves byte messages over TCP and defines the array metadata
//!   and key/value wire formats layered on top.
//! - [`cli`] backs the `strata` binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod net;
pub mod ops;
pub mod storage;
pub mod types;

pub use storage::{EdgeDir, Graph, GraphQuery, ImmutableGraph, MutableGraph};
pub use types::{EdgeId, ErrorKind, Result, StrataError, VertexId, MISSING_ID};
