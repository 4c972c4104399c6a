#![forbid(unsafe_code)]

//! Command-line support code.
//!
//! Loads edge lists from CSV for the `strata` binary and writes derived
//! graphs back out.

/// CSV edge-list loading and writing.
pub mod edge_list;

pub use edge_list::{load_edge_list, write_edge_list, CliError, EdgeList, EdgeListConfig};
