#![forbid(unsafe_code)]
//! Identifier aliases and the crate-wide error type.

use std::fmt;
use std::io;

use thiserror::Error;

/// Vertex identifier. Vertices of a graph with `n` vertices are numbered `0..n`.
pub type VertexId = u64;

/// Edge identifier as stored in a CSR `edge_ids` array.
pub type EdgeId = u64;

/// Sentinel reported by id-mapping queries for ids that are not present.
pub const MISSING_ID: i64 = -1;

/// Errors produced by graph construction, graph queries, codecs and transport.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Malformed COO/CSR input rejected at construction time.
    #[error("construction: {0}")]
    Construction(String),
    /// Out-of-range vertex or edge id, or inconsistent query arguments.
    #[error("query: {0}")]
    Query(String),
    /// Decoded bytes do not match the declared layout or carry an unknown kind.
    #[error("protocol: {0}")]
    Protocol(String),
    /// Link-level failure that is not an OS I/O error (closed peer, duplicate sender).
    #[error("transport: {0}")]
    Transport(String),
    /// Socket or stream I/O failure.
    #[error("transport I/O during {context}: {source}")]
    TransportIo {
        /// Operation that was running when the error occurred.
        context: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Variant mismatch, size mismatch or an operation unsupported for the input.
    #[error("precondition: {0}")]
    Precondition(String),
}

/// Coarse error taxonomy shared by all components.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// See [`StrataError::Construction`].
    Construction,
    /// See [`StrataError::Query`].
    Query,
    /// See [`StrataError::Protocol`].
    Protocol,
    /// See [`StrataError::Transport`] and [`StrataError::TransportIo`].
    Transport,
    /// See [`StrataError::Precondition`].
    Precondition,
}

impl StrataError {
    /// Returns the taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::Construction(_) => ErrorKind::Construction,
            StrataError::Query(_) => ErrorKind::Query,
            StrataError::Protocol(_) => ErrorKind::Protocol,
            StrataError::Transport(_) | StrataError::TransportIo { .. } => ErrorKind::Transport,
            StrataError::Precondition(_) => ErrorKind::Precondition,
        }
    }

    pub(crate) fn io(context: &'static str, source: io::Error) -> Self {
        StrataError::TransportIo { context, source }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Construction => "construction",
            ErrorKind::Query => "query",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Transport => "transport",
            ErrorKind::Precondition => "precondition",
        };
        f.write_str(name)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_transport_kind() {
        let err = StrataError::io("connect", io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("connect"));
    }

    #[test]
    fn kind_display_is_lowercase() {
        assert_eq!(ErrorKind::Precondition.to_string(), "precondition");
    }
}
