//! Error types for tracer-graph.

use thiserror::Error;

use crate::NodeId;

/// Result type for graph construction.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling a facility graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Two nodes were declared with the same id.
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// An edge references a node that was never declared.
    #[error("edge {from} -> {to} references unknown node {missing}")]
    UnknownEndpoint {
        from: NodeId,
        to: NodeId,
        missing: NodeId,
    },

    /// A node coordinate is NaN or infinite.
    #[error("node {0} has a non-finite coordinate")]
    NonFiniteCoordinate(NodeId),
}
