//! Error types for tracer-vis.

use thiserror::Error;

/// Result type for tracer-vis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or starting the server.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value could not be parsed.
    #[error("invalid {key}: {value:?} ({reason})")]
    Config {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The facility graph file is not a valid graph.
    #[error("invalid facility graph: {0}")]
    Graph(#[from] tracer_graph::Error),

    /// A dataset file was rejected by the playback engine.
    #[error("dataset rejected: {0}")]
    Dataset(#[from] tracer_core::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
