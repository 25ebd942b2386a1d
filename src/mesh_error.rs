//! MeshGateError: unified error type for the recoverable boundaries of mesh-gate.
//!
//! Precondition violations inside the sync layer (size mismatches, state-machine
//! misuse) are assertions and never surface here; this type covers file reading,
//! argument parsing, partitioning and communication payload checks.

use thiserror::Error;

/// Unified error type for mesh-gate operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshGateError {
    /// Error during communication with a neighbour rank.
    #[error("Communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: CommErrorKind,
    },
    /// A received payload did not have the announced size.
    #[error("Buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// The mesh file stream could not be parsed.
    #[error("Mesh file parse error: {0}")]
    MeshParse(String),
    /// Reading or writing a file failed.
    #[error("I/O error on `{path}`: {message}")]
    Io { path: String, message: String },
    /// A vector file had an unexpected layout.
    #[error("Vector file format error: {0}")]
    VectorFormat(String),
    /// A command line or configuration argument was invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A named mesh part does not exist.
    #[error("Mesh part `{0}` not found")]
    MissingMeshPart(String),
    /// A mesh references a vertex, edge or cell that does not exist.
    #[error("Mesh topology error: {0}")]
    InvalidTopology(String),
    /// Level specification for a domain control was invalid.
    #[error("Invalid level specification: {0}")]
    InvalidLevels(String),
    /// The process count violates a structural requirement (e.g. power of 4).
    #[error("Invalid process count {size}: {reason}")]
    InvalidProcessCount { size: usize, reason: String },
    /// A partitioner ran but produced an unusable assignment.
    #[error("Partitioner `{strategy}` failed: {reason}")]
    PartitionerFailed { strategy: String, reason: String },
    /// No enabled partitioning strategy produced a partition.
    #[error("Failed to create a partition: {0}")]
    PartitionExhausted(String),
}

/// Transport-level failure kinds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommErrorKind {
    #[error("receive completed without a payload")]
    NoPayload,
    #[error("peer sent malformed data: {0}")]
    Malformed(String),
}

impl MeshGateError {
    /// Wrap a `std::io::Error` together with the path it occurred on.
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        MeshGateError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}
