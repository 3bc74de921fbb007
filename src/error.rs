//! Error types for the Prism lowering pipeline

use thiserror::Error;

/// Main error type for Prism
///
/// Every variant is a programmer error in a schedule or pipeline, detected
/// while lowering runs. There is no recovery path: `lower` reports the first
/// failure it hits and stops. Errors that can only be detected when the
/// compiled pipeline runs (insufficient user bounds, out-of-range image
/// access) are not represented here; they surface through `AssertStmt` nodes
/// embedded in the emitted IR.
#[derive(Error, Debug)]
pub enum Error {
    /// A schedule names loop levels the injector cannot honor
    #[error("MalformedSchedule: {0}")]
    MalformedSchedule(String),

    /// The call graph has a cycle, so no realization order exists
    #[error("CyclicPipeline: {0}")]
    CyclicPipeline(String),

    /// Bounds analysis found an unbounded region for a referenced buffer
    #[error("UnboundedAccess: region of buffer '{buffer}' is unbounded in dimension {dimension}")]
    UnboundedAccess { buffer: String, dimension: usize },

    /// Internal compiler error
    #[error("InternalError: {0}")]
    Internal(String),
}

impl Error {
    /// Create a malformed-schedule error
    pub fn malformed_schedule(message: impl Into<String>) -> Self {
        Error::MalformedSchedule(message.into())
    }

    /// Create a cyclic-pipeline error
    pub fn cyclic_pipeline(message: impl Into<String>) -> Self {
        Error::CyclicPipeline(message.into())
    }

    /// Create an unbounded-access error for one dimension of a buffer
    pub fn unbounded_access(buffer: impl Into<String>, dimension: usize) -> Self {
        Error::UnboundedAccess {
            buffer: buffer.into(),
            dimension,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

/// Result type alias for Prism
pub type Result<T> = std::result::Result<T, Error>;
