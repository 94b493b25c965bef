//! Error types for recast-ir.

use thiserror::Error;

/// IR-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A long-running construction observed the cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid basic block reference.
    #[error("invalid basic block id: {0:?}")]
    InvalidBlockId(crate::BasicBlockId),
}
