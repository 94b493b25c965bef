//! Error types for recast-cgen.
//!
//! Invariant violations mean the consumed analyses are inconsistent with
//! each other; they abort the whole function and the partially built
//! definition is discarded. Degraded-but-valid output (an unresolved
//! `goto "???"`, an `intrinsic()` call) is not an error.

use recast_ir::{NodeId, TermId};
use thiserror::Error;

/// Result alias for generator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Generator error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Construction observed the cancellation token.
    #[error("generation cancelled")]
    Cancelled,

    /// The current function has no resolved signature.
    #[error("no signature for function `{0}`")]
    MissingSignature(String),

    /// The entry or call hook lacks a clone of a signature argument.
    #[error("hook is missing a clone of argument {0}")]
    MissingArgumentTerm(usize),

    /// A term that must carry a memory location does not.
    #[error("term {0} has no memory location")]
    MissingMemoryLocation(TermId),

    /// A term that must belong to a variable does not.
    #[error("term {0} does not belong to a variable")]
    MissingVariable(TermId),

    /// Two signature arguments resolved to the same variable.
    #[error("argument term {0} re-binds an already declared variable")]
    DuplicateArgumentVariable(TermId),

    /// A memory location access survived outside any variable.
    #[error("memory location access {0} outside any variable")]
    UnassignedMemoryAccess(TermId),

    /// A region's shape does not match its kind.
    #[error("region {0:?} is malformed: {1}")]
    MalformedRegion(NodeId, &'static str),

    /// A switch region is missing one of its required pieces.
    #[error("switch region {0:?} is malformed: {1}")]
    MalformedSwitch(NodeId, &'static str),

    /// A condition node's jump targets match neither branch of the
    /// enclosing conditional.
    #[error("condition at {0:?} targets neither branch")]
    InconsistentCondition(NodeId),

    /// A condition node produced no expression at all.
    #[error("condition at {0:?} produced no expression")]
    EmptyCondition(NodeId),

    /// A memoised predicate contradicted itself.
    #[error("broken generator invariant: {0}")]
    BrokenInvariant(&'static str),
}

impl From<recast_ir::Error> for Error {
    fn from(e: recast_ir::Error) -> Self {
        match e {
            recast_ir::Error::Cancelled => Error::Cancelled,
            recast_ir::Error::InvalidBlockId(_) => {
                Error::BrokenInvariant("IR referenced an unknown basic block")
            }
        }
    }
}
