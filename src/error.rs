//! Crate-wide error type.
//!
//! Every fallible entry point returns [`Result`]. Nothing in this crate
//! catches its own errors: a function that fails leaves no partial state
//! committed (see `Context::compile`).

use crate::label::Label;
use thiserror::Error;

/// Fatal conditions the backend can surface to a caller.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BackendError {
    /// Input has dangling jump targets, colliding labels, or a block with
    /// no terminator.
    #[error("malformed CFG: {0}")]
    MalformedCFG(String),

    /// `split_edge` was called on a pair of blocks with no edge between
    /// them.
    #[error("no edge from {from:?} to {to:?}")]
    NoSuchEdge {
        /// Source block of the requested edge.
        from: Label,
        /// Destination block of the requested edge.
        to: Label,
    },

    /// Dominator code was asked for the immediate dominator of a block
    /// unreachable from ENTRY.
    #[error("block {0:?} is unreachable from ENTRY")]
    UnreachableAssumption(Label),

    /// Reserved for API stability. The allocator never fails to assign a
    /// temp a location: above the register file it spills instead. This
    /// variant is never constructed.
    #[error("register file exhausted")]
    RegisterExhausted,

    /// A symmetry or bijection invariant was violated during construction.
    /// This is a bug in this crate, not a malformed input.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(&'static str),
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, BackendError>;
