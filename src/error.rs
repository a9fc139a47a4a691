//! Error type shared by every container in the crate.

use thiserror::Error;

/// Failure classification returned by fallible container operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A malformed index, an empty key, or an entry id that is no longer linked.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Allocation failed while creating a container.
    #[error("out of memory")]
    OutOfMemory,

    /// The container changed since the iterator took its snapshot.
    #[error("container modified during iteration")]
    ConcurrentModification,

    /// No entry matched the requested key.
    #[error("not found")]
    NotFound,

    /// Every id in the allocator is in use.
    #[error("id capacity exhausted")]
    CapacityExhausted,

    /// The operation is not valid in the current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The id was not handed out by `alloc`, or has already been freed.
    #[error("id {0} is not allocated")]
    NotAllocated(usize),

    /// Bit index outside the bitset.
    #[error("bit {index} out of range for bitset of size {size}")]
    OutOfRange { index: usize, size: usize },
}

impl Error {
    /// Whether the caller can recover by re-creating its iterator and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConcurrentModification)
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
