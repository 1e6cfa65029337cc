//! Error types for phone-forward

use std::collections::TryReserveError;

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Why an argument was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidArgument {
    /// The number has no symbols.
    #[error("number is empty")]
    Empty,

    /// A byte outside `0-9`, `*`, `#`.
    #[error("byte {byte:#04x} at position {position} is not a phone number symbol")]
    BadSymbol {
        /// Byte offset of the first offending byte.
        position: usize,
        /// The offending byte.
        byte: u8,
    },

    /// `add` was asked to redirect a prefix onto itself.
    #[error("a number cannot be redirected to itself")]
    SelfRedirect,
}

/// Engine error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Rejected input; nothing was mutated or allocated.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),

    /// The allocator refused memory; the engine was rolled back to its
    /// state before the call.
    #[error("allocation failure: {0}")]
    AllocationFailure(#[from] TryReserveError),
}

impl Error {
    /// Returns true for [`Error::InvalidArgument`].
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }

    /// Returns true for [`Error::AllocationFailure`].
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, Error::AllocationFailure(_))
    }
}
