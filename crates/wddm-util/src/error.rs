use std::collections::TryReserveError;

use thiserror::Error;

/// Failure of a growable container operation.
///
/// Containers never retry; the caller decides whether the operation can be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("out of memory")]
    NoMemory,
}

impl From<TryReserveError> for CollectionError {
    fn from(_: TryReserveError) -> Self {
        Self::NoMemory
    }
}
