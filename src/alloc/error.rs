//! Allocator errors.

use crate::storage::{PageId, StorageError};
use crate::tuple::LocalKey;
use crate::varpage::PageError;

/// Errors that can occur during variable-part allocation.
///
/// Every variant is recoverable: the request had no effect and the caller
/// rolls back whatever it paired with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// Requested size outside `1..=max` words.
    InvalidSize { size: u32, max: u32 },
    /// No page with enough room and the pool could not supply a new one.
    OutOfPages,
    /// The fixed-part store has no room for another row.
    FixedPartExhausted,
    /// The requested fixed-part row id is taken or out of range.
    RowIdUnavailable(LocalKey),
    /// Key refers to a page the fragment does not own.
    PageNotFound(PageId),
    /// Stored entry length differs from the size the caller passed.
    EntrySizeMismatch { expected: u32, actual: u32 },
    /// Fixed part carries no variable-part reference.
    MissingVarPart,
    /// In-page operation failed.
    Page(PageError),
    /// Page pool failure.
    Storage(StorageError),
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocError::InvalidSize { size, max } => {
                write!(f, "invalid variable part size {} (allowed 1..={})", size, max)
            }
            AllocError::OutOfPages => write!(f, "out of pages for variable parts"),
            AllocError::FixedPartExhausted => write!(f, "out of space for fixed parts"),
            AllocError::RowIdUnavailable(key) => write!(f, "row id {} unavailable", key),
            AllocError::PageNotFound(id) => write!(f, "{} not owned by fragment", id),
            AllocError::EntrySizeMismatch { expected, actual } => {
                write!(
                    f,
                    "entry size mismatch: expected {} words, found {}",
                    expected, actual
                )
            }
            AllocError::MissingVarPart => write!(f, "row has no variable part"),
            AllocError::Page(e) => write!(f, "page error: {}", e),
            AllocError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for AllocError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AllocError::Page(e) => Some(e),
            AllocError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PageError> for AllocError {
    fn from(e: PageError) -> Self {
        AllocError::Page(e)
    }
}

impl From<StorageError> for AllocError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::PageNotFound(id) => AllocError::PageNotFound(id),
            other => AllocError::Storage(other),
        }
    }
}
