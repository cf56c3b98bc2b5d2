//! Storage layer errors.

use crate::storage::PageId;

/// Storage layer errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The page pool cannot hand out any more pages.
    ///
    /// Returned only when not a single page could be granted; a request
    /// that can be partly served succeeds with a shorter run.
    PoolExhausted {
        /// Number of pages asked for.
        requested: u32,
    },

    /// Page id does not resolve to a page owned by the caller.
    PageNotFound(PageId),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::PoolExhausted { requested } => {
                write!(f, "page pool exhausted: {} pages requested", requested)
            }
            StorageError::PageNotFound(id) => write!(f, "page not found: {}", id),
        }
    }
}

impl std::error::Error for StorageError {}
