//! Error types for the variable page layout.

use std::fmt;

/// Errors from in-page operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// Page does not have room for the entry.
    PageFull {
        /// Words required for the entry and its index slot.
        required: u32,
        /// Words available in free space.
        available: u32,
    },
    /// Index slot not found or already freed.
    SlotNotFound(u32),
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::PageFull {
                required,
                available,
            } => {
                write!(
                    f,
                    "page full: need {} words, have {} available",
                    required, available
                )
            }
            PageError::SlotNotFound(page_idx) => {
                write!(f, "slot {} not found or freed", page_idx)
            }
        }
    }
}

impl std::error::Error for PageError {}
