//! Variable-sized entry storage within a page.
//!
//! - [`VarPage`]: page-level entry storage with a downward-growing index
//! - [`PageError`]: in-page failures (full page, unknown slot)

mod error;
mod page;

pub use error::PageError;
pub use page::{EMPTY_PAGE_FREE_SPACE, MAX_VAR_PART_WORDS, VarPage};
