//! Variable-part allocation for fragments.
//!
//! This module provides:
//! - [`VarAllocator`]: finds or creates pages with room and carves out,
//!   resizes and frees variable parts
//! - [`Fragment`]: the pages and free lists owned by one fragment
//! - [`VarAllocConfig`]: bucket ranges and tuning constants
//!
//! Pages are kept in buckets by free space. A page moves between buckets
//! whenever an operation changes its free space, and is dropped from all
//! buckets once it falls below the smallest bucket's floor.

mod allocator;
mod config;
mod error;
mod fragment;
mod free_list;
mod realloc;
mod record;

pub use allocator::VarAllocator;
pub use config::{ConfigError, ListSize, VarAllocConfig};
pub use error::AllocError;
pub use fragment::Fragment;
pub use free_list::{EmptyPageList, PageList, PageListIter};
