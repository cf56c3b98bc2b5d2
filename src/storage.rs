//! Storage layer: pages, page headers and the page pool.
//!
//! All variable-part data lives in pages of `PAGE_WORDS` 32-bit words.
//! Pages are handed out by a process-wide [`PagePool`] in consecutive runs
//! ("chunks") and are then owned by a fragment's [`PageMap`].
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! | VarAllocator      |  <- alloc
//! +-------------------+
//!       |        \
//!       v         v
//! +----------+  +-----------+
//! | PageMap  |  | PagePool  |
//! | (owned   |  | (shared,  |
//! |  pages)  |  |  ids only)|
//! +----------+  +-----------+
//! ```

pub mod error;
pub mod page;
pub mod page_map;
pub mod pool;

pub use error::StorageError;
pub use page::{
    DATA_WORDS, ListState, PAGE_HEADER_WORDS, PAGE_WORDS, PageData, PageHeader, PageId,
    PageState, PageType,
};
pub use page_map::PageMap;
pub use pool::{PagePool, PageRun};
