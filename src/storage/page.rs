//! Page identifier and size constants.

mod data;
mod header;

pub use data::PageData;
pub use header::{ListState, PAGE_HEADER_WORDS, PageHeader, PageState, PageType};

/// Page size in 32-bit words (32KB pages).
pub const PAGE_WORDS: usize = 8192;

/// Number of words available to variable-page entries and their index.
pub const DATA_WORDS: usize = PAGE_WORDS - PAGE_HEADER_WORDS;

/// Encoded "no page" link value stored in page headers.
pub(crate) const RNIL: u32 = u32::MAX;

/// Unique identifier for a page within the page pool.
///
/// Page ids are handed out by [`PagePool`](super::PagePool) in consecutive
/// runs, so `PageId(n + 1)` is the next page of the same chunk when `n` is
/// not the chunk's last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Creates a new PageId from a page number.
    pub const fn new(page_num: u32) -> Self {
        Self(page_num)
    }

    /// Returns the page number.
    pub const fn page_num(&self) -> u32 {
        self.0
    }

    /// Returns the id `n` pages further into the same run.
    pub const fn offset(&self, n: u32) -> Self {
        Self(self.0 + n)
    }

    /// Decodes a header link word.
    pub(crate) const fn from_link(word: u32) -> Option<Self> {
        if word == RNIL { None } else { Some(Self(word)) }
    }

    /// Encodes an optional page as a header link word.
    pub(crate) const fn to_link(page: Option<Self>) -> u32 {
        match page {
            Some(id) => id.0,
            None => RNIL,
        }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {}", self.0)
    }
}
