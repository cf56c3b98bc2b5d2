//! Page header format for the storage layer.
//!
//! Every page starts with a fixed header holding two groups of fields:
//! pool bookkeeping (identity, state, free-list links and chunk chaining)
//! and the variable-page layout counters. The layout counters are only
//! meaningful once the page has been formatted by
//! [`VarPage::init`](crate::varpage::VarPage::init).

use super::{PageId, RNIL};

/// Size of the page header in words.
pub const PAGE_HEADER_WORDS: usize = 32;

/// Page type identifiers.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized page.
    Free = 0,
    /// Page formatted for variable-sized entries.
    VarPage = 1,
}

impl PageType {
    /// Creates a PageType from a raw header word.
    ///
    /// Returns `None` if the value doesn't match any known page type.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(PageType::Free),
            1 => Some(PageType::VarPage),
            _ => None,
        }
    }
}

/// Lifecycle state of a page owned by a fragment.
///
/// Scanners use this to skip pages that were chunk-allocated but never
/// formatted.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Allocated as part of a chunk, not yet formatted.
    Empty = 0,
    /// Formatted as a variable page and holding entries.
    InUse = 1,
}

impl PageState {
    /// Creates a PageState from a raw header word.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(PageState::Empty),
            1 => Some(PageState::InUse),
            _ => None,
        }
    }
}

/// Free-list membership of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    /// Not linked into any free-space bucket.
    Unlisted,
    /// Linked into the bucket with the given index.
    InBucket(usize),
}

impl ListState {
    fn from_word(word: u32) -> Self {
        if word == RNIL {
            ListState::Unlisted
        } else {
            ListState::InBucket(word as usize)
        }
    }

    fn to_word(self) -> u32 {
        match self {
            ListState::Unlisted => RNIL,
            ListState::InBucket(i) => i as u32,
        }
    }
}

/// Page header stored at the beginning of each page.
///
/// Layout (32 words, one field per word):
/// - 0: `physical_page_id`
/// - 1: `page_type`
/// - 2: `page_state`
/// - 3: `list_state` (`RNIL` = unlisted)
/// - 4: `next_list` (`RNIL` = none)
/// - 5: `prev_list` (`RNIL` = none)
/// - 6: `chunk_size`
/// - 7: `next_chunk` (`RNIL` = none)
/// - 8: `free_space`
/// - 9: `high_index`
/// - 10: `insert_pos`
/// - 11: `next_free_index`
/// - 12..32: reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Id of this page in the pool.
    pub physical_page_id: PageId,
    /// Format of the data area.
    pub page_type: PageType,
    /// Lifecycle state.
    pub page_state: PageState,
    /// Free-space bucket membership.
    pub list_state: ListState,
    /// Next page in the bucket list or the empty-page list.
    pub next_list: Option<PageId>,
    /// Previous page in the bucket list.
    pub prev_list: Option<PageId>,
    /// Number of pages in the chunk this page heads (0 if not a head).
    pub chunk_size: u32,
    /// Head page of the fragment's previously allocated chunk.
    pub next_chunk: Option<PageId>,
    /// Words available for new entries and index slots.
    pub free_space: u32,
    /// One past the highest index slot in use.
    pub high_index: u32,
    /// Offset in the data area where the next entry is placed.
    pub insert_pos: u32,
    /// Head of the in-page free index slot list.
    pub next_free_index: u32,
}

impl PageHeader {
    /// Creates the header of a freshly chunk-allocated page.
    pub fn new_empty(page_id: PageId) -> Self {
        Self {
            physical_page_id: page_id,
            page_type: PageType::Free,
            page_state: PageState::Empty,
            list_state: ListState::Unlisted,
            next_list: None,
            prev_list: None,
            chunk_size: 0,
            next_chunk: None,
            free_space: 0,
            high_index: 0,
            insert_pos: 0,
            next_free_index: 0,
        }
    }

    /// Reads a header from a page word slice.
    pub fn read_from(data: &[u32]) -> Self {
        Self {
            physical_page_id: PageId::new(data[0]),
            page_type: PageType::from_u32(data[1]).unwrap_or(PageType::Free),
            page_state: PageState::from_u32(data[2]).unwrap_or(PageState::Empty),
            list_state: ListState::from_word(data[3]),
            next_list: PageId::from_link(data[4]),
            prev_list: PageId::from_link(data[5]),
            chunk_size: data[6],
            next_chunk: PageId::from_link(data[7]),
            free_space: data[8],
            high_index: data[9],
            insert_pos: data[10],
            next_free_index: data[11],
        }
    }

    /// Writes the header to a page word slice.
    pub fn write_to(&self, data: &mut [u32]) {
        data[0] = self.physical_page_id.page_num();
        data[1] = self.page_type as u32;
        data[2] = self.page_state as u32;
        data[3] = self.list_state.to_word();
        data[4] = PageId::to_link(self.next_list);
        data[5] = PageId::to_link(self.prev_list);
        data[6] = self.chunk_size;
        data[7] = PageId::to_link(self.next_chunk);
        data[8] = self.free_space;
        data[9] = self.high_index;
        data[10] = self.insert_pos;
        data[11] = self.next_free_index;
        // Words 12..32 are reserved and left untouched
    }
}
