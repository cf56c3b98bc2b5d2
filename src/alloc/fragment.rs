//! Per-fragment allocator state.

use super::free_list::{EmptyPageList, PageList};
use crate::storage::{ListState, PageData, PageId, PageMap};
use crate::tuple::LocalKey;
use crate::varpage::VarPage;

/// A horizontal partition of a table: the unit of page ownership.
///
/// Holds the fragment's variable-part pages, the bucket list heads, the
/// empty-page list and the chain of chunks obtained from the pool.
/// Mutated only through [`VarAllocator`](super::VarAllocator).
pub struct Fragment {
    pub(super) pages: PageMap,
    pub(super) free_lists: Vec<PageList>,
    pub(super) empty_pages: EmptyPageList,
    /// First page of the most recently allocated chunk.
    pub(super) var_page_chunks: Option<PageId>,
    /// Pages obtained from the pool, formatted or not.
    pub(super) var_page_count: u32,
}

impl Fragment {
    /// Creates a fragment with `list_count` empty buckets.
    pub(super) fn new(list_count: usize) -> Self {
        Self {
            pages: PageMap::new(),
            free_lists: vec![PageList::new(); list_count],
            empty_pages: EmptyPageList::new(),
            var_page_chunks: None,
            var_page_count: 0,
        }
    }

    /// Returns the number of pages obtained from the pool.
    pub fn var_page_count(&self) -> u32 {
        self.var_page_count
    }

    /// Returns the number of chunk pages not yet formatted.
    pub fn empty_page_count(&self) -> usize {
        self.empty_pages.len()
    }

    /// Returns the number of buckets.
    pub fn list_count(&self) -> usize {
        self.free_lists.len()
    }

    /// Returns the pages of bucket `bucket`, head first.
    ///
    /// # Panics
    ///
    /// Panics if `bucket` is out of range.
    pub fn free_list_pages(&self, bucket: usize) -> Vec<PageId> {
        self.free_lists[bucket].iter(&self.pages).collect()
    }

    /// Returns the page ids owned by this fragment in ascending order.
    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.page_ids()
    }

    /// Returns the bucket membership of a page.
    pub fn list_state(&self, page_id: PageId) -> Option<ListState> {
        self.pages.header(page_id).map(|h| h.list_state)
    }

    /// Returns the free space of a page.
    pub fn free_space(&self, page_id: PageId) -> Option<u32> {
        self.pages.header(page_id).map(|h| h.free_space)
    }

    /// Returns a read-only view of a page.
    pub fn page(&self, page_id: PageId) -> Option<VarPage<&PageData>> {
        self.pages.get(page_id).map(VarPage::new)
    }

    /// Returns the chunk heads and their sizes, newest first.
    pub fn chunks(&self) -> Vec<(PageId, u32)> {
        let mut chunks = Vec::new();
        let mut next = self.var_page_chunks;
        while let Some(head) = next {
            let Some(header) = self.pages.header(head) else {
                break;
            };
            chunks.push((head, header.chunk_size));
            next = header.next_chunk;
        }
        chunks
    }

    /// Reads a variable part.
    ///
    /// Returns `None` if the page is not owned here or the slot is free.
    pub fn var_part(&self, key: LocalKey) -> Option<&[u32]> {
        let page = self.pages.get(key.page_no)?;
        let range = VarPage::new(page).entry_range(key.page_idx)?;
        Some(&page.as_slice()[range])
    }

    /// Reads a variable part for writing.
    pub fn var_part_mut(&mut self, key: LocalKey) -> Option<&mut [u32]> {
        let page = self.pages.get_mut(key.page_no)?;
        let range = VarPage::new(&*page).entry_range(key.page_idx)?;
        Some(&mut page.as_mut_slice()[range])
    }
}
