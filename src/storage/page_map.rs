//! Pages owned by a single fragment, resolved by id.

use std::collections::HashMap;

use crate::storage::{PageData, PageHeader, PageId};

/// Id-to-page resolution for the pages a fragment owns.
///
/// Lookups are fallible: an id that was never inserted (or belongs to
/// another fragment) resolves to `None`.
#[derive(Default)]
pub struct PageMap {
    pages: HashMap<PageId, PageData>,
}

impl PageMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a page.
    pub fn insert(&mut self, page_id: PageId, page: PageData) {
        self.pages.insert(page_id, page);
    }

    /// Drops ownership of a page, returning its buffer.
    pub fn remove(&mut self, page_id: PageId) -> Option<PageData> {
        self.pages.remove(&page_id)
    }

    /// Resolves a page id.
    pub fn get(&self, page_id: PageId) -> Option<&PageData> {
        self.pages.get(&page_id)
    }

    /// Resolves a page id for mutation.
    pub fn get_mut(&mut self, page_id: PageId) -> Option<&mut PageData> {
        self.pages.get_mut(&page_id)
    }

    /// Returns the header of a page.
    pub fn header(&self, page_id: PageId) -> Option<PageHeader> {
        self.get(page_id).map(PageData::header)
    }

    /// Applies `f` to the header of a page and writes it back.
    ///
    /// Returns `false` if the page is not present.
    pub fn update_header(&mut self, page_id: PageId, f: impl FnOnce(&mut PageHeader)) -> bool {
        match self.get_mut(page_id) {
            Some(page) => {
                let mut header = page.header();
                f(&mut header);
                page.set_header(&header);
                true
            }
            None => false,
        }
    }

    /// Returns the number of pages held.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns true if no pages are held.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Returns the ids of all held pages in ascending order.
    pub fn page_ids(&self) -> Vec<PageId> {
        let mut ids: Vec<PageId> = self.pages.keys().copied().collect();
        ids.sort();
        ids
    }
}
