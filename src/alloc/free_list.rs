//! Intrusive page lists.
//!
//! List heads live in the fragment; the links live in the page headers as
//! page ids (`next_list` / `prev_list`), so linking and unlinking never
//! allocates.

use crate::storage::{PageHeader, PageId, PageMap};

/// Applies `f` to a linked page's header.
///
/// # Panics
///
/// Panics if the page is missing, which means the list is corrupt.
fn edit(pages: &mut PageMap, page_id: PageId, f: impl FnOnce(&mut PageHeader)) {
    let found = pages.update_header(page_id, f);
    assert!(found, "page list references missing {}", page_id);
}

/// Doubly-linked list of pages (one free-space bucket).
#[derive(Debug, Default, Clone)]
pub struct PageList {
    first: Option<PageId>,
    len: usize,
}

impl PageList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first page.
    pub fn first(&self) -> Option<PageId> {
        self.first
    }

    /// Returns true if the list has no pages.
    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    /// Returns the number of pages.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Links a page at the head of the list.
    pub fn add(&mut self, pages: &mut PageMap, page_id: PageId) {
        let old_first = self.first;
        edit(pages, page_id, |h| {
            h.next_list = old_first;
            h.prev_list = None;
        });
        if let Some(next) = old_first {
            edit(pages, next, |h| h.prev_list = Some(page_id));
        }
        self.first = Some(page_id);
        self.len += 1;
    }

    /// Unlinks a page from anywhere in the list.
    pub fn remove(&mut self, pages: &mut PageMap, page_id: PageId) {
        let Some(header) = pages.header(page_id) else {
            panic!("page list references missing {}", page_id);
        };
        let (prev, next) = (header.prev_list, header.next_list);

        match prev {
            Some(prev) => edit(pages, prev, |h| h.next_list = next),
            None => {
                debug_assert_eq!(self.first, Some(page_id));
                self.first = next;
            }
        }
        if let Some(next) = next {
            edit(pages, next, |h| h.prev_list = prev);
        }
        edit(pages, page_id, |h| {
            h.next_list = None;
            h.prev_list = None;
        });
        self.len -= 1;
    }

    /// Iterates over the pages from the head.
    pub fn iter<'a>(&self, pages: &'a PageMap) -> PageListIter<'a> {
        PageListIter {
            pages,
            next: self.first,
        }
    }
}

/// Iterator over a [`PageList`] or [`EmptyPageList`].
pub struct PageListIter<'a> {
    pages: &'a PageMap,
    next: Option<PageId>,
}

impl Iterator for PageListIter<'_> {
    type Item = PageId;

    fn next(&mut self) -> Option<PageId> {
        let current = self.next?;
        self.next = self.pages.header(current).and_then(|h| h.next_list);
        Some(current)
    }
}

/// Singly-linked list of chunk pages not yet formatted.
#[derive(Debug, Default, Clone)]
pub struct EmptyPageList {
    first: Option<PageId>,
    len: usize,
}

impl EmptyPageList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the list has no pages.
    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    /// Returns the number of pages.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Prepends an already forward-linked run `first..=last` of `count`
    /// pages.
    pub fn add_run(&mut self, pages: &mut PageMap, first: PageId, last: PageId, count: usize) {
        let old_first = self.first;
        edit(pages, last, |h| h.next_list = old_first);
        self.first = Some(first);
        self.len += count;
    }

    /// Pops the first page.
    pub fn remove_front(&mut self, pages: &mut PageMap) -> Option<PageId> {
        let page_id = self.first?;
        let mut next = None;
        edit(pages, page_id, |h| {
            next = h.next_list;
            h.next_list = None;
        });
        self.first = next;
        self.len -= 1;
        Some(page_id)
    }

    /// Iterates over the pages from the head.
    pub fn iter<'a>(&self, pages: &'a PageMap) -> PageListIter<'a> {
        PageListIter {
            pages,
            next: self.first,
        }
    }
}
