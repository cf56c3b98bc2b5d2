//! Page-aligned word buffers for page storage.

use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::ptr::NonNull;

use super::{PAGE_HEADER_WORDS, PAGE_WORDS, PageHeader, PageId};

/// OS page size for alignment (4KB is typical for x86_64).
const OS_PAGE_ALIGNMENT: usize = 4096;

/// Page-aligned memory allocation.
///
/// Allocates exactly `PAGE_WORDS` 32-bit words aligned to OS page
/// boundaries. The memory is zero-initialized on allocation.
///
/// # Safety
///
/// This type uses `std::alloc` directly and maintains the following invariants:
/// - `ptr` is always valid and properly aligned
/// - Memory is allocated for exactly `PAGE_WORDS` words
/// - Memory is deallocated exactly once in `Drop`
pub struct PageData {
    ptr: NonNull<u32>,
    layout: Layout,
}

impl Default for PageData {
    fn default() -> Self {
        Self::new()
    }
}

impl PageData {
    /// Creates a new page-aligned allocation, zero-initialized.
    pub fn new() -> Self {
        let layout = match Layout::from_size_align(PAGE_WORDS * 4, OS_PAGE_ALIGNMENT) {
            Ok(layout) => layout,
            Err(_) => unreachable!("PAGE_WORDS and OS_PAGE_ALIGNMENT form a valid layout"),
        };

        // SAFETY: layout is valid (non-zero size, valid alignment)
        let raw = unsafe { alloc_zeroed(layout) } as *mut u32;
        let Some(ptr) = NonNull::new(raw) else {
            handle_alloc_error(layout);
        };

        Self { ptr, layout }
    }

    /// Creates a zeroed page carrying the header of a fresh chunk page.
    pub fn new_empty(page_id: PageId) -> Self {
        let mut page = Self::new();
        page.set_header(&PageHeader::new_empty(page_id));
        page
    }

    /// Returns the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::read_from(&self.as_slice()[..PAGE_HEADER_WORDS])
    }

    /// Overwrites the page header.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.as_mut_slice()[..PAGE_HEADER_WORDS]);
    }

    /// Returns a slice to the underlying memory.
    pub fn as_slice(&self) -> &[u32] {
        // SAFETY: ptr is valid for PAGE_WORDS words
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), PAGE_WORDS) }
    }

    /// Returns a mutable slice to the underlying memory.
    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        // SAFETY: ptr is valid for PAGE_WORDS words
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), PAGE_WORDS) }
    }
}

impl Drop for PageData {
    fn drop(&mut self) {
        // SAFETY: ptr and layout match the values used in alloc_zeroed()
        unsafe {
            dealloc(self.ptr.as_ptr() as *mut u8, self.layout);
        }
    }
}

// PageData is Send because it owns its allocation
unsafe impl Send for PageData {}
// PageData is Sync because access is exclusive (through &mut)
unsafe impl Sync for PageData {}

impl AsRef<[u32]> for PageData {
    fn as_ref(&self) -> &[u32] {
        self.as_slice()
    }
}

impl AsMut<[u32]> for PageData {
    fn as_mut(&mut self) -> &mut [u32] {
        self.as_mut_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PageState;

    #[test]
    fn test_page_data_allocation() {
        let page = PageData::new();
        assert_eq!(page.as_slice().len(), PAGE_WORDS);
    }

    #[test]
    fn test_page_data_zero_initialized() {
        let page = PageData::new();
        assert!(page.as_slice().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_page_data_alignment() {
        let page = PageData::new();
        let addr = page.ptr.as_ptr() as usize;
        assert_eq!(addr % OS_PAGE_ALIGNMENT, 0);
    }

    #[test]
    fn test_page_data_write_and_read() {
        let mut page = PageData::new();
        let slice = page.as_mut_slice();
        slice[0] = 42;
        slice[100] = 0xDEAD_BEEF;

        assert_eq!(page.as_slice()[0], 42);
        assert_eq!(page.as_slice()[100], 0xDEAD_BEEF);
        assert_eq!(page.as_slice()[1], 0);
    }

    #[test]
    fn test_new_empty_header() {
        let page = PageData::new_empty(PageId::new(12));
        let header = page.header();
        assert_eq!(header.physical_page_id, PageId::new(12));
        assert_eq!(header.page_state, PageState::Empty);
        assert_eq!(header.next_list, None);
    }
}
