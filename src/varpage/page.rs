//! Variable page implementation.
//!
//! A variable page stores entries of arbitrary word length within the data
//! area of a fixed-size page. The data area layout is:
//!
//! ```text
//! +------------------+ word 0
//! | Entries          | (grow upward, next one at insert_pos)
//! +------------------+ insert_pos
//! | Free Space       |
//! +------------------+ DATA_WORDS - high_index + 1
//! | Index Array      | (grows downward, slot i at DATA_WORDS - i)
//! +------------------+ DATA_WORDS
//! ```
//!
//! Each index word packs the entry's position and length. Freed slots are
//! chained through their index words; freeing the highest slot shrinks the
//! index array instead. Freed entry space only becomes contiguous again
//! when the page is reorganized with [`VarPage::reorg`].
//!
//! Space accounting: `free_space = DATA_WORDS - high_index - Σ live lengths`.

use std::ops::Range;

use super::error::PageError;
use crate::storage::{DATA_WORDS, PAGE_HEADER_WORDS, PAGE_WORDS, PageHeader, PageType};

/// Index word flag marking a freed slot.
const FREE: u32 = 0x4000_0000;
const LEN_MASK: u32 = 0x3FFF_8000;
const LEN_SHIFT: u32 = 15;
const POS_MASK: u32 = 0x0000_7FFF;

/// Free slot chain terminator (also the largest encodable position).
pub(crate) const END_OF_FREE_LIST: u32 = POS_MASK;

/// Free space of a freshly formatted page.
pub const EMPTY_PAGE_FREE_SPACE: u32 = DATA_WORDS as u32 - 1;

/// Largest entry a page can hold (an empty page minus one new index slot).
pub const MAX_VAR_PART_WORDS: u32 = EMPTY_PAGE_FREE_SPACE - 1;

fn entry_pos(word: u32) -> u32 {
    word & POS_MASK
}

fn entry_len(word: u32) -> u32 {
    (word & LEN_MASK) >> LEN_SHIFT
}

/// A view of a page formatted for variable-sized entries.
///
/// Like the other page views, the type parameter `T` allows wrapping:
/// - `&[u32]` - read-only view
/// - `&mut [u32]` / `&mut PageData` - mutable view
/// - `Vec<u32>` - owned data
///
/// # Example
///
/// ```
/// use varalloc::storage::PAGE_WORDS;
/// use varalloc::varpage::VarPage;
///
/// let mut data = vec![0u32; PAGE_WORDS];
/// let mut scratch = vec![0u32; PAGE_WORDS];
/// let mut page = VarPage::new(&mut data);
/// page.init();
///
/// let idx = page.alloc_record(3, &mut scratch).unwrap();
/// page.get_ptr_mut(idx).copy_from_slice(&[1, 2, 3]);
/// assert_eq!(page.read(idx), Some([1, 2, 3].as_slice()));
/// ```
pub struct VarPage<T> {
    data: T,
}

// Read-only methods (available for any T: AsRef<[u32]>)
impl<T: AsRef<[u32]>> VarPage<T> {
    /// Creates a new page view over the given words.
    ///
    /// # Panics
    ///
    /// Panics if `data.as_ref().len() != PAGE_WORDS`.
    pub fn new(data: T) -> Self {
        assert_eq!(
            data.as_ref().len(),
            PAGE_WORDS,
            "VarPage requires exactly {} words, got {}",
            PAGE_WORDS,
            data.as_ref().len()
        );
        Self { data }
    }

    fn words(&self) -> &[u32] {
        self.data.as_ref()
    }

    /// Returns the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::read_from(&self.words()[..PAGE_HEADER_WORDS])
    }

    /// Returns the words available for new entries and index slots.
    pub fn free_space(&self) -> u32 {
        self.header().free_space
    }

    /// Returns one past the highest index slot in use.
    pub fn high_index(&self) -> u32 {
        self.header().high_index
    }

    /// Returns the data-area offset where the next entry goes.
    pub fn insert_pos(&self) -> u32 {
        self.header().insert_pos
    }

    /// Returns the gap between the last entry and the index array.
    pub fn largest_contiguous(&self) -> u32 {
        let header = self.header();
        (DATA_WORDS as u32).saturating_sub(header.insert_pos + header.high_index)
    }

    /// Absolute word offset of index slot `page_idx`.
    fn index_offset(page_idx: u32) -> usize {
        PAGE_WORDS - page_idx as usize
    }

    /// Absolute word offset of data-area position `pos`.
    fn data_offset(pos: u32) -> usize {
        PAGE_HEADER_WORDS + pos as usize
    }

    fn index_word(&self, page_idx: u32) -> u32 {
        self.words()[Self::index_offset(page_idx)]
    }

    /// Returns true if `page_idx` names an allocated entry.
    pub fn is_live(&self, page_idx: u32) -> bool {
        page_idx >= 1 && page_idx < self.high_index() && self.index_word(page_idx) & FREE == 0
    }

    /// Returns the length of an entry in words.
    pub fn get_entry_len(&self, page_idx: u32) -> u32 {
        entry_len(self.index_word(page_idx))
    }

    /// Returns the data-area offset of an entry.
    pub fn get_entry_pos(&self, page_idx: u32) -> u32 {
        entry_pos(self.index_word(page_idx))
    }

    /// Returns the words of an entry.
    ///
    /// # Panics
    ///
    /// Panics if the entry extends past the page; use [`read`](Self::read)
    /// for untrusted slot numbers.
    pub fn get_ptr(&self, page_idx: u32) -> &[u32] {
        let word = self.index_word(page_idx);
        let start = Self::data_offset(entry_pos(word));
        &self.words()[start..start + entry_len(word) as usize]
    }

    /// Reads an entry by slot number.
    ///
    /// Returns `None` if the slot is out of bounds or freed.
    pub fn read(&self, page_idx: u32) -> Option<&[u32]> {
        if self.is_live(page_idx) {
            Some(self.get_ptr(page_idx))
        } else {
            None
        }
    }

    /// Returns the absolute word range of a live entry within the page.
    ///
    /// Lets owners of the page buffer borrow the entry for longer than
    /// this view lives.
    pub fn entry_range(&self, page_idx: u32) -> Option<Range<usize>> {
        if !self.is_live(page_idx) {
            return None;
        }
        let word = self.index_word(page_idx);
        let start = Self::data_offset(entry_pos(word));
        Some(start..start + entry_len(word) as usize)
    }

    /// Checks whether an entry can grow by `growth_len` words without
    /// moving: it must be the last entry and the gap before the index array
    /// must be larger than the growth.
    pub fn is_space_behind_entry(&self, page_idx: u32, growth_len: u32) -> bool {
        let header = self.header();
        let word = self.index_word(page_idx);
        entry_pos(word) + entry_len(word) == header.insert_pos
            && header.insert_pos + growth_len < DATA_WORDS as u32 - header.high_index
    }

    /// Returns an iterator over all live entries.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u32])> {
        let high_index = self.high_index();
        (1..high_index).filter_map(move |idx| self.read(idx).map(|data| (idx, data)))
    }

    /// Returns the number of live entries in this page.
    pub fn entry_count(&self) -> usize {
        let high_index = self.high_index();
        (1..high_index).filter(|&idx| self.is_live(idx)).count()
    }
}

// Mutable methods (available for T: AsRef<[u32]> + AsMut<[u32]>)
impl<T: AsRef<[u32]> + AsMut<[u32]>> VarPage<T> {
    fn words_mut(&mut self) -> &mut [u32] {
        self.data.as_mut()
    }

    fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.words_mut()[..PAGE_HEADER_WORDS]);
    }

    fn set_index_word(&mut self, page_idx: u32, word: u32) {
        self.words_mut()[Self::index_offset(page_idx)] = word;
    }

    /// Formats this page as an empty variable page.
    ///
    /// Only the layout fields are reset; pool bookkeeping in the header
    /// (page id, list links, chunk chaining) is preserved.
    pub fn init(&mut self) {
        let mut header = self.header();
        header.page_type = PageType::VarPage;
        header.free_space = EMPTY_PAGE_FREE_SPACE;
        header.high_index = 1;
        header.insert_pos = 0;
        header.next_free_index = END_OF_FREE_LIST;
        self.set_header(&header);
    }

    /// Returns the words of an entry for writing.
    ///
    /// # Panics
    ///
    /// Panics if the entry extends past the page.
    pub fn get_ptr_mut(&mut self, page_idx: u32) -> &mut [u32] {
        let word = self.index_word(page_idx);
        let start = Self::data_offset(entry_pos(word));
        &mut self.words_mut()[start..start + entry_len(word) as usize]
    }

    /// Reads an entry by slot number for writing.
    pub fn read_mut(&mut self, page_idx: u32) -> Option<&mut [u32]> {
        if self.is_live(page_idx) {
            Some(self.get_ptr_mut(page_idx))
        } else {
            None
        }
    }

    /// Returns the contiguous free area starting at the insert position.
    pub fn get_free_space_ptr(&mut self) -> &mut [u32] {
        let header = self.header();
        let start = Self::data_offset(header.insert_pos);
        let end = Self::data_offset(DATA_WORDS as u32 - header.high_index);
        &mut self.words_mut()[start..end.max(start)]
    }

    /// Carves out an entry of `size` words and returns its slot number.
    ///
    /// A freed slot is reused when one exists; otherwise the index array
    /// grows by one word. When the contiguous gap is too small the page is
    /// reorganized first, using `scratch` as working space.
    ///
    /// # Errors
    ///
    /// Returns `PageError::PageFull` if free space cannot hold the entry
    /// (plus a new index slot when one is needed).
    pub fn alloc_record(&mut self, size: u32, scratch: &mut [u32]) -> Result<u32, PageError> {
        let mut header = self.header();
        let new_index = header.next_free_index == END_OF_FREE_LIST;
        let required = size + u32::from(new_index);
        if header.free_space < required {
            return Err(PageError::PageFull {
                required,
                available: header.free_space,
            });
        }

        if size > self.largest_contiguous() {
            self.reorg(scratch);
            header = self.header();
            debug_assert!(size <= self.largest_contiguous());
        }

        let page_idx = if new_index {
            let page_idx = header.high_index;
            header.high_index += 1;
            header.free_space -= 1;
            page_idx
        } else {
            // Reuse the head of the free slot chain (O(1))
            let page_idx = header.next_free_index;
            let word = self.index_word(page_idx);
            debug_assert!(word & FREE != 0);
            header.next_free_index = word & POS_MASK;
            page_idx
        };

        let pos = header.insert_pos;
        header.insert_pos += size;
        header.free_space -= size;
        self.set_header(&header);
        self.set_index_word(page_idx, pos | (size << LEN_SHIFT));

        Ok(page_idx)
    }

    /// Frees an entry and returns the page's new free space.
    ///
    /// # Errors
    ///
    /// Returns `PageError::SlotNotFound` if the slot doesn't exist or is
    /// already freed.
    pub fn free_record(&mut self, page_idx: u32) -> Result<u32, PageError> {
        if !self.is_live(page_idx) {
            return Err(PageError::SlotNotFound(page_idx));
        }

        let word = self.index_word(page_idx);
        let pos = entry_pos(word);
        let len = entry_len(word);

        let mut header = self.header();
        if page_idx + 1 == header.high_index {
            self.rebuild_index(page_idx);
        } else {
            self.set_index_word(page_idx, FREE | header.next_free_index);
            header.next_free_index = page_idx;
            self.set_header(&header);
        }

        let mut header = self.header();
        header.free_space += len;
        if pos + len == header.insert_pos {
            header.insert_pos -= len;
        }
        self.set_header(&header);

        Ok(header.free_space)
    }

    /// Drops the highest slot together with any freed slots directly below
    /// it, then rebuilds the free slot chain over what remains.
    fn rebuild_index(&mut self, page_idx: u32) {
        let mut header = self.header();

        let mut empty = 1;
        let mut idx = page_idx - 1;
        while idx >= 1 && self.index_word(idx) & FREE != 0 {
            empty += 1;
            idx -= 1;
        }

        if idx == 0 {
            // Totally free page
            header.high_index = 1;
            header.insert_pos = 0;
            header.free_space += empty;
            header.next_free_index = END_OF_FREE_LIST;
            self.set_header(&header);
            return;
        }

        // Chain ordered from lowest to highest slot number
        let mut next = END_OF_FREE_LIST;
        for k in (1..idx).rev() {
            if self.index_word(k) & FREE != 0 {
                self.set_index_word(k, FREE | next);
                next = k;
            }
        }

        header.high_index -= empty;
        header.free_space += empty;
        header.next_free_index = next;
        self.set_header(&header);
    }

    /// Compacts the page by removing gaps between entries.
    ///
    /// Live entries are copied out to `scratch` and written back
    /// contiguously from the start of the data area; slot numbers do not
    /// change. Zero-length entries keep their slot but are not moved.
    ///
    /// # Panics
    ///
    /// Panics if `scratch` is shorter than the used part of the data area.
    pub fn reorg(&mut self, scratch: &mut [u32]) {
        let mut header = self.header();
        let old_insert_pos = header.insert_pos as usize;
        let base = Self::data_offset(0);
        scratch[..old_insert_pos].copy_from_slice(&self.words()[base..base + old_insert_pos]);

        let mut new_insert_pos = 0u32;
        for idx in (1..header.high_index).rev() {
            let word = self.index_word(idx);
            let len = entry_len(word);
            if word & FREE == 0 && len > 0 {
                let pos = entry_pos(word) as usize;
                debug_assert!(pos + len as usize <= old_insert_pos);
                self.set_index_word(idx, (word & !POS_MASK) | new_insert_pos);

                let dst = Self::data_offset(new_insert_pos);
                let len = len as usize;
                self.words_mut()[dst..dst + len].copy_from_slice(&scratch[pos..pos + len]);
                new_insert_pos += len as u32;
            }
        }

        header.insert_pos = new_insert_pos;
        self.set_header(&header);
    }

    /// Extends the last entry in place.
    ///
    /// # Panics
    ///
    /// Panics if the entry is not the last one or free space is short;
    /// callers check [`is_space_behind_entry`](Self::is_space_behind_entry)
    /// first.
    pub fn grow_entry(&mut self, page_idx: u32, growth_len: u32) {
        let mut header = self.header();
        let word = self.index_word(page_idx);
        assert!(header.free_space >= growth_len, "grow_entry beyond free space");
        assert!(word & FREE == 0, "grow_entry on freed slot {}", page_idx);
        assert_eq!(
            entry_pos(word) + entry_len(word),
            header.insert_pos,
            "grow_entry on slot {} which is not the last entry",
            page_idx
        );

        self.set_index_word(page_idx, word + (growth_len << LEN_SHIFT));
        header.insert_pos += growth_len;
        header.free_space -= growth_len;
        self.set_header(&header);
    }

    /// Shrinks an entry in place to `new_size` words.
    ///
    /// The released words are counted as free; they become contiguous
    /// immediately only when the entry is the last one.
    pub fn shrink_entry(&mut self, page_idx: u32, new_size: u32) {
        let mut header = self.header();
        let word = self.index_word(page_idx);
        let old_pos = entry_pos(word);
        let old_size = entry_len(word);
        assert!(word & FREE == 0, "shrink_entry on freed slot {}", page_idx);
        assert!(old_size >= new_size, "shrink_entry cannot grow");

        self.set_index_word(page_idx, (word & !LEN_MASK) | (new_size << LEN_SHIFT));
        let shrink = old_size - new_size;
        header.free_space += shrink;
        if header.insert_pos == old_pos + old_size {
            header.insert_pos -= shrink;
        }
        self.set_header(&header);
    }

    /// Rewrites the data-area offset of an entry.
    pub fn set_entry_offset(&mut self, page_idx: u32, offset: u32) {
        let word = self.index_word(page_idx);
        self.set_index_word(page_idx, (word & !POS_MASK) | offset);
    }

    /// Rewrites the length of an entry without touching free space.
    pub fn set_entry_len(&mut self, page_idx: u32, len: u32) {
        let word = self.index_word(page_idx);
        self.set_index_word(page_idx, (word & !LEN_MASK) | (len << LEN_SHIFT));
    }

    /// Returns words to free space after an entry was detached with
    /// [`set_entry_len`](Self::set_entry_len).
    pub fn credit_free_space(&mut self, words: u32) {
        let mut header = self.header();
        header.free_space += words;
        self.set_header(&header);
    }
}
