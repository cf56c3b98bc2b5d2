//! Slot references.

use crate::storage::PageId;

/// Global identifier for a slot (page + in-page index).
///
/// `page_idx` is only meaningful to the page layout that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalKey {
    /// Page containing the slot.
    pub page_no: PageId,
    /// Index of the slot within the page.
    pub page_idx: u32,
}

impl LocalKey {
    /// Creates a new slot reference.
    pub fn new(page_no: PageId, page_idx: u32) -> Self {
        Self { page_no, page_idx }
    }
}

impl std::fmt::Display for LocalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.page_no.page_num(), self.page_idx)
    }
}

/// Reference from a fixed part to its variable part.
///
/// Stored as two words inside the fixed part. An all-ones page word means
/// the row has no variable part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarPartRef {
    words: [u32; 2],
}

impl VarPartRef {
    /// Size of the reference in words.
    pub const SZ32: usize = 2;

    const NULL_PAGE: u32 = u32::MAX;

    /// Creates a reference that points nowhere.
    pub const fn null() -> Self {
        Self {
            words: [Self::NULL_PAGE, 0],
        }
    }

    /// Creates a reference to `key`.
    pub fn new(key: LocalKey) -> Self {
        let mut r = Self::null();
        r.assign(key);
        r
    }

    /// Points the reference at `key`.
    pub fn assign(&mut self, key: LocalKey) {
        self.words = [key.page_no.page_num(), key.page_idx];
    }

    /// Returns the referenced slot, if any.
    pub fn copyout(&self) -> Option<LocalKey> {
        if self.is_null() {
            None
        } else {
            Some(LocalKey::new(PageId::new(self.words[0]), self.words[1]))
        }
    }

    /// Clears the reference.
    pub fn clear(&mut self) {
        *self = Self::null();
    }

    /// Returns true if the reference points nowhere.
    pub fn is_null(&self) -> bool {
        self.words[0] == Self::NULL_PAGE
    }

    /// Reads a reference from fixed-part words.
    pub fn read_from(data: &[u32]) -> Self {
        Self {
            words: [data[0], data[1]],
        }
    }

    /// Writes the reference into fixed-part words.
    pub fn write_to(&self, data: &mut [u32]) {
        data[..Self::SZ32].copy_from_slice(&self.words);
    }
}

impl Default for VarPartRef {
    fn default() -> Self {
        Self::null()
    }
}
