//! Fixed-part allocation seam.

use std::collections::{BTreeSet, HashMap};

use super::key::{LocalKey, VarPartRef};
use crate::storage::PageId;

/// Fixed-part record allocator used when pairing fixed and variable parts.
///
/// Each fixed part carries a [`VarPartRef`] in its header. Implementations
/// own the fixed-part pages; the variable-part allocator only reads and
/// writes that reference.
pub trait FixedPartStore {
    /// Allocates a fixed part at any free row id.
    ///
    /// Returns `None` when the store is out of space.
    fn alloc_fix_rec(&mut self) -> Option<LocalKey>;

    /// Allocates the fixed part at a caller-chosen row id.
    ///
    /// Returns `false` if the row id is taken or out of space.
    fn alloc_fix_rowid(&mut self, key: LocalKey) -> bool;

    /// Frees a fixed part.
    fn free_fix_rec(&mut self, key: LocalKey);

    /// Reads the variable-part reference of a fixed part.
    fn var_part_ref(&self, key: LocalKey) -> Option<VarPartRef>;

    /// Stores the variable-part reference of a fixed part.
    fn set_var_part_ref(&mut self, key: LocalKey, var_ref: VarPartRef);
}

/// Words in a fixed part: one header word followed by the reference.
const FIX_REC_WORDS: usize = 1 + VarPartRef::SZ32;

/// Offset of the variable-part reference within a fixed part.
const VAR_REF_OFFSET: usize = 1;

/// In-memory fixed-part store.
///
/// Rows are numbered densely and laid out `rows_per_page` to a page. An
/// optional row limit makes the store run out of space on demand, which is
/// useful for exercising rollback paths.
pub struct MemoryFixedParts {
    rows: HashMap<LocalKey, [u32; FIX_REC_WORDS]>,
    /// Row numbers below `next_row` that were freed.
    free_rows: BTreeSet<u32>,
    next_row: u32,
    rows_per_page: u32,
    max_rows: Option<u32>,
}

impl MemoryFixedParts {
    /// Default number of fixed parts per page.
    pub const DEFAULT_ROWS_PER_PAGE: u32 = 256;

    /// Creates an unlimited store.
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
            free_rows: BTreeSet::new(),
            next_row: 0,
            rows_per_page: Self::DEFAULT_ROWS_PER_PAGE,
            max_rows: None,
        }
    }

    /// Creates a store holding at most `max_rows` fixed parts.
    pub fn with_max_rows(max_rows: u32) -> Self {
        Self {
            max_rows: Some(max_rows),
            ..Self::new()
        }
    }

    /// Returns the number of allocated fixed parts.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no fixed part is allocated.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns true if `key` names an allocated fixed part.
    pub fn contains(&self, key: LocalKey) -> bool {
        self.rows.contains_key(&key)
    }

    fn key_of(&self, row: u32) -> LocalKey {
        LocalKey::new(PageId::new(row / self.rows_per_page), row % self.rows_per_page)
    }

    fn row_of(&self, key: LocalKey) -> Option<u32> {
        if key.page_idx >= self.rows_per_page {
            return None;
        }
        key.page_no
            .page_num()
            .checked_mul(self.rows_per_page)?
            .checked_add(key.page_idx)
    }

    fn has_room(&self) -> bool {
        self.max_rows
            .is_none_or(|max| (self.rows.len() as u32) < max)
    }

    fn insert_row(&mut self, key: LocalKey) {
        let mut words = [0u32; FIX_REC_WORDS];
        VarPartRef::null().write_to(&mut words[VAR_REF_OFFSET..]);
        self.rows.insert(key, words);
    }
}

impl Default for MemoryFixedParts {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedPartStore for MemoryFixedParts {
    fn alloc_fix_rec(&mut self) -> Option<LocalKey> {
        if !self.has_room() {
            return None;
        }
        let row = match self.free_rows.pop_first() {
            Some(row) => row,
            None => {
                let row = self.next_row;
                self.next_row = self.next_row.checked_add(1)?;
                row
            }
        };
        let key = self.key_of(row);
        self.insert_row(key);
        Some(key)
    }

    fn alloc_fix_rowid(&mut self, key: LocalKey) -> bool {
        if !self.has_room() || self.rows.contains_key(&key) {
            return false;
        }
        let Some(row) = self.row_of(key) else {
            return false;
        };

        if row >= self.next_row {
            self.free_rows.extend(self.next_row..row);
            self.next_row = row + 1;
        } else {
            self.free_rows.remove(&row);
        }
        self.insert_row(key);
        true
    }

    fn free_fix_rec(&mut self, key: LocalKey) {
        if self.rows.remove(&key).is_some()
            && let Some(row) = self.row_of(key)
        {
            self.free_rows.insert(row);
        }
    }

    fn var_part_ref(&self, key: LocalKey) -> Option<VarPartRef> {
        self.rows
            .get(&key)
            .map(|words| VarPartRef::read_from(&words[VAR_REF_OFFSET..]))
    }

    fn set_var_part_ref(&mut self, key: LocalKey, var_ref: VarPartRef) {
        if let Some(words) = self.rows.get_mut(&key) {
            var_ref.write_to(&mut words[VAR_REF_OFFSET..]);
        }
    }
}
