//! Growing and shrinking variable parts.

use tracing::debug;

use super::allocator::VarAllocator;
use super::error::AllocError;
use super::fragment::Fragment;
use crate::tuple::{LocalKey, VarPartRef};
use crate::varpage::{PageError, VarPage};

impl VarAllocator {
    /// Resizes the variable part `var_ref` points at from `old_size` to
    /// `new_size` words and returns its words.
    ///
    /// The part keeps its key when the page has room: it is extended in
    /// place, or the page is reorganized so the part ends up last. When the
    /// page is too full the part moves to another page and `var_ref` is
    /// rewritten. The first `min(old_size, new_size)` words are preserved.
    ///
    /// # Errors
    ///
    /// - `AllocError::MissingVarPart` if `var_ref` is null.
    /// - `AllocError::EntrySizeMismatch` if the stored part is not
    ///   `old_size` words long.
    /// - `AllocError::OutOfPages` if the part must move and no page is
    ///   available. The old part is left untouched.
    pub fn realloc_var_part<'f>(
        &mut self,
        frag: &'f mut Fragment,
        var_ref: &mut VarPartRef,
        old_size: u32,
        new_size: u32,
    ) -> Result<&'f mut [u32], AllocError> {
        self.check_size(new_size)?;
        let key = var_ref.copyout().ok_or(AllocError::MissingVarPart)?;
        let page_id = key.page_no;
        let idx = key.page_idx;

        let free_space = {
            let page = frag
                .pages
                .get(page_id)
                .ok_or(AllocError::PageNotFound(page_id))?;
            let view = VarPage::new(page);
            if !view.is_live(idx) {
                return Err(PageError::SlotNotFound(idx).into());
            }
            let actual = view.get_entry_len(idx);
            if actual != old_size {
                return Err(AllocError::EntrySizeMismatch {
                    expected: old_size,
                    actual,
                });
            }
            view.free_space()
        };

        if new_size == old_size {
            return frag.var_part_mut(key).ok_or(AllocError::PageNotFound(page_id));
        }

        if new_size < old_size {
            if let Some(page) = frag.pages.get_mut(page_id) {
                VarPage::new(page).shrink_entry(idx, new_size);
            }
            self.update_free_page_list(frag, page_id);
            return frag.var_part_mut(key).ok_or(AllocError::PageNotFound(page_id));
        }

        let delta = new_size - old_size;
        if free_space >= delta {
            self.grow_in_page(frag, key, old_size, delta)?;
            self.update_free_page_list(frag, page_id);
            return frag.var_part_mut(key).ok_or(AllocError::PageNotFound(page_id));
        }

        let new_key = self.relocate(frag, key, old_size, new_size)?;
        var_ref.assign(new_key);
        frag.var_part_mut(new_key)
            .ok_or(AllocError::PageNotFound(new_key.page_no))
    }

    /// Grows a part by `delta` words within its own page.
    fn grow_in_page(
        &mut self,
        frag: &mut Fragment,
        key: LocalKey,
        old_size: u32,
        delta: u32,
    ) -> Result<(), AllocError> {
        let page = frag
            .pages
            .get_mut(key.page_no)
            .ok_or(AllocError::PageNotFound(key.page_no))?;
        let mut view = VarPage::new(page);
        let idx = key.page_idx;

        if view.is_space_behind_entry(idx, delta) {
            view.grow_entry(idx, delta);
            return Ok(());
        }

        debug!(
            page = key.page_no.page_num(),
            slot = idx,
            old_size,
            delta,
            "reorganizing page to grow entry"
        );

        let old_len = old_size as usize;
        let saved = &mut self.copy_buffer[..old_len];
        saved.copy_from_slice(view.get_ptr(idx));

        // Detach the entry so reorg leaves a gap-free page without it
        view.set_entry_len(idx, 0);
        view.credit_free_space(old_size);
        view.reorg(&mut self.scratch);

        let insert_pos = view.insert_pos();
        view.get_free_space_ptr()[..old_len].copy_from_slice(saved);
        view.set_entry_offset(idx, insert_pos);
        view.grow_entry(idx, old_size + delta);
        Ok(())
    }

    /// Moves a part to a page with room for `new_size` words and frees the
    /// old slot.
    fn relocate(
        &mut self,
        frag: &mut Fragment,
        key: LocalKey,
        old_size: u32,
        new_size: u32,
    ) -> Result<LocalKey, AllocError> {
        let old_len = old_size as usize;
        let old_data = frag.var_part(key).ok_or(AllocError::PageNotFound(key.page_no))?;
        self.copy_buffer[..old_len].copy_from_slice(old_data);

        let new_key = self.alloc_var_part(frag, new_size)?.0;
        assert_ne!(
            new_key.page_no, key.page_no,
            "relocated entry landed on its own page"
        );

        let new_data = frag
            .var_part_mut(new_key)
            .ok_or(AllocError::PageNotFound(new_key.page_no))?;
        new_data[..old_len].copy_from_slice(&self.copy_buffer[..old_len]);

        if let Some(page) = frag.pages.get_mut(key.page_no) {
            VarPage::new(page).free_record(key.page_idx)?;
        }
        self.update_free_page_list(frag, key.page_no);

        debug!(
            from = %key,
            to = %new_key,
            old_size,
            new_size,
            "relocated variable part"
        );
        Ok(new_key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::alloc::VarAllocConfig;
    use crate::storage::{ListState, PagePool};

    fn allocator() -> VarAllocator {
        VarAllocator::new(VarAllocConfig::default(), Arc::new(PagePool::new())).unwrap()
    }

    fn alloc_filled(
        alloc: &mut VarAllocator,
        frag: &mut Fragment,
        size: u32,
        fill: u32,
    ) -> VarPartRef {
        let (key, data) = alloc.alloc_var_part(frag, size).unwrap();
        data.fill(fill);
        VarPartRef::new(key)
    }

    fn key_of(var_ref: &VarPartRef) -> LocalKey {
        var_ref.copyout().unwrap()
    }

    #[test]
    fn test_same_size_is_noop() {
        let mut alloc = allocator();
        let mut frag = alloc.new_fragment();
        let mut var_ref = alloc_filled(&mut alloc, &mut frag, 50, 7);
        let key = key_of(&var_ref);
        let free_before = frag.free_space(key.page_no);

        let data = alloc.realloc_var_part(&mut frag, &mut var_ref, 50, 50).unwrap();
        assert_eq!(data, &[7; 50][..]);

        assert_eq!(key_of(&var_ref), key);
        assert_eq!(frag.free_space(key.page_no), free_before);
    }

    #[test]
    fn test_grow_last_entry_in_place() {
        let mut alloc = allocator();
        let mut frag = alloc.new_fragment();
        let mut var_ref = alloc_filled(&mut alloc, &mut frag, 10, 3);
        let key = key_of(&var_ref);

        let data = alloc.realloc_var_part(&mut frag, &mut var_ref, 10, 25).unwrap();
        assert_eq!(data.len(), 25);
        assert_eq!(&data[..10], &[3; 10]);

        assert_eq!(key_of(&var_ref), key);
        // 8159 - 1 - 25
        assert_eq!(frag.free_space(key.page_no), Some(8133));
    }

    #[test]
    fn test_grow_with_reorg_preserves_payload() {
        let mut alloc = allocator();
        let mut frag = alloc.new_fragment();
        let mut a = alloc_filled(&mut alloc, &mut frag, 100, 1);
        let b = alloc_filled(&mut alloc, &mut frag, 100, 2);
        let c = alloc_filled(&mut alloc, &mut frag, 100, 3);
        let page_id = key_of(&a).page_no;
        for (i, word) in frag.var_part_mut(key_of(&a)).unwrap().iter_mut().enumerate() {
            *word = i as u32;
        }
        let before: Vec<u32> = frag.var_part(key_of(&a)).unwrap().to_vec();
        let free_before = frag.free_space(page_id).unwrap();

        // a is not the last entry, so growing it forces a reorg
        let data = alloc.realloc_var_part(&mut frag, &mut a, 100, 150).unwrap();
        assert_eq!(&data[..100], before.as_slice());

        assert_eq!(key_of(&a).page_no, page_id);
        assert_eq!(frag.free_space(page_id), Some(free_before - 50));
        assert_eq!(frag.var_part(key_of(&b)).unwrap(), &[2; 100][..]);
        assert_eq!(frag.var_part(key_of(&c)).unwrap(), &[3; 100][..]);

        let page = frag.page(page_id).unwrap();
        assert_eq!(page.insert_pos(), 350);
        assert_eq!(page.get_entry_pos(key_of(&a).page_idx), 200);
    }

    #[test]
    fn test_shrink_in_place() {
        let mut alloc = allocator();
        let mut frag = alloc.new_fragment();
        let mut a = alloc_filled(&mut alloc, &mut frag, 40, 9);
        let _b = alloc_filled(&mut alloc, &mut frag, 40, 8);
        let key = key_of(&a);
        let free_before = frag.free_space(key.page_no).unwrap();

        let data = alloc.realloc_var_part(&mut frag, &mut a, 40, 15).unwrap();
        assert_eq!(data, &[9; 15][..]);

        assert_eq!(key_of(&a), key);
        assert_eq!(frag.free_space(key.page_no), Some(free_before + 25));
    }

    #[test]
    fn test_relocate_when_page_full() {
        let mut alloc = allocator();
        let mut frag = alloc.new_fragment();
        let mut a = alloc_filled(&mut alloc, &mut frag, 3000, 4);
        let _b = alloc_filled(&mut alloc, &mut frag, 4000, 5);
        let old_key = key_of(&a);
        assert_eq!(key_of(&_b).page_no, old_key.page_no);

        // 8159 - 3001 - 4001 = 1157 free, not enough for +2000
        let data = alloc.realloc_var_part(&mut frag, &mut a, 3000, 5000).unwrap();
        assert_eq!(data.len(), 5000);
        assert_eq!(&data[..3000], &[4; 3000][..]);

        let new_key = key_of(&a);
        assert_ne!(new_key.page_no, old_key.page_no);
        assert!(frag.var_part(old_key).is_none());
        // 1157 + 3000 = 4157
        assert_eq!(frag.free_space(old_key.page_no), Some(4157));
        assert_eq!(frag.list_state(old_key.page_no), Some(ListState::InBucket(3)));
    }

    #[test]
    fn test_relocate_failure_keeps_old_part() {
        let pool = Arc::new(PagePool::with_max_pages(1));
        let mut alloc = VarAllocator::new(VarAllocConfig::default(), pool).unwrap();
        let mut frag = alloc.new_fragment();
        let mut a = alloc_filled(&mut alloc, &mut frag, 3000, 4);
        let _b = alloc_filled(&mut alloc, &mut frag, 4000, 5);
        let key = key_of(&a);
        let free_before = frag.free_space(key.page_no);

        let result = alloc.realloc_var_part(&mut frag, &mut a, 3000, 5000);
        assert!(matches!(result, Err(AllocError::OutOfPages)));

        assert_eq!(key_of(&a), key);
        assert_eq!(frag.var_part(key).unwrap(), &[4; 3000][..]);
        assert_eq!(frag.free_space(key.page_no), free_before);
    }

    #[test]
    fn test_size_mismatch() {
        let mut alloc = allocator();
        let mut frag = alloc.new_fragment();
        let mut a = alloc_filled(&mut alloc, &mut frag, 10, 0);

        let result = alloc.realloc_var_part(&mut frag, &mut a, 11, 20);
        assert_eq!(
            result.err(),
            Some(AllocError::EntrySizeMismatch {
                expected: 11,
                actual: 10
            })
        );
    }

    #[test]
    fn test_null_reference() {
        let mut alloc = allocator();
        let mut frag = alloc.new_fragment();
        let mut var_ref = VarPartRef::null();

        let result = alloc.realloc_var_part(&mut frag, &mut var_ref, 10, 20);
        assert_eq!(result.err(), Some(AllocError::MissingVarPart));
    }
}
