//! Rows made of a fixed part and a variable part.
//!
//! Both parts are allocated together or not at all: when the variable part
//! cannot be placed, the fixed part reserved for it is freed again.

use super::allocator::VarAllocator;
use super::error::AllocError;
use super::fragment::Fragment;
use crate::tuple::{FixedPartStore, LocalKey, VarPartRef};

impl VarAllocator {
    /// Allocates a row with a variable part of `size` words.
    ///
    /// Returns the key of the fixed part, whose reference points at the new
    /// variable part.
    pub fn alloc_var_rec<F: FixedPartStore>(
        &mut self,
        frag: &mut Fragment,
        fixed: &mut F,
        size: u32,
    ) -> Result<LocalKey, AllocError> {
        self.check_size(size)?;
        let key = fixed.alloc_fix_rec().ok_or(AllocError::FixedPartExhausted)?;
        self.attach_var_part(frag, fixed, key, size)?;
        Ok(key)
    }

    /// Allocates a row at the fixed-part row id `key`.
    pub fn alloc_var_rowid<F: FixedPartStore>(
        &mut self,
        frag: &mut Fragment,
        fixed: &mut F,
        key: LocalKey,
        size: u32,
    ) -> Result<(), AllocError> {
        self.check_size(size)?;
        if !fixed.alloc_fix_rowid(key) {
            return Err(AllocError::RowIdUnavailable(key));
        }
        self.attach_var_part(frag, fixed, key, size)
    }

    /// Frees a row: its fixed part and the variable part it references.
    pub fn free_var_rec<F: FixedPartStore>(
        &self,
        frag: &mut Fragment,
        fixed: &mut F,
        key: LocalKey,
    ) -> Result<(), AllocError> {
        let var_key = fixed
            .var_part_ref(key)
            .and_then(|r| r.copyout())
            .ok_or(AllocError::MissingVarPart)?;
        if frag.var_part(var_key).is_none() {
            return Err(AllocError::PageNotFound(var_key.page_no));
        }

        fixed.free_fix_rec(key);
        self.free_var_part(frag, var_key)
    }

    /// Resizes the variable part of a row, updating the row's reference if
    /// the part moves.
    pub fn realloc_var_rec<'f, F: FixedPartStore>(
        &mut self,
        frag: &'f mut Fragment,
        fixed: &mut F,
        key: LocalKey,
        old_size: u32,
        new_size: u32,
    ) -> Result<&'f mut [u32], AllocError> {
        let mut var_ref = fixed.var_part_ref(key).ok_or(AllocError::MissingVarPart)?;
        let before = var_ref;
        let data = self.realloc_var_part(frag, &mut var_ref, old_size, new_size)?;
        if var_ref != before {
            fixed.set_var_part_ref(key, var_ref);
        }
        Ok(data)
    }

    /// Allocates the variable part of a freshly reserved fixed part, or
    /// frees the fixed part if that fails.
    fn attach_var_part<F: FixedPartStore>(
        &mut self,
        frag: &mut Fragment,
        fixed: &mut F,
        key: LocalKey,
        size: u32,
    ) -> Result<(), AllocError> {
        match self.alloc_var_part(frag, size) {
            Ok((var_key, _)) => {
                fixed.set_var_part_ref(key, VarPartRef::new(var_key));
                Ok(())
            }
            Err(e) => {
                fixed.free_fix_rec(key);
                Err(e)
            }
        }
    }
}
