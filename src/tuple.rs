//! Row references and the fixed-part seam.
//!
//! This module provides:
//! - [`LocalKey`]: a `(page_no, page_idx)` slot reference
//! - [`VarPartRef`]: the variable-part reference stored inside a fixed part
//! - [`FixedPartStore`]: the fixed-part allocator the record pairing uses
//! - [`MemoryFixedParts`]: an in-memory [`FixedPartStore`]

mod fixed;
mod key;

pub use fixed::{FixedPartStore, MemoryFixedParts};
pub use key::{LocalKey, VarPartRef};
