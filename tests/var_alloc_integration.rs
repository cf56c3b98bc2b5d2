//! End-to-end tests of the variable-part allocator through the public API.

use std::sync::Arc;

use varalloc::alloc::{AllocError, VarAllocConfig, VarAllocator};
use varalloc::storage::{ListState, PagePool};
use varalloc::tuple::{FixedPartStore, MemoryFixedParts, VarPartRef};
use varalloc::varpage::EMPTY_PAGE_FREE_SPACE;

fn allocator(pool: &Arc<PagePool>) -> VarAllocator {
    VarAllocator::new(VarAllocConfig::default(), pool.clone()).unwrap()
}

#[test]
fn test_page_migrates_between_buckets() {
    let pool = Arc::new(PagePool::new());
    let mut alloc = allocator(&pool);
    let mut frag = alloc.new_fragment();

    let page_id = alloc.get_empty_page(&mut frag).unwrap();
    assert_eq!(alloc.bucket_for(EMPTY_PAGE_FREE_SPACE), 3);

    // The chunk's first page was handed out; the next allocation formats
    // the following one
    let (key, _) = alloc.alloc_var_part(&mut frag, 4100).unwrap();
    assert_eq!(key.page_no, page_id.offset(1));
    assert_eq!(frag.free_space(key.page_no), Some(4058));
    assert_eq!(frag.list_state(key.page_no), Some(ListState::InBucket(2)));

    alloc.free_var_part(&mut frag, key).unwrap();
    assert_eq!(frag.free_space(key.page_no), Some(EMPTY_PAGE_FREE_SPACE));
    assert_eq!(frag.list_state(key.page_no), Some(ListState::InBucket(3)));
}

#[test]
fn test_freed_page_stays_with_fragment() {
    let pool = Arc::new(PagePool::new());
    let mut alloc = allocator(&pool);
    let mut frag = alloc.new_fragment();

    let (a, _) = alloc.alloc_var_part(&mut frag, 100).unwrap();
    alloc.free_var_part(&mut frag, a).unwrap();

    assert_eq!(frag.var_page_count(), 10);
    assert_eq!(pool.pages_in_use(), 10);

    // The emptied page is reused before any new page is formatted
    let (b, _) = alloc.alloc_var_part(&mut frag, 100).unwrap();
    assert_eq!(b.page_no, a.page_no);
    assert_eq!(frag.empty_page_count(), 9);
}

#[test]
fn test_rows_grow_until_relocated() {
    let pool = Arc::new(PagePool::new());
    let mut alloc = allocator(&pool);
    let mut frag = alloc.new_fragment();
    let mut fixed = MemoryFixedParts::new();

    let rows: Vec<_> = (0..4)
        .map(|_| alloc.alloc_var_rec(&mut frag, &mut fixed, 1000).unwrap())
        .collect();
    for (i, &row) in rows.iter().enumerate() {
        let key = fixed.var_part_ref(row).unwrap().copyout().unwrap();
        frag.var_part_mut(key).unwrap().fill(i as u32);
    }
    let first_page = fixed.var_part_ref(rows[0]).unwrap().copyout().unwrap().page_no;

    // Grows in place through a reorg while the page has room
    let data = alloc
        .realloc_var_rec(&mut frag, &mut fixed, rows[0], 1000, 2000)
        .unwrap();
    assert!(data[..1000].iter().all(|&w| w == 0));
    let key = fixed.var_part_ref(rows[0]).unwrap().copyout().unwrap();
    assert_eq!(key.page_no, first_page);

    // Then moves once it does not
    let data = alloc
        .realloc_var_rec(&mut frag, &mut fixed, rows[0], 2000, 6000)
        .unwrap();
    assert!(data[..1000].iter().all(|&w| w == 0));
    let key = fixed.var_part_ref(rows[0]).unwrap().copyout().unwrap();
    assert_ne!(key.page_no, first_page);

    for (i, &row) in rows.iter().enumerate().skip(1) {
        let key = fixed.var_part_ref(row).unwrap().copyout().unwrap();
        assert!(frag.var_part(key).unwrap().iter().all(|&w| w == i as u32));
    }

    for row in rows {
        alloc.free_var_rec(&mut frag, &mut fixed, row).unwrap();
    }
    assert!(fixed.is_empty());
}

#[test]
fn test_fragments_share_pool() {
    let pool = Arc::new(PagePool::with_max_pages(15));
    let mut alloc = allocator(&pool);
    let mut first = alloc.new_fragment();
    let mut second = alloc.new_fragment();

    alloc.alloc_var_part(&mut first, 10).unwrap();
    alloc.alloc_var_part(&mut second, 10).unwrap();
    assert_eq!(first.var_page_count(), 10);
    assert_eq!(second.var_page_count(), 5);

    // One nearly full page per allocation drains the second chunk
    for _ in 0..5 {
        alloc.alloc_var_part(&mut second, 8000).unwrap();
    }
    assert!(matches!(
        alloc.alloc_var_part(&mut second, 8000),
        Err(AllocError::OutOfPages)
    ));

    alloc.release_fragment(first);
    assert_eq!(pool.pages_in_use(), 5);
    alloc.alloc_var_part(&mut second, 8000).unwrap();
    assert_eq!(second.var_page_count(), 15);
}

#[test]
fn test_realloc_missing_reference() {
    let pool = Arc::new(PagePool::new());
    let mut alloc = allocator(&pool);
    let mut frag = alloc.new_fragment();
    let mut var_ref = VarPartRef::null();

    let result = alloc.realloc_var_part(&mut frag, &mut var_ref, 1, 2);
    assert_eq!(result.err(), Some(AllocError::MissingVarPart));
}
