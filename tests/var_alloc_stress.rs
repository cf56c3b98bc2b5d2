//! Randomized allocator workload.
//!
//! Runs a seeded mix of allocations, frees, grows and shrinks against a
//! capacity-limited pool and checks after every operation that:
//! - every listed page sits in the bucket matching its free space
//! - pages below the free-space floor are in no bucket
//! - each page's free space matches its live entries
//! - every live variable part still holds the words written to it

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use varalloc::alloc::{AllocError, Fragment, VarAllocConfig, VarAllocator};
use varalloc::storage::{DATA_WORDS, ListState, PagePool, PageState};
use varalloc::tuple::VarPartRef;
use varalloc::varpage::MAX_VAR_PART_WORDS;

/// Configuration for the workload.
#[derive(Debug, Clone)]
struct TestConfig {
    seed: u64,
    /// Pool capacity; small enough that exhaustion happens.
    max_pages: u32,
    ops: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed_0001,
            max_pages: 40,
            ops: 3000,
        }
    }
}

/// A live variable part and the word it is filled with.
#[derive(Debug, Clone, Copy)]
struct Row {
    var_ref: VarPartRef,
    size: u32,
    tag: u32,
}

fn random_size(rng: &mut StdRng) -> u32 {
    match rng.gen_range(0..100) {
        0..70 => rng.gen_range(1..500),
        70..95 => rng.gen_range(500..3000),
        _ => rng.gen_range(3000..=MAX_VAR_PART_WORDS),
    }
}

fn check_invariants(alloc: &VarAllocator, frag: &Fragment) {
    let config = alloc.config();
    let floor = alloc.free_space_floor();

    let mut listed = HashSet::new();
    for bucket in 0..frag.list_count() {
        for page_id in frag.free_list_pages(bucket) {
            let free = frag.free_space(page_id).unwrap();
            assert_eq!(frag.list_state(page_id), Some(ListState::InBucket(bucket)));
            assert!(
                config.free_lists[bucket].contains(free),
                "{} with {} free in bucket {}",
                page_id,
                free,
                bucket
            );
            assert!(free >= floor);
            assert!(listed.insert(page_id), "{} listed twice", page_id);
        }
    }

    for page_id in frag.page_ids() {
        let page = frag.page(page_id).unwrap();
        let header = page.header();
        if header.page_state != PageState::InUse {
            continue;
        }

        match header.list_state {
            ListState::InBucket(_) => assert!(listed.contains(&page_id)),
            ListState::Unlisted => assert!(!listed.contains(&page_id)),
        }
        if header.free_space < floor {
            assert_eq!(header.list_state, ListState::Unlisted);
        }

        let live: u32 = page.iter().map(|(_, data)| data.len() as u32).sum();
        assert_eq!(
            header.free_space,
            DATA_WORDS as u32 - header.high_index - live,
            "free space accounting on {}",
            page_id
        );
    }
}

fn check_rows(frag: &Fragment, rows: &HashMap<u32, Row>) {
    for (id, row) in rows {
        let key = row.var_ref.copyout().unwrap();
        let data = frag.var_part(key).unwrap();
        assert_eq!(data.len(), row.size as usize, "row {}", id);
        assert!(data.iter().all(|&w| w == row.tag), "row {} payload", id);
    }
}

#[test]
fn test_random_workload_keeps_lists_consistent() {
    let config = TestConfig::default();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let pool = Arc::new(PagePool::with_max_pages(config.max_pages));
    let mut alloc = VarAllocator::new(VarAllocConfig::default(), pool.clone()).unwrap();
    let mut frag = alloc.new_fragment();

    let mut rows: HashMap<u32, Row> = HashMap::new();
    let mut next_id = 0u32;
    let mut out_of_pages = 0;

    for _ in 0..config.ops {
        let op = rng.gen_range(0..10);
        if rows.is_empty() || op < 4 {
            let size = random_size(&mut rng);
            match alloc.alloc_var_part(&mut frag, size) {
                Ok((key, data)) => {
                    let tag = next_id;
                    data.fill(tag);
                    rows.insert(
                        next_id,
                        Row {
                            var_ref: VarPartRef::new(key),
                            size,
                            tag,
                        },
                    );
                    next_id += 1;
                }
                Err(AllocError::OutOfPages) => out_of_pages += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        } else {
            let ids: Vec<u32> = rows.keys().copied().collect();
            let id = ids[rng.gen_range(0..ids.len())];

            if op < 7 {
                let row = rows.remove(&id).unwrap();
                let key = row.var_ref.copyout().unwrap();
                alloc.free_var_part(&mut frag, key).unwrap();
            } else {
                let row = rows.get_mut(&id).unwrap();
                let new_size = random_size(&mut rng);
                match alloc.realloc_var_part(&mut frag, &mut row.var_ref, row.size, new_size) {
                    Ok(data) => {
                        let kept = row.size.min(new_size) as usize;
                        assert!(data[..kept].iter().all(|&w| w == row.tag));
                        data.fill(row.tag);
                        row.size = new_size;
                    }
                    Err(AllocError::OutOfPages) => out_of_pages += 1,
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
        }

        check_invariants(&alloc, &frag);
    }

    check_rows(&frag, &rows);
    assert!(out_of_pages > 0, "workload never exhausted the pool");
    assert!(pool.pages_in_use() <= config.max_pages);

    for row in rows.values() {
        let key = row.var_ref.copyout().unwrap();
        alloc.free_var_part(&mut frag, key).unwrap();
    }
    check_invariants(&alloc, &frag);

    alloc.release_fragment(frag);
    assert_eq!(pool.pages_in_use(), 0);
}

#[test]
fn test_random_workload_ascending_buckets() {
    let mut rng = StdRng::seed_from_u64(42);
    let config = VarAllocConfig::with_free_lists(&[
        (0, 199),
        (200, 499),
        (500, 999),
        (1000, 4079),
        (4080, 8159),
    ]);
    let mut alloc = VarAllocator::new(config, Arc::new(PagePool::new())).unwrap();
    let mut frag = alloc.new_fragment();
    let mut rows: HashMap<u32, Row> = HashMap::new();

    for id in 0..500u32 {
        if rng.gen_bool(0.3) && !rows.is_empty() {
            let victim = *rows.keys().next().unwrap();
            let row = rows.remove(&victim).unwrap();
            alloc
                .free_var_part(&mut frag, row.var_ref.copyout().unwrap())
                .unwrap();
        }

        let size = random_size(&mut rng);
        let (key, data) = alloc.alloc_var_part(&mut frag, size).unwrap();
        data.fill(id);
        rows.insert(
            id,
            Row {
                var_ref: VarPartRef::new(key),
                size,
                tag: id,
            },
        );
        check_invariants(&alloc, &frag);
    }

    check_rows(&frag, &rows);
}
