//! Process-wide page pool.
//!
//! The pool owns the page id space and the capacity limit. It hands out
//! runs of consecutive page ids; the page buffers themselves are created
//! and owned by the caller's [`PageMap`](super::PageMap).

use parking_lot::Mutex;

use crate::storage::{PageId, StorageError};

/// A run of consecutive page ids granted by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRun {
    /// First page of the run.
    pub first: PageId,
    /// Number of pages in the run (at least 1).
    pub count: u32,
}

impl PageRun {
    /// Returns the page ids of the run in ascending order.
    pub fn pages(self) -> impl Iterator<Item = PageId> {
        (0..self.count).map(move |i| self.first.offset(i))
    }

    /// Returns the last page of the run.
    pub fn last(&self) -> PageId {
        self.first.offset(self.count - 1)
    }
}

/// Internal state protected by a single mutex so that capacity accounting
/// and id assignment stay atomic.
struct PoolState {
    /// Next never-used page number.
    next_page_no: u32,
    /// Released runs available for reuse, sorted by first page.
    free_runs: Vec<PageRun>,
    /// Pages currently granted to callers.
    in_use: u32,
}

/// Shared page pool.
///
/// # Concurrency
///
/// Safe to share via `Arc<PagePool>`. Every operation takes the state
/// mutex for a short, non-blocking critical section.
pub struct PagePool {
    state: Mutex<PoolState>,
    /// Optional maximum number of pages in use at once.
    max_pages: Option<u32>,
}

impl PagePool {
    /// Creates a pool without a capacity limit.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PoolState {
                next_page_no: 0,
                free_runs: Vec::new(),
                in_use: 0,
            }),
            max_pages: None,
        }
    }

    /// Creates a pool that never has more than `max_pages` pages in use.
    ///
    /// This is useful for exercising out-of-space paths.
    pub fn with_max_pages(max_pages: u32) -> Self {
        Self {
            max_pages: Some(max_pages),
            ..Self::new()
        }
    }

    /// Returns the capacity limit, if any.
    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    /// Returns the number of pages currently granted.
    pub fn pages_in_use(&self) -> u32 {
        self.state.lock().in_use
    }

    /// Allocates up to `wanted` consecutive pages.
    ///
    /// Released runs are reused first. When the full request cannot be
    /// met, the longest available run is granted instead.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PoolExhausted` if no page at all is available.
    pub fn alloc_cons_pages(&self, wanted: u32) -> Result<PageRun, StorageError> {
        let mut state = self.state.lock();

        let capacity = match self.max_pages {
            Some(max) => max.saturating_sub(state.in_use),
            None => u32::MAX,
        };
        let wanted_now = wanted.min(capacity);
        if wanted_now == 0 {
            tracing::warn!(requested = wanted, "page pool exhausted");
            return Err(StorageError::PoolExhausted { requested: wanted });
        }

        let fitting = state.free_runs.iter().position(|r| r.count >= wanted_now);
        let run = if let Some(pos) = fitting {
            Self::take_from_free_run(&mut state, pos, wanted_now)
        } else {
            let fresh = match self.max_pages {
                Some(max) => max.saturating_sub(state.next_page_no),
                None => u32::MAX - state.next_page_no,
            };
            if fresh > 0 {
                let count = wanted_now.min(fresh);
                let first = PageId::new(state.next_page_no);
                state.next_page_no += count;
                PageRun { first, count }
            } else {
                let largest =
                    (0..state.free_runs.len()).max_by_key(|&i| state.free_runs[i].count);
                let Some(pos) = largest else {
                    tracing::warn!(requested = wanted, "page pool exhausted");
                    return Err(StorageError::PoolExhausted { requested: wanted });
                };
                Self::take_from_free_run(&mut state, pos, wanted_now)
            }
        };

        state.in_use += run.count;
        Ok(run)
    }

    /// Carves up to `count` pages off the front of a released run.
    fn take_from_free_run(state: &mut PoolState, pos: usize, count: u32) -> PageRun {
        let run = state.free_runs[pos];
        let count = count.min(run.count);
        if run.count == count {
            state.free_runs.remove(pos);
        } else {
            state.free_runs[pos] = PageRun {
                first: run.first.offset(count),
                count: run.count - count,
            };
        }
        PageRun {
            first: run.first,
            count,
        }
    }

    /// Returns a run to the pool.
    ///
    /// Adjacent released runs are merged so later requests can be served
    /// contiguously.
    pub fn release_pages(&self, run: PageRun) {
        let mut state = self.state.lock();
        debug_assert!(state.in_use >= run.count);
        state.in_use -= run.count;

        let pos = state
            .free_runs
            .partition_point(|r| r.first < run.first);
        state.free_runs.insert(pos, run);

        let mut merged: Vec<PageRun> = Vec::with_capacity(state.free_runs.len());
        for r in state.free_runs.drain(..) {
            match merged.last_mut() {
                Some(prev) if prev.first.offset(prev.count) == r.first => prev.count += r.count,
                _ => merged.push(r),
            }
        }
        state.free_runs = merged;
    }
}

impl Default for PagePool {
    fn default() -> Self {
        Self::new()
    }
}
