//! Variable-part allocator core: bucket maintenance, page acquisition,
//! allocation and free.

use std::sync::Arc;

use tracing::{debug, trace};

use super::config::{ConfigError, VarAllocConfig};
use super::error::AllocError;
use super::fragment::Fragment;
use crate::storage::{DATA_WORDS, ListState, PageData, PageId, PagePool, PageRun, PageState};
use crate::tuple::LocalKey;
use crate::varpage::{EMPTY_PAGE_FREE_SPACE, MAX_VAR_PART_WORDS, PageError, VarPage};

/// Allocates variable-sized parts of rows inside fragment pages.
///
/// Pages are grouped into buckets by free space so that a page with room
/// for a request is found without scanning. New pages come from the
/// shared [`PagePool`] in chunks.
///
/// # Concurrency
///
/// The allocator holds working buffers and is used through `&mut self`.
/// Callers serialize access per fragment; only the pool is shared.
pub struct VarAllocator {
    pub(super) config: VarAllocConfig,
    pool: Arc<PagePool>,
    /// Free space below which a page is not listed.
    floor: u32,
    /// Working page for reorganization.
    pub(super) scratch: Vec<u32>,
    /// Holds an entry's words while it is moved.
    pub(super) copy_buffer: Vec<u32>,
}

impl VarAllocator {
    /// Creates an allocator drawing pages from `pool`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket table does not partition the legal
    /// free-space values.
    pub fn new(config: VarAllocConfig, pool: Arc<PagePool>) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut allocator = Self {
            config,
            pool,
            floor: 0,
            scratch: vec![0; DATA_WORDS],
            copy_buffer: vec![0; DATA_WORDS],
        };
        allocator.floor = allocator.config.free_lists[allocator.bucket_for(0)].min;
        Ok(allocator)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &VarAllocConfig {
        &self.config
    }

    /// Returns the page pool.
    pub fn pool(&self) -> &Arc<PagePool> {
        &self.pool
    }

    /// Returns the smallest free space a listed page can have.
    pub fn free_space_floor(&self) -> u32 {
        self.floor
    }

    /// Creates an empty fragment with this allocator's buckets.
    pub fn new_fragment(&self) -> Fragment {
        Fragment::new(self.config.list_count())
    }

    /// Returns the first bucket, in index order, whose `max` covers
    /// `free_space`.
    ///
    /// # Panics
    ///
    /// Panics if no bucket covers the value. The configuration is validated
    /// at construction, so this only happens for values no page can have.
    pub fn bucket_for(&self, free_space: u32) -> usize {
        match self
            .config
            .free_lists
            .iter()
            .position(|range| free_space <= range.max)
        {
            Some(bucket) => bucket,
            None => panic!("no free list covers free space {}", free_space),
        }
    }

    /// Moves a page to the bucket matching its current free space.
    ///
    /// Pages already in a matching bucket are left alone. Pages whose free
    /// space drops below the floor are unlinked and marked unlisted.
    ///
    /// # Panics
    ///
    /// Panics if the fragment does not own `page_id`.
    pub fn update_free_page_list(&self, frag: &mut Fragment, page_id: PageId) {
        let Some(header) = frag.pages.header(page_id) else {
            panic!("update_free_page_list on unknown {}", page_id);
        };
        let free = header.free_space;

        if let ListState::InBucket(current) = header.list_state
            && self.config.free_lists[current].contains(free)
            && free >= self.floor
        {
            return;
        }

        let bucket = self.bucket_for(free);
        if let ListState::InBucket(current) = header.list_state {
            frag.free_lists[current].remove(&mut frag.pages, page_id);
        }

        let list_state = if free < self.config.free_lists[bucket].min {
            ListState::Unlisted
        } else {
            frag.free_lists[bucket].add(&mut frag.pages, page_id);
            ListState::InBucket(bucket)
        };
        frag.pages.update_header(page_id, |h| h.list_state = list_state);

        trace!(
            page = page_id.page_num(),
            free_space = free,
            from = ?header.list_state,
            to = ?list_state,
            "page moved between free lists"
        );
    }

    /// Finds a listed page with at least `alloc_size` words free.
    ///
    /// Buckets above the one covering `alloc_size` are assumed large enough
    /// and their first page is taken as is. Failing that, up to
    /// `probe_limit` pages of the bucket below are checked individually.
    ///
    /// Returns `None` for sizes no page can ever have free.
    pub fn get_alloc_page(&self, frag: &Fragment, alloc_size: u32) -> Option<PageId> {
        if alloc_size > EMPTY_PAGE_FREE_SPACE {
            return None;
        }
        let last = self.config.list_count() - 1;
        let mut start = self.bucket_for(alloc_size);
        if start != last {
            start += 1;
        }

        for bucket in start..=last {
            if let Some(page_id) = frag.free_lists[bucket].first() {
                return Some(page_id);
            }
        }

        let boundary = start.checked_sub(1)?;
        frag.free_lists[boundary]
            .iter(&frag.pages)
            .take(self.config.probe_limit)
            .find(|&page_id| {
                frag.pages
                    .header(page_id)
                    .is_some_and(|h| h.free_space >= alloc_size)
            })
    }

    /// Takes an unformatted page, requesting a new chunk from the pool when
    /// the fragment has none left.
    ///
    /// The returned page is unformatted and in no list, so the fragment
    /// will not allocate into it: the caller owns it until the fragment is
    /// released. [`alloc_var_part`](Self::alloc_var_part) formats and lists
    /// the pages it takes this way.
    ///
    /// Returns `None` if the pool has no pages to give.
    pub fn get_empty_page(&self, frag: &mut Fragment) -> Option<PageId> {
        if let Some(page_id) = frag.empty_pages.remove_front(&mut frag.pages) {
            return Some(page_id);
        }

        let run = self.pool.alloc_cons_pages(self.config.chunk_pages).ok()?;
        let last = run.last();
        for page_id in run.pages() {
            let mut page = PageData::new_empty(page_id);
            if page_id != last {
                let mut header = page.header();
                header.next_list = Some(page_id.offset(1));
                page.set_header(&header);
            }
            frag.pages.insert(page_id, page);
        }
        frag.var_page_count += run.count;

        if run.count > 1 {
            frag.empty_pages.add_run(
                &mut frag.pages,
                run.first.offset(1),
                last,
                run.count as usize - 1,
            );
        }

        let prev_chunk = frag.var_page_chunks;
        frag.pages.update_header(run.first, |h| {
            h.next_list = None;
            h.chunk_size = run.count;
            h.next_chunk = prev_chunk;
        });
        frag.var_page_chunks = Some(run.first);

        debug!(
            first = run.first.page_num(),
            count = run.count,
            requested = self.config.chunk_pages,
            "allocated chunk for variable pages"
        );

        Some(run.first)
    }

    /// Allocates a variable part of `size` words.
    ///
    /// Returns the key of the new part and its (uninitialized) words.
    ///
    /// # Errors
    ///
    /// - `AllocError::InvalidSize` if `size` is 0 or exceeds a page.
    /// - `AllocError::OutOfPages` if no page has room and the pool is
    ///   exhausted. The fragment is left unchanged.
    pub fn alloc_var_part<'f>(
        &mut self,
        frag: &'f mut Fragment,
        size: u32,
    ) -> Result<(LocalKey, &'f mut [u32]), AllocError> {
        self.check_size(size)?;

        let mut page_id = match self.get_alloc_page(frag, size + 1) {
            Some(page_id) => page_id,
            None => self.format_empty_page(frag)?,
        };

        let page_idx = match self.place(frag, page_id, size) {
            Ok(page_idx) => page_idx,
            Err(AllocError::Page(PageError::PageFull { .. })) => {
                debug!(
                    page = page_id.page_num(),
                    size, "listed page too small, using an empty page"
                );
                page_id = self.format_empty_page(frag)?;
                match self.place(frag, page_id, size) {
                    Ok(page_idx) => page_idx,
                    Err(e) => {
                        self.update_free_page_list(frag, page_id);
                        return Err(e);
                    }
                }
            }
            Err(e) => return Err(e),
        };

        self.update_free_page_list(frag, page_id);

        let key = LocalKey::new(page_id, page_idx);
        let data = frag
            .var_part_mut(key)
            .ok_or(AllocError::PageNotFound(page_id))?;
        Ok((key, data))
    }

    /// Frees a variable part.
    ///
    /// A page that becomes entirely free stays with the fragment, listed in
    /// the bucket for its free space.
    ///
    /// # Errors
    ///
    /// Returns an error if the page is not owned by the fragment or the
    /// slot is not allocated.
    pub fn free_var_part(&self, frag: &mut Fragment, key: LocalKey) -> Result<(), AllocError> {
        let page = frag
            .pages
            .get_mut(key.page_no)
            .ok_or(AllocError::PageNotFound(key.page_no))?;
        VarPage::new(page).free_record(key.page_idx)?;
        self.update_free_page_list(frag, key.page_no);
        Ok(())
    }

    /// Returns every chunk of the fragment to the pool.
    pub fn release_fragment(&self, frag: Fragment) {
        let chunks = frag.chunks();
        for &(first, count) in &chunks {
            self.pool.release_pages(PageRun { first, count });
        }
        debug!(
            chunks = chunks.len(),
            pages = frag.var_page_count,
            "released fragment pages"
        );
    }

    pub(super) fn check_size(&self, size: u32) -> Result<(), AllocError> {
        if size == 0 || size > MAX_VAR_PART_WORDS {
            return Err(AllocError::InvalidSize {
                size,
                max: MAX_VAR_PART_WORDS,
            });
        }
        Ok(())
    }

    /// Formats an empty page and links it into the last bucket.
    fn format_empty_page(&self, frag: &mut Fragment) -> Result<PageId, AllocError> {
        let page_id = self.get_empty_page(frag).ok_or(AllocError::OutOfPages)?;
        let page = frag
            .pages
            .get_mut(page_id)
            .ok_or(AllocError::PageNotFound(page_id))?;
        VarPage::new(&mut *page).init();

        let last = self.config.list_count() - 1;
        frag.free_lists[last].add(&mut frag.pages, page_id);
        frag.pages.update_header(page_id, |h| {
            h.list_state = ListState::InBucket(last);
            h.page_state = PageState::InUse;
        });
        Ok(page_id)
    }

    fn place(&mut self, frag: &mut Fragment, page_id: PageId, size: u32) -> Result<u32, AllocError> {
        let page = frag
            .pages
            .get_mut(page_id)
            .ok_or(AllocError::PageNotFound(page_id))?;
        Ok(VarPage::new(page).alloc_record(size, &mut self.scratch)?)
    }
}
