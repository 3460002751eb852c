use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::{debug, warn};

use crate::{
    storage::{
        disk::manager::DiskManager,
        page::page::{Page, PageId, HEADER_PAGE_ID, INVALID_PAGE_ID},
    },
    utils::{
        hash_table::ExtendibleHashTable,
        replacer::{FrameId, LruKReplacer, Replacer},
    },
};

/// Entries per page-table bucket.
pub const BUCKET_SIZE: usize = 4;

/// Borrowed view of a resident page.
///
/// The pin was taken by the pool operation that produced the handle and is
/// released only by an explicit `unpin_page` call; dropping the handle does
/// not unpin. Callers must not touch the page after unpinning it, and must
/// drop any outstanding read/write guard before calling back into the pool.
pub struct PageHandle {
    page_id: PageId,
    frame: Arc<RwLock<Page>>,
}

impl PageHandle {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.frame.read().unwrap()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.frame.write().unwrap()
    }
}

/// Everything the pool mutates, behind one latch. Disk I/O happens under
/// the latch as well; the simplicity is worth the stall.
struct PoolState {
    page_table: ExtendibleHashTable<PageId, FrameId>,
    replacer: LruKReplacer,
    free_list: VecDeque<FrameId>,
    next_page_id: PageId,
    disk: DiskManager,
}

/// Owns `pool_size` frames and moves pages between them and the disk
/// manager. The page table maps resident page ids to frames; the free list
/// and the replacer between them account for every frame that holds no
/// pinned page.
pub struct BufferPoolManager {
    pool_size: usize,
    frames: Vec<Arc<RwLock<Page>>>,
    state: Mutex<PoolState>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk: DiskManager, replacer_k: usize) -> Self {
        let frames = (0..pool_size)
            .map(|_| Arc::new(RwLock::new(Page::new())))
            .collect();

        BufferPoolManager {
            pool_size,
            frames,
            state: Mutex::new(PoolState {
                page_table: ExtendibleHashTable::new(BUCKET_SIZE),
                replacer: LruKReplacer::new(pool_size, replacer_k),
                free_list: (0..pool_size).collect(),
                // Page id 0 is reserved for the header page.
                next_page_id: HEADER_PAGE_ID + 1,
                disk,
            }),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Pops a free frame, or evicts one. An evicted frame's old page is
    /// written back if dirty and unbound from the page table.
    fn available_frame(&self, state: &mut PoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }

        let frame_id = state.replacer.evict()?;
        let mut page = self.frames[frame_id].write().unwrap();
        if page.is_dirty {
            state
                .disk
                .write_page(page.page_id, &page.data)
                .expect("disk write failed during eviction");
            page.is_dirty = false;
        }
        debug!("evicted page {} from frame {}", page.page_id, frame_id);
        state.page_table.remove(&page.page_id);
        Some(frame_id)
    }

    /// Allocates a fresh page pinned into an available frame. Returns None
    /// when every frame is pinned.
    pub fn new_page(&self) -> Option<PageHandle> {
        let mut state = self.state.lock().unwrap();
        let frame_id = self.available_frame(&mut state)?;

        let page_id = state.next_page_id;
        state.next_page_id += 1;

        {
            let mut page = self.frames[frame_id].write().unwrap();
            page.reset();
            page.page_id = page_id;
            page.pin_count = 1;
        }
        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id);
        state.replacer.set_evictable(frame_id, false);

        Some(PageHandle {
            page_id,
            frame: Arc::clone(&self.frames[frame_id]),
        })
    }

    /// Pins the page, reading it from disk if it is not resident. Returns
    /// None when every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Option<PageHandle> {
        let mut state = self.state.lock().unwrap();

        if let Some(frame_id) = state.page_table.find(&page_id) {
            {
                let mut page = self.frames[frame_id].write().unwrap();
                page.pin_count += 1;
            }
            state.replacer.record_access(frame_id);
            state.replacer.set_evictable(frame_id, false);
            return Some(PageHandle {
                page_id,
                frame: Arc::clone(&self.frames[frame_id]),
            });
        }

        let frame_id = self.available_frame(&mut state)?;
        {
            let mut page = self.frames[frame_id].write().unwrap();
            page.reset();
            page.page_id = page_id;
            page.pin_count = 1;
            state
                .disk
                .read_page(page_id, &mut page.data)
                .expect("disk read failed");
        }
        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id);
        state.replacer.set_evictable(frame_id, false);

        Some(PageHandle {
            page_id,
            frame: Arc::clone(&self.frames[frame_id]),
        })
    }

    /// Drops one pin. The frame becomes evictable when the last pin goes;
    /// the dirty flag is sticky until a flush.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(frame_id) = state.page_table.find(&page_id) else {
            warn!("unpin of non-resident page {}", page_id);
            return false;
        };

        let mut page = self.frames[frame_id].write().unwrap();
        if page.pin_count == 0 {
            warn!("unpin of page {} with zero pin count", page_id);
            return false;
        }
        page.pin_count -= 1;
        if page.pin_count == 0 {
            state.replacer.set_evictable(frame_id, true);
        }
        if is_dirty {
            page.is_dirty = true;
        }
        true
    }

    /// Writes the page to disk regardless of its pin state and clears the
    /// dirty flag.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(frame_id) = state.page_table.find(&page_id) else {
            return false;
        };

        let mut page = self.frames[frame_id].write().unwrap();
        state
            .disk
            .write_page(page_id, &page.data)
            .expect("disk write failed");
        page.is_dirty = false;
        true
    }

    pub fn flush_all_pages(&self) {
        let mut state = self.state.lock().unwrap();
        for frame in &self.frames {
            let mut page = frame.write().unwrap();
            if page.page_id != INVALID_PAGE_ID {
                state
                    .disk
                    .write_page(page.page_id, &page.data)
                    .expect("disk write failed");
                page.is_dirty = false;
            }
        }
    }

    /// Removes the page from the pool and deallocates it on disk. A page
    /// that is not resident counts as deleted; a pinned page cannot be.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(frame_id) = state.page_table.find(&page_id) else {
            return true;
        };

        {
            let mut page = self.frames[frame_id].write().unwrap();
            if page.pin_count > 0 {
                return false;
            }
            page.reset();
        }
        state.page_table.remove(&page_id);
        state.replacer.remove(frame_id);
        state.free_list.push_back(frame_id);
        state.disk.deallocate_page(page_id);
        true
    }

    /// Current pin count of a resident page. Mostly useful in tests.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock().unwrap();
        let frame_id = state.page_table.find(&page_id)?;
        let pin_count = self.frames[frame_id].read().unwrap().pin_count;
        Some(pin_count)
    }
}
