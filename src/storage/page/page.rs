use page_constants::PAGE_SIZE;

pub mod page_constants {
    /// A single page size.
    ///
    /// Every unit of disk I/O and every buffer pool frame is exactly this
    /// many bytes.
    pub const PAGE_SIZE: usize = 4096;
}

pub type PageId = u32;

/// Sentinel for "no such page". Page id 0 is the header page, so the
/// all-ones value is used rather than zero.
pub const INVALID_PAGE_ID: PageId = PageId::MAX;

/// Well known page holding the (index name, root page id) records.
pub const HEADER_PAGE_ID: PageId = 0;

/// In-memory image of a disk page plus the frame bookkeeping that the
/// buffer pool needs: the owning page id, a pin count and the dirty flag.
///
/// A page is pinned while `pin_count > 0`. A dirty page must be written
/// back before its frame can be handed to another page.
pub struct Page {
    pub(crate) page_id: PageId,
    pub(crate) pin_count: u32,
    pub(crate) is_dirty: bool,
    pub(crate) data: Box<[u8]>,
}

impl Page {
    pub(crate) fn new() -> Self {
        Page {
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
            data: vec![0u8; PAGE_SIZE].into_boxed_slice(),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable view of the page bytes. Writers report the mutation through
    /// `unpin_page(.., true)`; touching the bytes alone does not mark the
    /// frame dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns the frame to its pristine state before it is reused for
    /// another page.
    pub(crate) fn reset(&mut self) {
        self.page_id = INVALID_PAGE_ID;
        self.pin_count = 0;
        self.is_dirty = false;
        self.data.fill(0);
    }
}
