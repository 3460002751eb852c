use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use hashlink::LinkedHashMap;

use crate::storage::page::page::{page_constants::PAGE_SIZE, PageId};

/// Page-addressed store over a single database file.
///
/// The manager keeps an in-memory mapping from page id to its offset in the
/// file. Offsets are handed out in write order; deallocated slots are
/// recycled for pages written later. A page that was never written (or was
/// deallocated) reads back as zeroes, which is what a freshly allocated
/// page is expected to contain.
pub struct DiskManager {
    db_io: File,
    db_path: PathBuf,

    // Page id to file offset. A `None` offset marks a deallocated page
    // whose slot has been recycled into `free_slots`.
    pages: LinkedHashMap<PageId, Option<u64>>,
    free_slots: VecDeque<u64>,
    next_offset: u64,

    num_writes: u32,
    num_flushes: u32,
    num_deletes: u32,
}

impl DiskManager {
    pub fn new(db_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&db_path)
            .with_context(|| format!("failed to open db file {}", db_path.display()))?;

        Ok(DiskManager {
            db_io,
            db_path,
            pages: LinkedHashMap::new(),
            free_slots: VecDeque::new(),
            next_offset: 0,
            num_writes: 0,
            num_flushes: 0,
            num_deletes: 0,
        })
    }

    /// Persists `PAGE_SIZE` bytes for the given page, assigning a file
    /// offset on first write.
    pub fn write_page(&mut self, page_id: PageId, page_data: &[u8]) -> anyhow::Result<()> {
        if page_data.len() != PAGE_SIZE {
            bail!("page {} write of {} bytes", page_id, page_data.len());
        }

        let offset = match self.pages.get(&page_id) {
            Some(Some(offset)) => *offset,
            // First write, or a write resurrecting a deallocated id.
            _ => {
                let offset = self.free_slots.pop_front().unwrap_or_else(|| {
                    let offset = self.next_offset;
                    self.next_offset += PAGE_SIZE as u64;
                    offset
                });
                self.pages.replace(page_id, Some(offset));
                offset
            }
        };

        self.db_io
            .seek(SeekFrom::Start(offset))
            .with_context(|| format!("I/O error while seeking page {}", page_id))?;
        self.db_io
            .write_all(page_data)
            .with_context(|| format!("I/O error while writing page {}", page_id))?;
        self.db_io
            .flush()
            .with_context(|| format!("error flushing page {}", page_id))?;

        self.num_writes += 1;
        self.num_flushes += 1;
        Ok(())
    }

    /// Fills `page_data` with the page's `PAGE_SIZE` bytes. Pages without a
    /// stored image read back zeroed.
    pub fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) -> anyhow::Result<()> {
        if page_data.len() != PAGE_SIZE {
            bail!("page {} read into {} bytes", page_id, page_data.len());
        }

        match self.pages.get(&page_id) {
            Some(Some(offset)) => {
                self.db_io
                    .seek(SeekFrom::Start(*offset))
                    .with_context(|| format!("I/O error while seeking page {}", page_id))?;
                self.db_io
                    .read_exact(page_data)
                    .with_context(|| format!("I/O error while reading page {}", page_id))?;
            }
            _ => page_data.fill(0),
        }
        Ok(())
    }

    /// Releases the page's file slot for reuse. Unknown ids are ignored.
    pub fn deallocate_page(&mut self, page_id: PageId) {
        if let Some(Some(offset)) = self.pages.get(&page_id).copied() {
            self.pages.replace(page_id, None);
            self.free_slots.push_back(offset);
            self.num_deletes += 1;
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes
    }

    pub fn num_flushes(&self) -> u32 {
        self.num_flushes
    }

    pub fn num_deletes(&self) -> u32 {
        self.num_deletes
    }
}

#[cfg(test)]
mod test {
    use super::DiskManager;
    use crate::storage::page::page::page_constants::PAGE_SIZE;
    use tempfile::TempDir;

    #[test]
    fn db_io_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut manager = DiskManager::new(dir.path().join("test.db")).unwrap();

        let data = [7u8; PAGE_SIZE];
        let mut buffer = [0u8; PAGE_SIZE];

        manager.write_page(3, &data).unwrap();
        manager.read_page(3, &mut buffer).unwrap();
        assert_eq!(data, buffer, "page read mismatch");

        // A page that was never written reads back zeroed.
        manager.read_page(9, &mut buffer).unwrap();
        assert!(buffer.iter().all(|b| *b == 0));
    }

    #[test]
    fn deallocated_slot_is_recycled() {
        let dir = TempDir::new().unwrap();
        let mut manager = DiskManager::new(dir.path().join("test.db")).unwrap();

        manager.write_page(1, &[1u8; PAGE_SIZE]).unwrap();
        manager.write_page(2, &[2u8; PAGE_SIZE]).unwrap();
        manager.deallocate_page(1);
        assert_eq!(1, manager.num_deletes());

        let mut buffer = [0u8; PAGE_SIZE];
        manager.read_page(1, &mut buffer).unwrap();
        assert!(buffer.iter().all(|b| *b == 0));

        // Page 3 takes over page 1's old slot, page 2 is untouched.
        manager.write_page(3, &[3u8; PAGE_SIZE]).unwrap();
        manager.read_page(2, &mut buffer).unwrap();
        assert_eq!([2u8; PAGE_SIZE], buffer);
        manager.read_page(3, &mut buffer).unwrap();
        assert_eq!([3u8; PAGE_SIZE], buffer);
    }
}
