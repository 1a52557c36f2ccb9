//! In-memory page store for tests and ephemeral tables.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::error::{FileError, FileResult};
use super::page_store::PageStore;
use super::{PAGE_SIZE, Page, PageId, TableId};

/// A `PageStore` that keeps every page in a `Vec`.
///
/// Counts reads and writes so tests can tell cache hits from misses and
/// check exactly when a page reaches durable storage.
pub struct MemoryPageStore {
    table_id: TableId,
    page_size: usize,
    pages: Mutex<Vec<Vec<u8>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryPageStore {
    /// An empty store with the default page size
    pub fn new(table_id: TableId) -> Self {
        Self::with_page_size(table_id, PAGE_SIZE)
    }

    pub fn with_page_size(table_id: TableId, page_size: usize) -> Self {
        Self {
            table_id,
            page_size,
            pages: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// A store pre-populated with `count` pages; page `n` is filled with byte `n`
    pub fn with_pages(table_id: TableId, page_size: usize, count: u32) -> Self {
        let store = Self::with_page_size(table_id, page_size);
        {
            let mut pages = store.pages.lock();
            for page_no in 0..count {
                pages.push(vec![page_no as u8; page_size]);
            }
        }
        store
    }

    /// Durable content of a page, bypassing the read counter
    pub fn stored(&self, page_no: u32) -> Option<Vec<u8>> {
        self.pages.lock().get(page_no as usize).cloned()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_owner(&self, page_id: PageId) -> FileResult<()> {
        if page_id.table_id() != self.table_id {
            return Err(FileError::ForeignPage {
                table: self.table_id,
                page_id,
            });
        }
        Ok(())
    }
}

impl PageStore for MemoryPageStore {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId) -> FileResult<Page> {
        self.check_owner(page_id)?;
        let pages = self.pages.lock();
        let data = pages
            .get(page_id.page_number() as usize)
            .ok_or(FileError::PageOutOfRange {
                page_id,
                page_count: pages.len() as u32,
            })?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Page::new(page_id, data.clone()))
    }

    fn write_page(&self, page: &Page) -> FileResult<()> {
        self.check_owner(page.id())?;
        if page.size() != self.page_size {
            return Err(FileError::InvalidPageSize {
                expected: self.page_size,
                actual: page.size(),
            });
        }

        let mut pages = self.pages.lock();
        let index = page.id().page_number() as usize;
        if pages.len() <= index {
            pages.resize(index + 1, vec![0u8; self.page_size]);
        }
        pages[index].copy_from_slice(page.data());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn allocate_page(&self) -> FileResult<PageId> {
        let mut pages = self.pages.lock();
        let page_no = pages.len() as u32;
        pages.push(vec![0u8; self.page_size]);
        Ok(PageId::new(self.table_id, page_no))
    }

    fn page_count(&self) -> FileResult<u32> {
        Ok(self.pages.lock().len() as u32)
    }
}
