use super::error::FileResult;
use super::{Page, PageId, TableId};

/// Durable, page-addressable backing store for one table.
///
/// Page `n` lives at byte offset `n * page_size`. Implementations must be
/// safe to share between threads; the buffer pool serializes the calls it
/// makes for a given page but different tables are accessed concurrently.
pub trait PageStore: Send + Sync {
    /// Table whose pages this store holds
    fn table_id(&self) -> TableId;

    /// Size of every page in bytes
    fn page_size(&self) -> usize;

    /// Read exactly one page
    fn read_page(&self, page_id: PageId) -> FileResult<Page>;

    /// Write exactly one page, extending the store if needed
    fn write_page(&self, page: &Page) -> FileResult<()>;

    /// Append a zeroed page past the current end and return its id
    fn allocate_page(&self) -> FileResult<PageId>;

    /// Number of pages currently in the store
    fn page_count(&self) -> FileResult<u32>;
}
