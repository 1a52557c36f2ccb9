mod error;
mod memory;
mod page;
mod page_store;
mod paged_file;

pub use error::{FileError, FileResult};
pub use memory::MemoryPageStore;
pub use page::{Page, PageId, TableId};
pub use page_store::PageStore;
pub use paged_file::PagedFile;

/// Default page size in bytes (4KB)
/// Stores may be built with a smaller size in tests, never at runtime for a live database
pub const PAGE_SIZE: usize = 4096;
