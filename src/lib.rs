pub mod buffer;
pub mod catalog;
pub mod config;
pub mod file;
pub mod lock;
pub mod record;
pub mod transaction;
pub mod wal;

pub use buffer::{BufferError, BufferPool, BufferResult, EvictionPolicy, PageRef};
pub use catalog::{Catalog, TableMutator};
pub use config::{DEFAULT_PAGES, EvictionStrategy, LockTimeout, PoolConfig};
pub use file::{MemoryPageStore, PAGE_SIZE, Page, PageId, PageStore, PagedFile, TableId};
pub use lock::{LockError, LockManager, LockMode};
pub use record::{HeapTable, RecordError, RecordId, Tuple};
pub use transaction::{Permission, TransactionId};
pub use wal::{FileLog, MemoryLog, WriteAheadLog};
