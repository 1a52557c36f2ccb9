mod error;
mod log_file;
mod memory;

pub use error::{WalError, WalResult};
pub use log_file::{FileLog, LogRecord};
pub use memory::{LogEvent, MemoryLog};

use crate::file::Page;
use crate::transaction::TransactionId;

/// The write-ahead log as seen by the buffer pool.
///
/// Before a dirty page is written back, the pool calls `log_before_image`
/// and then `force`, in that order.
pub trait WriteAheadLog: Send + Sync {
    /// Append the page's before-image and current image, tagged with the
    /// transaction that dirtied it
    fn log_before_image(&self, txn: TransactionId, page: &Page) -> WalResult<()>;

    /// Durably persist everything appended so far
    fn force(&self) -> WalResult<()>;
}
