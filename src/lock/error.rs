use std::time::Duration;
use thiserror::Error;

use crate::file::PageId;
use crate::transaction::TransactionId;

#[derive(Debug, Clone, Error)]
pub enum LockError {
    /// The lock could not be granted before the abort deadline.
    /// The requesting transaction must be aborted, not retried in place.
    #[error("{txn} aborted after waiting {waited:?} for a lock on page {page_id}")]
    Aborted {
        txn: TransactionId,
        page_id: PageId,
        waited: Duration,
    },
}

pub type LockResult<T> = Result<T, LockError>;
