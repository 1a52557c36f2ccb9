use thiserror::Error;

use crate::config::ConfigError;
use crate::file::{FileError, TableId};
use crate::lock::LockError;
use crate::record::RecordError;
use crate::wal::WalError;

#[derive(Debug, Error)]
pub enum BufferError {
    /// Lock wait timed out; the transaction must be aborted
    #[error("Transaction aborted: {0}")]
    Aborted(#[from] LockError),

    /// Every resident page is dirty, so nothing can be evicted
    #[error("Buffer pool is full of uncommitted pages (capacity {capacity})")]
    CacheFull { capacity: usize },

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Log error: {0}")]
    Wal(#[from] WalError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Table {0} is not registered")]
    UnknownTable(TableId),

    #[error("Table {0} has no mutator")]
    NoMutator(TableId),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BufferError {
    /// The caller must drive its transaction through the abort path
    pub fn is_abort(&self) -> bool {
        matches!(self, BufferError::Aborted(_))
    }

    pub fn is_cache_full(&self) -> bool {
        matches!(self, BufferError::CacheFull { .. })
    }

    /// Storage or log I/O failure, possibly transient
    pub fn is_io(&self) -> bool {
        matches!(self, BufferError::File(_) | BufferError::Wal(_))
    }
}

pub type BufferResult<T> = Result<T, BufferError>;
