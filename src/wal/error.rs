use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt log record at offset {offset}")]
    Corrupt { offset: u64 },
}

pub type WalResult<T> = Result<T, WalError>;
