use std::io;
use thiserror::Error;

use super::{PageId, TableId};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Page {page_id} is beyond the end of the file ({page_count} pages)")]
    PageOutOfRange { page_id: PageId, page_count: u32 },

    #[error("Page {page_id} does not belong to table {table}")]
    ForeignPage { table: TableId, page_id: PageId },
}

pub type FileResult<T> = Result<T, FileError>;
