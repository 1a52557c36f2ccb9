use thiserror::Error;

use super::RecordId;
use crate::file::TableId;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Tuple size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("Record {record} does not belong to table {table}")]
    ForeignRecord { table: TableId, record: RecordId },

    #[error("Slot is empty: {0}")]
    SlotEmpty(RecordId),

    #[error("Record size {record_size} does not fit a {page_size}-byte page")]
    RecordTooLarge { record_size: usize, page_size: usize },
}

pub type RecordResult<T> = Result<T, RecordError>;
