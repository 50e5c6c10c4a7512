use crate::file::{FileError, PageId};
use thiserror::Error;

use super::record::SlotId;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Invalid heap file header: {0}")]
    InvalidHeader(String),

    #[error("Bad scan parameter: {0}")]
    BadScanParameter(String),

    #[error("Invalid record length {length}: maximum is {max}")]
    InvalidRecordLength { length: usize, max: usize },

    #[error("Record not found: page_id={page_id}, slot_id={slot_id}")]
    RecordNotFound { page_id: PageId, slot_id: SlotId },

    #[error("No space on page {0}")]
    NoSpace(PageId),

    #[error("Scan has no current record")]
    NoCurrentRecord,

    #[error("Scan has no marked position")]
    NoMarkedPosition,

    #[error("Corrupted page: {0}")]
    Corrupted(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
}

pub type RecordResult<T> = Result<T, RecordError>;
