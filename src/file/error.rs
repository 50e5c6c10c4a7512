use std::io;
use thiserror::Error;

use super::{FrameId, PageId};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("File is still open: {0}")]
    FileOpen(String),

    #[error("Not a paged file: {0}")]
    BadFileFormat(String),

    #[error("Invalid file handle: {0}")]
    InvalidHandle(usize),

    #[error("File handle limit reached")]
    TooManyOpenFiles,

    #[error("Invalid page: page_id={0}")]
    InvalidPage(PageId),

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Buffer pool exceeded: every frame is pinned")]
    BufferExceeded,

    #[error("Page not resident in buffer pool: page_id={0}")]
    PageNotFound(PageId),

    #[error("Page is not pinned: page_id={0}")]
    NotPinned(PageId),

    #[error("Page is pinned: page_id={0}")]
    PagePinned(PageId),

    #[error("Buffer frame {0} is in an inconsistent state")]
    InconsistentState(FrameId),

    #[error("Hash directory already maps page {0}")]
    HashEntryExists(PageId),

    #[error("Hash directory has no entry for page {0}")]
    HashEntryNotFound(PageId),

    #[error("Hash directory is full")]
    HashTableFull,

    #[error("Failed to read page {page_id}: {source}")]
    ReadFailed {
        page_id: PageId,
        #[source]
        source: Box<FileError>,
    },

    #[error("Failed to write page {page_id}: {source}")]
    WriteFailed {
        page_id: PageId,
        #[source]
        source: Box<FileError>,
    },
}

pub type FileResult<T> = Result<T, FileError>;
