mod buffer_manager;
mod error;
mod file_manager;
mod hash_table;

pub use buffer_manager::{BufferManager, FrameDesc};
pub use error::{FileError, FileResult};
pub use file_manager::{FileHandle, IoStats, PagedFileManager};
pub use hash_table::BufHashTable;

/// Page size in bytes (8KB)
pub const PAGE_SIZE: usize = 8192;

/// Default number of frames in the buffer pool (2MB of pages)
pub const BUFFER_POOL_SIZE: usize = 256;

/// Page number within a file. Page 0 holds file metadata and is never
/// handed out, so valid data pages start at 1.
pub type PageId = u32;

/// Index of a frame in the buffer pool
pub type FrameId = usize;

/// On-disk encoding of "no page" in page links
pub(crate) const NO_PAGE: i32 = -1;

pub(crate) fn encode_page_link(page: Option<PageId>) -> i32 {
    page.map_or(NO_PAGE, |p| p as i32)
}

pub(crate) fn decode_page_link(raw: i32) -> Option<PageId> {
    if raw < 0 { None } else { Some(raw as PageId) }
}
