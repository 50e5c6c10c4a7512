use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::error::{FileError, FileResult};
use super::{PAGE_SIZE, PageId, decode_page_link, encode_page_link};

/// Identifies paged files created by this crate
const FILE_MAGIC: u32 = 0x4d52_4c31;

/// Physical page holding the file metadata
const META_PAGE: u64 = 0;

/// Handle to an open file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(usize);

impl FileHandle {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

/// Page I/O performed on behalf of callers (metadata traffic excluded)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    pub reads: u64,
    pub writes: u64,
}

/// File-level metadata kept in physical page 0
#[derive(Debug, Clone, Copy)]
struct FileMeta {
    /// Number of physical pages, metadata page included
    page_count: u32,
    first_page: Option<PageId>,
    free_head: Option<PageId>,
}

impl FileMeta {
    fn empty() -> Self {
        Self {
            page_count: 1,
            first_page: None,
            free_head: None,
        }
    }

    fn serialize(&self) -> Vec<u8> {
        let mut page = vec![0u8; PAGE_SIZE];
        page[0..4].copy_from_slice(&FILE_MAGIC.to_le_bytes());
        page[4..8].copy_from_slice(&self.page_count.to_le_bytes());
        page[8..12].copy_from_slice(&encode_page_link(self.first_page).to_le_bytes());
        page[12..16].copy_from_slice(&encode_page_link(self.free_head).to_le_bytes());
        page
    }

    fn deserialize(data: &[u8]) -> Option<Self> {
        let word = |at: usize| [data[at], data[at + 1], data[at + 2], data[at + 3]];
        if u32::from_le_bytes(word(0)) != FILE_MAGIC {
            return None;
        }
        Some(Self {
            page_count: u32::from_le_bytes(word(4)),
            first_page: decode_page_link(i32::from_le_bytes(word(8))),
            free_head: decode_page_link(i32::from_le_bytes(word(12))),
        })
    }
}

struct FileEntry {
    file: File,
    path: PathBuf,
    open_count: usize,
    meta: FileMeta,
}

impl FileEntry {
    fn check_page(&self, page_id: PageId) -> FileResult<()> {
        if page_id == 0 || page_id >= self.meta.page_count {
            return Err(FileError::InvalidPage(page_id));
        }
        Ok(())
    }

    /// Whether `page_id` is on the free list. The walk is bounded by the
    /// page count so a damaged list cannot loop forever.
    fn is_free(&mut self, page_id: PageId) -> FileResult<bool> {
        let mut buffer = vec![0u8; PAGE_SIZE];
        let mut next = self.meta.free_head;
        let mut steps = 0;
        while let Some(free) = next {
            if free == page_id {
                return Ok(true);
            }
            steps += 1;
            if steps >= self.meta.page_count {
                return Err(FileError::InvalidPage(free));
            }
            self.read_raw(free, &mut buffer)?;
            next = decode_page_link(i32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]));
        }
        Ok(false)
    }

    fn read_raw(&mut self, page_id: PageId, buffer: &mut [u8]) -> FileResult<()> {
        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buffer)?;
        Ok(())
    }

    fn write_raw(&mut self, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;
        Ok(())
    }

    fn write_meta(&mut self) -> FileResult<()> {
        let page = self.meta.serialize();
        self.file.seek(SeekFrom::Start(META_PAGE))?;
        self.file.write_all(&page)?;
        Ok(())
    }
}

/// Manages paged file operations: the page/file primitive underneath the
/// buffer manager.
pub struct PagedFileManager {
    /// Open files by handle
    open_files: HashMap<FileHandle, FileEntry>,
    /// Canonical path of every open file, so reopening yields the same handle
    path_to_handle: HashMap<PathBuf, FileHandle>,
    /// Next available file handle, never reused
    next_handle: usize,
    /// Maximum number of open files
    max_open_files: usize,
    stats: IoStats,
}

impl PagedFileManager {
    /// Manager allowing 128 simultaneously open files
    pub fn new() -> Self {
        Self::with_max_files(128)
    }

    pub fn with_max_files(max_open_files: usize) -> Self {
        Self {
            open_files: HashMap::new(),
            path_to_handle: HashMap::new(),
            next_handle: 0,
            max_open_files,
            stats: IoStats::default(),
        }
    }

    /// Create a new, empty paged file
    pub fn create_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        if path.exists() {
            return Err(FileError::FileAlreadyExists(path.display().to_string()));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = File::create(path)?;
        file.write_all(&FileMeta::empty().serialize())?;
        info!("created paged file {}", path.display());
        Ok(())
    }

    /// Open an existing file. Opening an already open file returns the same
    /// handle and bumps its open count.
    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<FileHandle> {
        let path_ref = path.as_ref();
        let path = path_ref
            .canonicalize()
            .map_err(|_| FileError::FileNotFound(path_ref.display().to_string()))?;

        if let Some(&handle) = self.path_to_handle.get(&path) {
            if let Some(entry) = self.open_files.get_mut(&handle) {
                entry.open_count += 1;
            }
            return Ok(handle);
        }

        if self.open_files.len() >= self.max_open_files {
            return Err(FileError::TooManyOpenFiles);
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut meta_page = vec![0u8; PAGE_SIZE];
        file.read_exact(&mut meta_page)
            .map_err(|_| FileError::BadFileFormat(path.display().to_string()))?;
        let meta = FileMeta::deserialize(&meta_page)
            .ok_or_else(|| FileError::BadFileFormat(path.display().to_string()))?;

        let handle = FileHandle(self.next_handle);
        self.next_handle += 1;

        debug!("opened {} as handle {}", path.display(), handle.0);
        self.open_files.insert(
            handle,
            FileEntry {
                file,
                path: path.clone(),
                open_count: 1,
                meta,
            },
        );
        self.path_to_handle.insert(path, handle);

        Ok(handle)
    }

    /// Drop one open reference; the OS file is closed with the last one
    pub fn close_file(&mut self, handle: FileHandle) -> FileResult<()> {
        let entry = self.entry_mut(handle)?;
        entry.open_count -= 1;
        if entry.open_count > 0 {
            return Ok(());
        }

        if let Some(entry) = self.open_files.remove(&handle) {
            entry.file.sync_data()?;
            self.path_to_handle.remove(&entry.path);
            debug!("closed {}", entry.path.display());
        }
        Ok(())
    }

    /// Number of outstanding opens of a file
    pub fn open_count(&self, handle: FileHandle) -> FileResult<usize> {
        Ok(self.entry(handle)?.open_count)
    }

    /// Remove (delete) a file. Open files cannot be destroyed.
    pub fn destroy_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        if let Ok(canonical_path) = path.canonicalize() {
            if self.path_to_handle.contains_key(&canonical_path) {
                return Err(FileError::FileOpen(path.display().to_string()));
            }
        }

        std::fs::remove_file(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => FileError::FileNotFound(path.display().to_string()),
            _ => FileError::Io(err),
        })?;
        info!("destroyed paged file {}", path.display());
        Ok(())
    }

    /// Allocate a page, reusing a disposed one when available
    pub fn allocate_page(&mut self, handle: FileHandle) -> FileResult<PageId> {
        let entry = self.entry_mut(handle)?;
        let zeroed = vec![0u8; PAGE_SIZE];

        let page_id = match entry.meta.free_head {
            Some(free) => {
                let mut buffer = vec![0u8; PAGE_SIZE];
                entry.read_raw(free, &mut buffer)?;
                let next = i32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
                entry.meta.free_head = decode_page_link(next);
                free
            }
            None => {
                let page_id = entry.meta.page_count;
                entry.meta.page_count += 1;
                page_id
            }
        };

        entry.write_raw(page_id, &zeroed)?;
        if entry.meta.first_page.is_none() {
            entry.meta.first_page = Some(page_id);
        }
        entry.write_meta()?;

        Ok(page_id)
    }

    /// Return a page to the file's free list
    pub fn dispose_page(&mut self, handle: FileHandle, page_id: PageId) -> FileResult<()> {
        let entry = self.entry_mut(handle)?;
        entry.check_page(page_id)?;
        if entry.is_free(page_id)? {
            return Err(FileError::InvalidPage(page_id));
        }

        let mut buffer = vec![0u8; PAGE_SIZE];
        buffer[0..4].copy_from_slice(&encode_page_link(entry.meta.free_head).to_le_bytes());
        entry.write_raw(page_id, &buffer)?;

        entry.meta.free_head = Some(page_id);
        if entry.meta.first_page == Some(page_id) {
            entry.meta.first_page = None;
        }
        entry.write_meta()
    }

    /// Copy data page `page_id` into `buffer`
    pub fn read_page(
        &mut self,
        handle: FileHandle,
        page_id: PageId,
        buffer: &mut [u8],
    ) -> FileResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let entry = self.entry_mut(handle)?;
        entry.check_page(page_id)?;
        entry.read_raw(page_id, buffer)?;
        self.stats.reads += 1;

        Ok(())
    }

    /// Overwrite data page `page_id` with `buffer`
    pub fn write_page(
        &mut self,
        handle: FileHandle,
        page_id: PageId,
        buffer: &[u8],
    ) -> FileResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let entry = self.entry_mut(handle)?;
        entry.check_page(page_id)?;
        entry.write_raw(page_id, buffer)?;
        // Don't sync on every write; close_file and sync_all do that
        self.stats.writes += 1;

        Ok(())
    }

    /// First allocated page of a file, if any
    pub fn first_page(&self, handle: FileHandle) -> FileResult<Option<PageId>> {
        Ok(self.entry(handle)?.meta.first_page)
    }

    /// Get the number of physical pages in a file, metadata page included
    pub fn get_page_count(&self, handle: FileHandle) -> FileResult<u32> {
        Ok(self.entry(handle)?.meta.page_count)
    }

    /// fsync every open file
    pub fn sync_all(&mut self) -> FileResult<()> {
        for entry in self.open_files.values_mut() {
            entry.file.sync_data()?;
        }
        Ok(())
    }

    pub fn is_file_open(&self, handle: FileHandle) -> bool {
        self.open_files.contains_key(&handle)
    }

    /// Distinct open files, not counting repeated opens
    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }

    pub fn stats(&self) -> IoStats {
        self.stats
    }

    fn entry(&self, handle: FileHandle) -> FileResult<&FileEntry> {
        self.open_files
            .get(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))
    }

    fn entry_mut(&mut self, handle: FileHandle) -> FileResult<&mut FileEntry> {
        self.open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))
    }
}

impl Default for PagedFileManager {
    fn default() -> Self {
        Self::new()
    }
}
