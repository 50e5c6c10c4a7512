use log::{debug, warn};

use super::error::{FileError, FileResult};
use super::file_manager::{FileHandle, PagedFileManager};
use super::hash_table::BufHashTable;
use super::{BUFFER_POOL_SIZE, FrameId, PAGE_SIZE, PageId};

/// Bookkeeping for one buffer pool frame
#[derive(Debug, Clone)]
pub struct FrameDesc {
    frame_no: FrameId,
    file: Option<FileHandle>,
    page_id: Option<PageId>,
    pin_count: u32,
    dirty: bool,
    valid: bool,
    ref_bit: bool,
}

impl FrameDesc {
    fn new(frame_no: FrameId) -> Self {
        Self {
            frame_no,
            file: None,
            page_id: None,
            pin_count: 0,
            dirty: false,
            valid: false,
            ref_bit: false,
        }
    }

    /// Mark the frame as holding `page_id` of `file`, pinned once
    fn set(&mut self, file: FileHandle, page_id: PageId) {
        self.file = Some(file);
        self.page_id = Some(page_id);
        self.pin_count = 1;
        self.dirty = false;
        self.valid = true;
        self.ref_bit = true;
    }

    fn clear(&mut self) {
        self.file = None;
        self.page_id = None;
        self.pin_count = 0;
        self.dirty = false;
        self.valid = false;
        self.ref_bit = false;
    }

    pub fn frame_no(&self) -> FrameId {
        self.frame_no
    }

    pub fn file(&self) -> Option<FileHandle> {
        self.file
    }

    pub fn page_id(&self) -> Option<PageId> {
        self.page_id
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn ref_bit(&self) -> bool {
        self.ref_bit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockPass {
    /// Referenced frames lose their reference bit and survive
    SecondChance,
    /// Frames still referenced are treated as busy
    Final,
}

/// Manages a fixed pool of page frames with pin counts and clock eviction.
///
/// Pages are handed out as borrowed slices. A page stays resident while its
/// pin count is positive; callers must balance every `read_page` and
/// `alloc_page` with exactly one `unpin_page`.
pub struct BufferManager {
    /// Underlying file manager
    file_manager: PagedFileManager,
    /// One descriptor per frame, index-aligned with `pool`
    frames: Vec<FrameDesc>,
    pool: Vec<Vec<u8>>,
    hash_table: BufHashTable,
    /// Next frame the clock examines
    clock_hand: FrameId,
}

impl BufferManager {
    /// Create a new buffer manager
    pub fn new(file_manager: PagedFileManager) -> Self {
        Self::with_capacity(file_manager, BUFFER_POOL_SIZE)
    }

    /// Create a new buffer manager with specified number of frames
    pub fn with_capacity(file_manager: PagedFileManager, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            file_manager,
            frames: (0..capacity).map(FrameDesc::new).collect(),
            pool: (0..capacity).map(|_| vec![0u8; PAGE_SIZE]).collect(),
            hash_table: BufHashTable::for_pool(capacity),
            clock_hand: 0,
        }
    }

    /// Get a reference to the file manager
    pub fn file_manager(&self) -> &PagedFileManager {
        &self.file_manager
    }

    /// Get a mutable reference to the file manager
    pub fn file_manager_mut(&mut self) -> &mut PagedFileManager {
        &mut self.file_manager
    }

    /// Pin a page, loading it from disk if it is not resident
    pub fn read_page(&mut self, file: FileHandle, page_id: PageId) -> FileResult<&mut [u8]> {
        if let Some(frame_no) = self.hash_table.lookup(file, page_id) {
            let frame = &mut self.frames[frame_no];
            frame.ref_bit = true;
            frame.pin_count += 1;
            debug!("page {page_id} hit in frame {frame_no}, pins={}", frame.pin_count);
            return Ok(self.pool[frame_no].as_mut_slice());
        }

        let frame_no = self.alloc_buf()?;
        // On failure the frame stays invalid and unregistered
        if let Err(err) = self
            .file_manager
            .read_page(file, page_id, &mut self.pool[frame_no])
        {
            return Err(FileError::ReadFailed {
                page_id,
                source: Box::new(err),
            });
        }

        self.hash_table.insert(file, page_id, frame_no)?;
        self.frames[frame_no].set(file, page_id);
        debug!("page {page_id} loaded into frame {frame_no}");

        Ok(self.pool[frame_no].as_mut_slice())
    }

    /// Drop one pin. A dirty unpin marks the frame dirty until it is written.
    pub fn unpin_page(&mut self, file: FileHandle, page_id: PageId, dirty: bool) -> FileResult<()> {
        let frame_no = self
            .hash_table
            .lookup(file, page_id)
            .ok_or(FileError::PageNotFound(page_id))?;

        let frame = &mut self.frames[frame_no];
        if frame.pin_count == 0 {
            return Err(FileError::NotPinned(page_id));
        }

        frame.pin_count -= 1;
        if dirty {
            frame.dirty = true;
        }

        Ok(())
    }

    /// Allocate a new page in `file` and pin a zeroed frame for it. The
    /// frame starts dirty since its contents exist only in memory.
    pub fn alloc_page(&mut self, file: FileHandle) -> FileResult<(PageId, &mut [u8])> {
        let page_id = self.file_manager.allocate_page(file)?;

        let frame_no = match self.alloc_buf() {
            Ok(frame_no) => frame_no,
            Err(err) => {
                if let Err(dispose_err) = self.file_manager.dispose_page(file, page_id) {
                    warn!("could not return page {page_id} after failed allocation: {dispose_err}");
                }
                return Err(err);
            }
        };

        self.hash_table.insert(file, page_id, frame_no)?;
        let frame = &mut self.frames[frame_no];
        frame.set(file, page_id);
        frame.dirty = true;
        debug!("page {page_id} allocated into frame {frame_no}");

        let page = self.pool[frame_no].as_mut_slice();
        page.fill(0);
        Ok((page_id, page))
    }

    /// Drop a page from the pool (if resident) and free it on disk
    pub fn dispose_page(&mut self, file: FileHandle, page_id: PageId) -> FileResult<()> {
        if let Some(frame_no) = self.hash_table.lookup(file, page_id) {
            if self.frames[frame_no].pin_count > 0 {
                return Err(FileError::PagePinned(page_id));
            }
            self.hash_table.remove(file, page_id)?;
            self.frames[frame_no].clear();
        }

        self.file_manager.dispose_page(file, page_id)
    }

    /// Write back and evict every frame of `file`. Fails on the first pinned
    /// frame; frames examined before it stay flushed.
    pub fn flush_file(&mut self, file: FileHandle) -> FileResult<()> {
        for frame_no in 0..self.frames.len() {
            let frame = &self.frames[frame_no];
            if frame.file != Some(file) {
                continue;
            }
            if !frame.valid {
                return Err(FileError::InconsistentState(frame_no));
            }
            let page_id = frame
                .page_id
                .ok_or(FileError::InconsistentState(frame_no))?;
            if frame.pin_count > 0 {
                return Err(FileError::PagePinned(page_id));
            }

            if frame.dirty {
                debug!("flushing page {page_id} from frame {frame_no}");
                self.write_frame(frame_no, file, page_id)?;
                self.frames[frame_no].dirty = false;
            }

            self.hash_table.remove(file, page_id)?;
            self.frames[frame_no].clear();
        }

        Ok(())
    }

    /// Write back every dirty frame without evicting anything
    pub fn flush_all(&mut self) -> FileResult<()> {
        for frame_no in 0..self.frames.len() {
            let frame = &self.frames[frame_no];
            if !frame.valid || !frame.dirty {
                continue;
            }
            if let (Some(file), Some(page_id)) = (frame.file, frame.page_id) {
                self.write_frame(frame_no, file, page_id)?;
                self.frames[frame_no].dirty = false;
            }
        }

        self.file_manager.sync_all()
    }

    /// Close one open reference to `file`, flushing its frames first when it
    /// is the last one.
    pub fn close_file(&mut self, file: FileHandle) -> FileResult<()> {
        if self.file_manager.open_count(file)? == 1 {
            self.flush_file(file)?;
        }
        self.file_manager.close_file(file)
    }

    /// Borrow a resident, pinned page
    pub fn page(&self, file: FileHandle, page_id: PageId) -> FileResult<&[u8]> {
        let frame_no = self.pinned_frame(file, page_id)?;
        Ok(self.pool[frame_no].as_slice())
    }

    /// Mutably borrow a resident, pinned page
    pub fn page_mut(&mut self, file: FileHandle, page_id: PageId) -> FileResult<&mut [u8]> {
        let frame_no = self.pinned_frame(file, page_id)?;
        Ok(self.pool[frame_no].as_mut_slice())
    }

    /// Number of frames in the pool
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, frame_no: FrameId) -> Option<&FrameDesc> {
        self.frames.get(frame_no)
    }

    pub fn clock_hand(&self) -> FrameId {
        self.clock_hand
    }

    /// Sum of pin counts over all frames
    pub fn total_pins(&self) -> u32 {
        self.frames.iter().map(|f| f.pin_count).sum()
    }

    /// Check if a page is in the buffer pool
    pub fn is_page_cached(&self, file: FileHandle, page_id: PageId) -> bool {
        self.hash_table.lookup(file, page_id).is_some()
    }

    /// Pin count of a resident page
    pub fn pin_count(&self, file: FileHandle, page_id: PageId) -> Option<u32> {
        self.hash_table
            .lookup(file, page_id)
            .map(|frame_no| self.frames[frame_no].pin_count)
    }

    /// Get the number of dirty pages in the buffer pool
    pub fn dirty_page_count(&self) -> usize {
        self.frames.iter().filter(|f| f.valid && f.dirty).count()
    }

    /// Choose a frame to (re)use with the clock algorithm, writing back a
    /// dirty victim. The returned frame is invalid and unregistered.
    fn alloc_buf(&mut self) -> FileResult<FrameId> {
        for pass in [ClockPass::SecondChance, ClockPass::Final] {
            for _ in 0..self.frames.len() {
                let frame_no = self.clock_hand;
                self.advance_clock();

                let frame = &mut self.frames[frame_no];
                if !frame.valid {
                    return Ok(frame_no);
                }
                if frame.ref_bit {
                    if pass == ClockPass::SecondChance {
                        frame.ref_bit = false;
                    }
                    continue;
                }
                if frame.pin_count > 0 {
                    continue;
                }

                self.evict(frame_no)?;
                return Ok(frame_no);
            }
        }

        Err(FileError::BufferExceeded)
    }

    fn evict(&mut self, frame_no: FrameId) -> FileResult<()> {
        let frame = &self.frames[frame_no];
        if let (Some(file), Some(page_id)) = (frame.file, frame.page_id) {
            if frame.dirty {
                debug!("evicting dirty page {page_id} from frame {frame_no}");
                self.write_frame(frame_no, file, page_id)?;
            } else {
                debug!("evicting page {page_id} from frame {frame_no}");
            }
            self.hash_table.remove(file, page_id)?;
        }
        self.frames[frame_no].clear();
        Ok(())
    }

    fn write_frame(&mut self, frame_no: FrameId, file: FileHandle, page_id: PageId) -> FileResult<()> {
        self.file_manager
            .write_page(file, page_id, &self.pool[frame_no])
            .map_err(|err| FileError::WriteFailed {
                page_id,
                source: Box::new(err),
            })
    }

    fn pinned_frame(&self, file: FileHandle, page_id: PageId) -> FileResult<FrameId> {
        let frame_no = self
            .hash_table
            .lookup(file, page_id)
            .ok_or(FileError::PageNotFound(page_id))?;
        if self.frames[frame_no].pin_count == 0 {
            return Err(FileError::NotPinned(page_id));
        }
        Ok(frame_no)
    }

    fn advance_clock(&mut self) {
        self.clock_hand = (self.clock_hand + 1) % self.frames.len();
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        // Flush all dirty pages when the buffer manager is dropped
        if let Err(err) = self.flush_all() {
            warn!("failed to flush buffer pool on shutdown: {err}");
        }
    }
}
