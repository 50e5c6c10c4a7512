use ahash::RandomState;

use super::error::{FileError, FileResult};
use super::file_manager::FileHandle;
use super::{FrameId, PageId};

/// A key identifying a page in the buffer pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BufferKey {
    file: FileHandle,
    page_id: PageId,
}

/// Open-addressing (linear probing) map from (file, page) to the frame
/// caching it. Removal shifts displaced entries back, so no tombstones are
/// left behind and probe chains stay short.
pub struct BufHashTable {
    slots: Vec<Option<(BufferKey, FrameId)>>,
    len: usize,
    hasher: RandomState,
}

impl BufHashTable {
    /// Create a table with exactly `size` slots
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            slots: vec![None; size],
            len: 0,
            hasher: RandomState::new(),
        }
    }

    /// Table for a pool of `frames` frames: about 1.2x larger, odd sized
    pub fn for_pool(frames: usize) -> Self {
        let size = (frames * 6 / 5).max(frames + 1) | 1;
        Self::new(size)
    }

    pub fn lookup(&self, file: FileHandle, page_id: PageId) -> Option<FrameId> {
        let key = BufferKey { file, page_id };
        self.find(&key).and_then(|idx| self.slots[idx].map(|(_, frame)| frame))
    }

    pub fn insert(&mut self, file: FileHandle, page_id: PageId, frame: FrameId) -> FileResult<()> {
        let key = BufferKey { file, page_id };
        if self.find(&key).is_some() {
            return Err(FileError::HashEntryExists(page_id));
        }
        if self.len == self.slots.len() {
            return Err(FileError::HashTableFull);
        }

        let mut idx = self.home(&key);
        while self.slots[idx].is_some() {
            idx = self.next(idx);
        }
        self.slots[idx] = Some((key, frame));
        self.len += 1;
        Ok(())
    }

    pub fn remove(&mut self, file: FileHandle, page_id: PageId) -> FileResult<FrameId> {
        let key = BufferKey { file, page_id };
        let mut hole = self
            .find(&key)
            .ok_or(FileError::HashEntryNotFound(page_id))?;
        let frame = match self.slots[hole].take() {
            Some((_, frame)) => frame,
            None => return Err(FileError::HashEntryNotFound(page_id)),
        };
        self.len -= 1;

        // Backward shift: pull later entries of the cluster into the hole
        // when the hole lies on their probe path.
        let n = self.slots.len();
        let mut idx = self.next(hole);
        while let Some((moved_key, _)) = self.slots[idx] {
            let home = self.home(&moved_key);
            let hole_dist = (hole + n - home) % n;
            let idx_dist = (idx + n - home) % n;
            if hole_dist < idx_dist {
                self.slots[hole] = self.slots[idx].take();
                hole = idx;
            }
            idx = self.next(idx);
        }

        Ok(frame)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots in the table
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    fn find(&self, key: &BufferKey) -> Option<usize> {
        let mut idx = self.home(key);
        for _ in 0..self.slots.len() {
            match &self.slots[idx] {
                None => return None,
                Some((k, _)) if k == key => return Some(idx),
                Some(_) => idx = self.next(idx),
            }
        }
        None
    }

    fn home(&self, key: &BufferKey) -> usize {
        (self.hasher.hash_one(key) % self.slots.len() as u64) as usize
    }

    fn next(&self, idx: usize) -> usize {
        (idx + 1) % self.slots.len()
    }
}
