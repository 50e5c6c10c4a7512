use std::path::Path;

use log::{debug, info, warn};

use super::error::{RecordError, RecordResult};
use super::page::{DataPage, DataPageMut, HeaderPage, HeaderPageMut};
use super::record::RecordId;
use crate::file::{BufferManager, FileHandle, PageId};

/// Create an empty heap file: a header page plus one empty data page
pub fn create_heap_file<P: AsRef<Path>>(buffer_mgr: &mut BufferManager, path: P) -> RecordResult<()> {
    let path = path.as_ref();
    buffer_mgr.file_manager_mut().create_file(path)?;
    let file = buffer_mgr.file_manager_mut().open_file(path)?;

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let result = init_heap_file(buffer_mgr, file, &name);
    let closed = buffer_mgr.close_file(file);
    if let Err(err) = result {
        if let Err(close_err) = closed {
            warn!("Error closing {}: {}", path.display(), close_err);
        }
        // Leave nothing behind so the create can be retried
        if let Err(destroy_err) = buffer_mgr.file_manager_mut().destroy_file(path) {
            warn!("Error removing {}: {}", path.display(), destroy_err);
        }
        return Err(err);
    }
    closed?;

    info!("Created heap file {}", path.display());
    Ok(())
}

fn init_heap_file(buffer_mgr: &mut BufferManager, file: FileHandle, name: &str) -> RecordResult<()> {
    let (header_page_no, header_buf) = buffer_mgr.alloc_page(file)?;
    HeaderPageMut::init(header_buf, name);

    let data_page_no = match buffer_mgr.alloc_page(file) {
        Ok((page_no, buf)) => {
            DataPageMut::init(buf, page_no);
            page_no
        }
        Err(err) => {
            buffer_mgr.unpin_page(file, header_page_no, true)?;
            return Err(err.into());
        }
    };

    let mut header = HeaderPageMut::new(buffer_mgr.page_mut(file, header_page_no)?);
    header.set_first_page(Some(data_page_no));
    header.set_last_page(Some(data_page_no));
    header.set_page_cnt(1);
    header.set_rec_cnt(0);

    buffer_mgr.unpin_page(file, data_page_no, true)?;
    buffer_mgr.unpin_page(file, header_page_no, true)?;
    Ok(())
}

/// Remove a heap file from disk. The file must not be open.
pub fn destroy_heap_file<P: AsRef<Path>>(buffer_mgr: &mut BufferManager, path: P) -> RecordResult<()> {
    buffer_mgr.file_manager_mut().destroy_file(path.as_ref())?;
    info!("Destroyed heap file {}", path.as_ref().display());
    Ok(())
}

/// An open heap file.
///
/// Holds the header page pinned for its whole lifetime and at most one data
/// page (the cursor) pinned at a time. `cur_page_no` is `Some` exactly when
/// a data page is pinned. Must be released with [`HeapFile::close`].
pub struct HeapFile {
    pub(super) file: FileHandle,
    header_page_no: PageId,
    header_dirty: bool,
    pub(super) cur_page_no: Option<PageId>,
    pub(super) cur_dirty: bool,
    pub(super) cur_rec: Option<RecordId>,
    closed: bool,
}

impl HeapFile {
    pub fn open<P: AsRef<Path>>(buffer_mgr: &mut BufferManager, path: P) -> RecordResult<Self> {
        let path = path.as_ref();
        let file = buffer_mgr.file_manager_mut().open_file(path)?;
        match Self::pin_initial(buffer_mgr, file) {
            Ok(heap_file) => {
                debug!("Opened heap file {}", path.display());
                Ok(heap_file)
            }
            Err(err) => {
                if let Err(close_err) = buffer_mgr.close_file(file) {
                    warn!("Error closing {} after failed open: {}", path.display(), close_err);
                }
                Err(err)
            }
        }
    }

    fn pin_initial(buffer_mgr: &mut BufferManager, file: FileHandle) -> RecordResult<Self> {
        let header_page_no = buffer_mgr
            .file_manager()
            .first_page(file)?
            .ok_or_else(|| RecordError::InvalidHeader("file has no header page".to_string()))?;

        let header = buffer_mgr.read_page(file, header_page_no)?;
        let first_page = HeaderPage::new(header).first_page();

        let mut heap_file = Self {
            file,
            header_page_no,
            header_dirty: false,
            cur_page_no: None,
            cur_dirty: false,
            cur_rec: None,
            closed: false,
        };

        if let Some(first_page) = first_page {
            if let Err(err) = buffer_mgr.read_page(file, first_page) {
                if let Err(unpin_err) = buffer_mgr.unpin_page(file, header_page_no, false) {
                    warn!("Error unpinning header page {}: {}", header_page_no, unpin_err);
                }
                heap_file.closed = true;
                return Err(err.into());
            }
            heap_file.cur_page_no = Some(first_page);
        }
        Ok(heap_file)
    }

    /// Unpin every held page and close the file. Every step is attempted;
    /// the first failure is returned.
    pub fn close(mut self, buffer_mgr: &mut BufferManager) -> RecordResult<()> {
        let mut first_err: Option<RecordError> = None;

        if let Some(page_no) = self.cur_page_no.take() {
            if let Err(err) = buffer_mgr.unpin_page(self.file, page_no, self.cur_dirty) {
                warn!("Error unpinning data page {}: {}", page_no, err);
                first_err.get_or_insert(err.into());
            }
        }
        if let Err(err) = buffer_mgr.unpin_page(self.file, self.header_page_no, self.header_dirty) {
            warn!("Error unpinning header page {}: {}", self.header_page_no, err);
            first_err.get_or_insert(err.into());
        }
        if let Err(err) = buffer_mgr.close_file(self.file) {
            warn!("Error closing heap file: {}", err);
            first_err.get_or_insert(err.into());
        }

        self.closed = true;
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn file_handle(&self) -> FileHandle {
        self.file
    }

    pub fn header_page_no(&self) -> PageId {
        self.header_page_no
    }

    /// Data page currently pinned as the cursor
    pub fn current_page(&self) -> Option<PageId> {
        self.cur_page_no
    }

    pub fn header<'a>(&self, buffer_mgr: &'a BufferManager) -> RecordResult<HeaderPage<'a>> {
        Ok(HeaderPage::new(buffer_mgr.page(self.file, self.header_page_no)?))
    }

    pub(super) fn header_mut<'a>(
        &mut self,
        buffer_mgr: &'a mut BufferManager,
    ) -> RecordResult<HeaderPageMut<'a>> {
        self.header_dirty = true;
        Ok(HeaderPageMut::new(buffer_mgr.page_mut(self.file, self.header_page_no)?))
    }

    pub fn rec_cnt(&self, buffer_mgr: &BufferManager) -> RecordResult<u32> {
        Ok(self.header(buffer_mgr)?.rec_cnt())
    }

    pub fn page_cnt(&self, buffer_mgr: &BufferManager) -> RecordResult<u32> {
        Ok(self.header(buffer_mgr)?.page_cnt())
    }

    pub fn file_name(&self, buffer_mgr: &BufferManager) -> RecordResult<String> {
        Ok(self.header(buffer_mgr)?.file_name())
    }

    /// Fetch a record by id, moving the cursor to its page
    pub fn get_record<'a>(
        &mut self,
        buffer_mgr: &'a mut BufferManager,
        rid: RecordId,
    ) -> RecordResult<&'a [u8]> {
        self.switch_to(buffer_mgr, rid.page_id)?;
        let buffer_mgr: &'a BufferManager = buffer_mgr;
        let record = DataPage::new(buffer_mgr.page(self.file, rid.page_id)?).record(rid.slot_id)?;
        self.cur_rec = Some(rid);
        Ok(record)
    }

    /// Make `page_no` the pinned cursor page, releasing the previous one
    pub(super) fn switch_to(&mut self, buffer_mgr: &mut BufferManager, page_no: PageId) -> RecordResult<()> {
        if self.cur_page_no == Some(page_no) {
            return Ok(());
        }
        if let Some(cur) = self.cur_page_no.take() {
            let dirty = std::mem::take(&mut self.cur_dirty);
            buffer_mgr.unpin_page(self.file, cur, dirty)?;
        }
        buffer_mgr.read_page(self.file, page_no)?;
        self.cur_page_no = Some(page_no);
        self.cur_dirty = false;
        Ok(())
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                "Heap file dropped without close: header page {} and data page {:?} stay pinned",
                self.header_page_no, self.cur_page_no
            );
        }
    }
}
