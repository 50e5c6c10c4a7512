use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::{debug, warn};

use super::error::{RecordError, RecordResult};
use super::heap_file::HeapFile;
use super::page::{DataPage, DataPageMut, MAX_RECORD_LEN};
use super::record::RecordId;
use super::value::AttrType;
use crate::file::{BufferManager, PageId};

/// Comparison operator of a scan predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Lte,
    Eq,
    Gte,
    Gt,
    Ne,
}

impl Operator {
    /// Apply to the ordering of record value against filter value.
    /// `None` (unordered floats) only satisfies `Ne`.
    fn holds(self, ord: Option<Ordering>) -> bool {
        match ord {
            None => self == Operator::Ne,
            Some(ord) => match self {
                Operator::Lt => ord == Ordering::Less,
                Operator::Lte => ord != Ordering::Greater,
                Operator::Eq => ord == Ordering::Equal,
                Operator::Gte => ord != Ordering::Less,
                Operator::Gt => ord == Ordering::Greater,
                Operator::Ne => ord != Ordering::Equal,
            },
        }
    }
}

impl FromStr for Operator {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            "=" | "==" => Ok(Operator::Eq),
            ">=" => Ok(Operator::Gte),
            ">" => Ok(Operator::Gt),
            "!=" | "<>" => Ok(Operator::Ne),
            other => Err(RecordError::BadScanParameter(format!(
                "unknown operator '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Eq => "=",
            Operator::Gte => ">=",
            Operator::Gt => ">",
            Operator::Ne => "!=",
        };
        f.write_str(symbol)
    }
}

/// Predicate on `length` bytes at `offset` of a record
#[derive(Debug, Clone)]
pub struct ScanFilter {
    offset: usize,
    length: usize,
    attr_type: AttrType,
    value: Vec<u8>,
    op: Operator,
}

impl ScanFilter {
    pub fn new(
        offset: usize,
        length: usize,
        attr_type: AttrType,
        value: &[u8],
        op: Operator,
    ) -> RecordResult<Self> {
        if length < 1 {
            return Err(RecordError::BadScanParameter(
                "filter length must be at least 1".to_string(),
            ));
        }
        if offset + length > MAX_RECORD_LEN {
            return Err(RecordError::BadScanParameter(format!(
                "filter bytes {}..{} lie outside any record",
                offset,
                offset + length
            )));
        }
        if let Some(size) = attr_type.fixed_size() {
            if length != size || value.len() != size {
                return Err(RecordError::BadScanParameter(format!(
                    "{} filter must be {} bytes",
                    attr_type, size
                )));
            }
        }

        // Strings compare on at most `length` bytes
        let mut value = value.to_vec();
        value.resize(length, 0);

        Ok(Self {
            offset,
            length,
            attr_type,
            value,
            op,
        })
    }

    pub fn matches(&self, record: &[u8]) -> bool {
        let Some(field) = record.get(self.offset..self.offset + self.length) else {
            return false;
        };

        let ord = match self.attr_type {
            AttrType::Integer => {
                let (Ok(a), Ok(b)) = (field.try_into(), self.value.as_slice().try_into()) else {
                    return false;
                };
                Some(i32::from_le_bytes(a).cmp(&i32::from_le_bytes(b)))
            }
            AttrType::Float => {
                let (Ok(a), Ok(b)) = (field.try_into(), self.value.as_slice().try_into()) else {
                    return false;
                };
                f32::from_le_bytes(a).partial_cmp(&f32::from_le_bytes(b))
            }
            AttrType::String => Some(compare_strings(field, &self.value)),
        };
        self.op.holds(ord)
    }
}

/// Byte-wise comparison that stops at the first zero byte
fn compare_strings(a: &[u8], b: &[u8]) -> Ordering {
    for (&x, &y) in a.iter().zip(b) {
        if x != y {
            return x.cmp(&y);
        }
        if x == 0 {
            break;
        }
    }
    Ordering::Equal
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Unstarted,
    Scanning,
    Ended,
}

#[derive(Debug, Clone, Copy)]
struct ScanMark {
    page_no: Option<PageId>,
    rec: Option<RecordId>,
}

/// Forward scan over a heap file with an optional predicate
pub struct HeapFileScan {
    heap_file: HeapFile,
    filter: Option<ScanFilter>,
    state: ScanState,
    marked: Option<ScanMark>,
}

impl HeapFileScan {
    pub fn open<P: AsRef<Path>>(buffer_mgr: &mut BufferManager, path: P) -> RecordResult<Self> {
        Ok(Self {
            heap_file: HeapFile::open(buffer_mgr, path)?,
            filter: None,
            state: ScanState::Unstarted,
            marked: None,
        })
    }

    /// Set the predicate. `None` scans every record; the other parameters
    /// are only checked when a filter value is given.
    pub fn start_scan(
        &mut self,
        offset: usize,
        length: usize,
        attr_type: AttrType,
        filter: Option<&[u8]>,
        op: Operator,
    ) -> RecordResult<()> {
        self.filter = match filter {
            Some(value) => Some(ScanFilter::new(offset, length, attr_type, value, op)?),
            None => None,
        };
        self.state = ScanState::Scanning;
        Ok(())
    }

    /// Advance to the next matching record. `Ok(None)` at end of file.
    pub fn scan_next(&mut self, buffer_mgr: &mut BufferManager) -> RecordResult<Option<RecordId>> {
        match self.state {
            ScanState::Ended => return Ok(None),
            ScanState::Unstarted => self.state = ScanState::Scanning,
            ScanState::Scanning => {}
        }

        let heap_file = &mut self.heap_file;
        let file = heap_file.file;

        let mut page_no = match heap_file.cur_page_no {
            Some(page_no) => page_no,
            None => {
                let Some(first) = heap_file.header(buffer_mgr)?.first_page() else {
                    self.state = ScanState::Ended;
                    return Ok(None);
                };
                heap_file.switch_to(buffer_mgr, first)?;
                heap_file.cur_rec = None;
                first
            }
        };

        let mut candidate = {
            let page = DataPage::new(buffer_mgr.page(file, page_no)?);
            match heap_file.cur_rec {
                Some(rid) if rid.page_id == page_no => page.next_record(rid.slot_id),
                _ => page.first_record(),
            }
        };

        loop {
            match candidate {
                Some(slot_id) => {
                    let page = DataPage::new(buffer_mgr.page(file, page_no)?);
                    let record = page.record(slot_id)?;
                    if self.filter.as_ref().is_none_or(|f| f.matches(record)) {
                        let rid = RecordId::new(page_no, slot_id);
                        heap_file.cur_rec = Some(rid);
                        return Ok(Some(rid));
                    }
                    candidate = page.next_record(slot_id);
                }
                None => {
                    let next = DataPage::new(buffer_mgr.page(file, page_no)?).next_page();
                    let Some(next) = next else {
                        // Nothing is current past the end of the chain
                        heap_file.cur_rec = None;
                        self.state = ScanState::Ended;
                        return Ok(None);
                    };
                    heap_file.switch_to(buffer_mgr, next)?;
                    heap_file.cur_rec = None;
                    page_no = next;
                    candidate = DataPage::new(buffer_mgr.page(file, page_no)?).first_record();
                }
            }
        }
    }

    /// Remember the current position for [`HeapFileScan::reset_scan`]
    pub fn mark_scan(&mut self) {
        self.marked = Some(ScanMark {
            page_no: self.heap_file.cur_page_no,
            rec: self.heap_file.cur_rec,
        });
    }

    pub fn reset_scan(&mut self, buffer_mgr: &mut BufferManager) -> RecordResult<()> {
        let mark = self.marked.ok_or(RecordError::NoMarkedPosition)?;
        let heap_file = &mut self.heap_file;

        if mark.page_no != heap_file.cur_page_no {
            match mark.page_no {
                Some(page_no) => heap_file.switch_to(buffer_mgr, page_no)?,
                None => {
                    if let Some(cur) = heap_file.cur_page_no.take() {
                        let dirty = std::mem::take(&mut heap_file.cur_dirty);
                        buffer_mgr.unpin_page(heap_file.file, cur, dirty)?;
                    }
                }
            }
        }
        heap_file.cur_rec = mark.rec;
        self.state = ScanState::Scanning;
        Ok(())
    }

    /// Record id of the last returned record
    pub fn current_rid(&self) -> Option<RecordId> {
        self.heap_file.cur_rec
    }

    fn current_record(&self) -> RecordResult<RecordId> {
        let rid = self.heap_file.cur_rec.ok_or(RecordError::NoCurrentRecord)?;
        if self.heap_file.cur_page_no != Some(rid.page_id) {
            return Err(RecordError::NoCurrentRecord);
        }
        Ok(rid)
    }

    /// Bytes of the last returned record
    pub fn get_record<'a>(&self, buffer_mgr: &'a BufferManager) -> RecordResult<&'a [u8]> {
        let rid = self.current_record()?;
        DataPage::new(buffer_mgr.page(self.heap_file.file, rid.page_id)?).record(rid.slot_id)
    }

    /// Mutable bytes of the last returned record; marks the page dirty
    pub fn get_record_mut<'a>(&mut self, buffer_mgr: &'a mut BufferManager) -> RecordResult<&'a mut [u8]> {
        let rid = self.current_record()?;
        self.heap_file.cur_dirty = true;
        let buf = buffer_mgr.page_mut(self.heap_file.file, rid.page_id)?;
        DataPageMut::new(buf).into_record_mut(rid.slot_id)
    }

    /// Delete the last returned record
    pub fn delete_record(&mut self, buffer_mgr: &mut BufferManager) -> RecordResult<()> {
        let rid = self.current_record()?;
        let heap_file = &mut self.heap_file;

        DataPageMut::new(buffer_mgr.page_mut(heap_file.file, rid.page_id)?).delete_record(rid.slot_id)?;
        heap_file.cur_dirty = true;

        let mut header = heap_file.header_mut(buffer_mgr)?;
        let rec_cnt = header.as_page().rec_cnt();
        header.set_rec_cnt(rec_cnt.saturating_sub(1));
        debug!("Deleted record {}", rid);
        Ok(())
    }

    pub fn mark_dirty(&mut self) {
        self.heap_file.cur_dirty = true;
    }

    /// Release the cursor page. Calling it again does nothing.
    pub fn end_scan(&mut self, buffer_mgr: &mut BufferManager) -> RecordResult<()> {
        let heap_file = &mut self.heap_file;
        let pinned = heap_file.cur_page_no.take();
        let dirty = std::mem::take(&mut heap_file.cur_dirty);
        heap_file.cur_rec = None;
        self.state = ScanState::Ended;

        if let Some(page_no) = pinned {
            buffer_mgr.unpin_page(heap_file.file, page_no, dirty)?;
        }
        Ok(())
    }

    /// End the scan and close the heap file, attempting both
    pub fn close(mut self, buffer_mgr: &mut BufferManager) -> RecordResult<()> {
        let ended = self.end_scan(buffer_mgr);
        if let Err(err) = &ended {
            warn!("Error ending scan: {}", err);
        }
        let closed = self.heap_file.close(buffer_mgr);
        ended.and(closed)
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn heap_file(&self) -> &HeapFile {
        &self.heap_file
    }
}

/// Appends records to the end of a heap file
pub struct InsertFileScan {
    heap_file: HeapFile,
}

impl InsertFileScan {
    pub fn open<P: AsRef<Path>>(buffer_mgr: &mut BufferManager, path: P) -> RecordResult<Self> {
        let mut heap_file = HeapFile::open(buffer_mgr, path)?;

        let positioned = match heap_file.header(buffer_mgr).map(|header| header.last_page()) {
            Ok(Some(last)) => heap_file.switch_to(buffer_mgr, last),
            Ok(None) => Ok(()),
            Err(err) => Err(err),
        };
        if let Err(err) = positioned {
            if let Err(close_err) = heap_file.close(buffer_mgr) {
                warn!("Error closing heap file after failed open: {}", close_err);
            }
            return Err(err);
        }

        Ok(Self { heap_file })
    }

    pub fn insert_record(&mut self, buffer_mgr: &mut BufferManager, record: &[u8]) -> RecordResult<RecordId> {
        if record.len() > MAX_RECORD_LEN {
            return Err(RecordError::InvalidRecordLength {
                length: record.len(),
                max: MAX_RECORD_LEN,
            });
        }

        let heap_file = &mut self.heap_file;
        let file = heap_file.file;
        let last = heap_file
            .header(buffer_mgr)?
            .last_page()
            .ok_or_else(|| RecordError::InvalidHeader("heap file has no data pages".to_string()))?;
        heap_file.switch_to(buffer_mgr, last)?;

        let inserted = DataPageMut::new(buffer_mgr.page_mut(file, last)?).insert_record(record);
        let rid = match inserted {
            Ok(slot_id) => RecordId::new(last, slot_id),
            Err(RecordError::NoSpace(_)) => {
                let (new_page_no, buf) = buffer_mgr.alloc_page(file)?;
                DataPageMut::init(buf, new_page_no);

                DataPageMut::new(buffer_mgr.page_mut(file, last)?).set_next_page(Some(new_page_no));
                let unpinned = buffer_mgr.unpin_page(file, last, true);
                heap_file.cur_page_no = Some(new_page_no);
                heap_file.cur_dirty = true;
                unpinned?;

                let mut header = heap_file.header_mut(buffer_mgr)?;
                let page_cnt = header.as_page().page_cnt();
                header.set_last_page(Some(new_page_no));
                header.set_page_cnt(page_cnt + 1);
                debug!("Linked overflow page {} after {}", new_page_no, last);

                let slot_id = DataPageMut::new(buffer_mgr.page_mut(file, new_page_no)?).insert_record(record)?;
                RecordId::new(new_page_no, slot_id)
            }
            Err(err) => return Err(err),
        };

        heap_file.cur_dirty = true;
        heap_file.cur_rec = Some(rid);
        let mut header = heap_file.header_mut(buffer_mgr)?;
        let rec_cnt = header.as_page().rec_cnt();
        header.set_rec_cnt(rec_cnt + 1);
        Ok(rid)
    }

    pub fn close(self, buffer_mgr: &mut BufferManager) -> RecordResult<()> {
        self.heap_file.close(buffer_mgr)
    }

    pub fn heap_file(&self) -> &HeapFile {
        &self.heap_file
    }
}
