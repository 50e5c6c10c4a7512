use super::error::{RecordError, RecordResult};
use super::record::SlotId;
use crate::file::{PAGE_SIZE, PageId, decode_page_link, encode_page_link};

/// Size of the fixed data page header
pub const DPFIXED: usize = 16;

/// Size of one slot directory entry (offset + length)
pub const SLOT_SIZE: usize = 4;

/// Largest record that fits on an empty data page
pub const MAX_RECORD_LEN: usize = PAGE_SIZE - DPFIXED - SLOT_SIZE;

/// Longest file name stored in a heap file header
pub const MAX_NAME_LEN: usize = 64;

/// Slot offset marking a deleted record
const DELETED: u16 = u16::MAX;

// Data page layout (little endian):
//   0..4   next page link (-1 = end of chain)
//   4..8   own page number
//   8..10  slot count
//   10..12 free pointer: start of the record area, which grows down from PAGE_SIZE
//   16..   slot directory, SLOT_SIZE bytes per slot, growing up
const NEXT_PAGE: usize = 0;
const PAGE_NO: usize = 4;
const SLOT_CNT: usize = 8;
const FREE_PTR: usize = 10;

// Header page layout (little endian):
const FIRST_PAGE: usize = 0;
const LAST_PAGE: usize = 4;
const PAGE_CNT: usize = 8;
const REC_CNT: usize = 12;
const NAME_LEN: usize = 16;
const NAME: usize = 17;

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn write_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn read_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn write_i32(buf: &mut [u8], at: usize, value: i32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Read-only view of a data page living in a buffer frame.
///
/// Records are addressed by slot; deleted slots stay in the directory and
/// their space is not reclaimed.
#[derive(Clone, Copy)]
pub struct DataPage<'a> {
    buf: &'a [u8],
}

impl<'a> DataPage<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        Self { buf }
    }

    pub fn page_no(&self) -> PageId {
        read_i32(self.buf, PAGE_NO) as PageId
    }

    pub fn next_page(&self) -> Option<PageId> {
        decode_page_link(read_i32(self.buf, NEXT_PAGE))
    }

    /// Number of slot directory entries, deleted ones included
    pub fn slot_count(&self) -> usize {
        read_u16(self.buf, SLOT_CNT) as usize
    }

    /// Bytes left for one more record and its slot entry
    pub fn free_space(&self) -> usize {
        let free_ptr = read_u16(self.buf, FREE_PTR) as usize;
        free_ptr.saturating_sub(DPFIXED + self.slot_count() * SLOT_SIZE)
    }

    /// Number of live records
    pub fn record_count(&self) -> usize {
        (0..self.slot_count()).filter(|&s| self.is_live(s)).count()
    }

    pub fn record(&self, slot_id: SlotId) -> RecordResult<&'a [u8]> {
        let (offset, length) = self.slot(slot_id).ok_or(RecordError::RecordNotFound {
            page_id: self.page_no(),
            slot_id,
        })?;
        if offset == DELETED {
            return Err(RecordError::RecordNotFound {
                page_id: self.page_no(),
                slot_id,
            });
        }

        let start = offset as usize;
        let end = start + length as usize;
        if end > PAGE_SIZE {
            return Err(RecordError::Corrupted(format!(
                "slot {} of page {} points past the page end",
                slot_id,
                self.page_no()
            )));
        }
        Ok(&self.buf[start..end])
    }

    pub fn first_record(&self) -> Option<SlotId> {
        (0..self.slot_count()).find(|&s| self.is_live(s))
    }

    /// First live slot after `slot_id`
    pub fn next_record(&self, slot_id: SlotId) -> Option<SlotId> {
        (slot_id + 1..self.slot_count()).find(|&s| self.is_live(s))
    }

    fn is_live(&self, slot_id: SlotId) -> bool {
        matches!(self.slot(slot_id), Some((offset, _)) if offset != DELETED)
    }

    fn slot(&self, slot_id: SlotId) -> Option<(u16, u16)> {
        if slot_id >= self.slot_count() {
            return None;
        }
        let at = DPFIXED + slot_id * SLOT_SIZE;
        Some((read_u16(self.buf, at), read_u16(self.buf, at + 2)))
    }
}

/// Mutable view of a data page living in a buffer frame
pub struct DataPageMut<'a> {
    buf: &'a mut [u8],
}

impl<'a> DataPageMut<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        Self { buf }
    }

    /// Format `buf` as an empty data page
    pub fn init(buf: &'a mut [u8], page_no: PageId) -> Self {
        buf.fill(0);
        write_i32(buf, NEXT_PAGE, encode_page_link(None));
        write_i32(buf, PAGE_NO, page_no as i32);
        write_u16(buf, SLOT_CNT, 0);
        write_u16(buf, FREE_PTR, PAGE_SIZE as u16);
        Self { buf }
    }

    pub fn as_page(&self) -> DataPage<'_> {
        DataPage::new(self.buf)
    }

    pub fn set_next_page(&mut self, next: Option<PageId>) {
        write_i32(self.buf, NEXT_PAGE, encode_page_link(next));
    }

    /// Append a record. Fails with `NoSpace` when the page cannot hold it.
    pub fn insert_record(&mut self, data: &[u8]) -> RecordResult<SlotId> {
        let page = self.as_page();
        if data.len() + SLOT_SIZE > page.free_space() {
            return Err(RecordError::NoSpace(page.page_no()));
        }

        let slot_id = page.slot_count();
        let offset = read_u16(self.buf, FREE_PTR) as usize - data.len();
        self.buf[offset..offset + data.len()].copy_from_slice(data);

        let at = DPFIXED + slot_id * SLOT_SIZE;
        write_u16(self.buf, at, offset as u16);
        write_u16(self.buf, at + 2, data.len() as u16);
        write_u16(self.buf, SLOT_CNT, (slot_id + 1) as u16);
        write_u16(self.buf, FREE_PTR, offset as u16);

        Ok(slot_id)
    }

    pub fn delete_record(&mut self, slot_id: SlotId) -> RecordResult<()> {
        // Validates the slot
        self.as_page().record(slot_id)?;
        write_u16(self.buf, DPFIXED + slot_id * SLOT_SIZE, DELETED);
        Ok(())
    }

    /// Record bytes for in-place updates
    pub fn into_record_mut(self, slot_id: SlotId) -> RecordResult<&'a mut [u8]> {
        let len = self.as_page().record(slot_id)?.len();
        let offset = read_u16(self.buf, DPFIXED + slot_id * SLOT_SIZE) as usize;
        let buf = self.buf;
        Ok(&mut buf[offset..offset + len])
    }
}

/// Read-only view of a heap file header page
#[derive(Clone, Copy)]
pub struct HeaderPage<'a> {
    buf: &'a [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        Self { buf }
    }

    pub fn first_page(&self) -> Option<PageId> {
        decode_page_link(read_i32(self.buf, FIRST_PAGE))
    }

    pub fn last_page(&self) -> Option<PageId> {
        decode_page_link(read_i32(self.buf, LAST_PAGE))
    }

    pub fn page_cnt(&self) -> u32 {
        read_i32(self.buf, PAGE_CNT).max(0) as u32
    }

    pub fn rec_cnt(&self) -> u32 {
        read_i32(self.buf, REC_CNT).max(0) as u32
    }

    pub fn file_name(&self) -> String {
        let len = (self.buf[NAME_LEN] as usize).min(MAX_NAME_LEN);
        String::from_utf8_lossy(&self.buf[NAME..NAME + len]).into_owned()
    }
}

/// Mutable view of a heap file header page
pub struct HeaderPageMut<'a> {
    buf: &'a mut [u8],
}

impl<'a> HeaderPageMut<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        Self { buf }
    }

    /// Format `buf` as the header of an empty heap file
    pub fn init(buf: &'a mut [u8], file_name: &str) -> Self {
        buf.fill(0);
        let mut header = Self { buf };
        header.set_first_page(None);
        header.set_last_page(None);
        header.set_page_cnt(0);
        header.set_rec_cnt(0);

        let mut len = file_name.len().min(MAX_NAME_LEN);
        while !file_name.is_char_boundary(len) {
            len -= 1;
        }
        header.buf[NAME_LEN] = len as u8;
        header.buf[NAME..NAME + len].copy_from_slice(&file_name.as_bytes()[..len]);
        header
    }

    pub fn as_page(&self) -> HeaderPage<'_> {
        HeaderPage::new(self.buf)
    }

    pub fn set_first_page(&mut self, page: Option<PageId>) {
        write_i32(self.buf, FIRST_PAGE, encode_page_link(page));
    }

    pub fn set_last_page(&mut self, page: Option<PageId>) {
        write_i32(self.buf, LAST_PAGE, encode_page_link(page));
    }

    pub fn set_page_cnt(&mut self, count: u32) {
        write_i32(self.buf, PAGE_CNT, count as i32);
    }

    pub fn set_rec_cnt(&mut self, count: u32) {
        write_i32(self.buf, REC_CNT, count as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_creation() {
        let mut buffer = vec![0xAAu8; PAGE_SIZE];
        let page = DataPageMut::init(&mut buffer, 7);
        let view = page.as_page();
        assert_eq!(view.page_no(), 7);
        assert_eq!(view.next_page(), None);
        assert_eq!(view.slot_count(), 0);
        assert_eq!(view.free_space(), PAGE_SIZE - DPFIXED);
        assert_eq!(view.first_record(), None);
    }

    #[test]
    fn test_record_operations() {
        let mut buffer = vec![0u8; PAGE_SIZE];
        let mut page = DataPageMut::init(&mut buffer, 1);

        let a = page.insert_record(b"alpha").unwrap();
        let b = page.insert_record(b"").unwrap();
        let c = page.insert_record(b"gamma ray").unwrap();
        assert_eq!((a, b, c), (0, 1, 2));

        let view = page.as_page();
        assert_eq!(view.record(a).unwrap(), b"alpha");
        assert_eq!(view.record(b).unwrap(), b"");
        assert_eq!(view.record(c).unwrap(), b"gamma ray");
        assert_eq!(view.free_space(), PAGE_SIZE - DPFIXED - 3 * SLOT_SIZE - 14);
        assert!(matches!(
            view.record(3),
            Err(RecordError::RecordNotFound { page_id: 1, slot_id: 3 })
        ));
    }

    #[test]
    fn test_delete_skips_slot() {
        let mut buffer = vec![0u8; PAGE_SIZE];
        let mut page = DataPageMut::init(&mut buffer, 1);
        for data in [b"r0", b"r1", b"r2", b"r3"] {
            page.insert_record(data).unwrap();
        }
        let free_before = page.as_page().free_space();

        page.delete_record(0).unwrap();
        page.delete_record(2).unwrap();
        assert!(page.delete_record(2).is_err());

        let view = page.as_page();
        assert_eq!(view.first_record(), Some(1));
        assert_eq!(view.next_record(1), Some(3));
        // Iteration can continue from a deleted slot
        assert_eq!(view.next_record(2), Some(3));
        assert_eq!(view.next_record(3), None);
        assert_eq!(view.record_count(), 2);
        // Space is not reclaimed
        assert_eq!(view.free_space(), free_before);
        assert!(view.record(0).is_err());
    }

    #[test]
    fn test_page_full() {
        let mut buffer = vec![0u8; PAGE_SIZE];
        let mut page = DataPageMut::init(&mut buffer, 3);
        let record = vec![1u8; 100];

        let mut inserted = 0;
        loop {
            match page.insert_record(&record) {
                Ok(_) => inserted += 1,
                Err(RecordError::NoSpace(3)) => break,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(inserted, (PAGE_SIZE - DPFIXED) / (100 + SLOT_SIZE));
        assert!(page.as_page().free_space() < 100 + SLOT_SIZE);
    }

    #[test]
    fn test_max_record_fits_empty_page() {
        let mut buffer = vec![0u8; PAGE_SIZE];
        let mut page = DataPageMut::init(&mut buffer, 1);
        let record = vec![9u8; MAX_RECORD_LEN];
        let slot = page.insert_record(&record).unwrap();
        assert_eq!(page.as_page().record(slot).unwrap().len(), MAX_RECORD_LEN);
        assert_eq!(page.as_page().free_space(), 0);
        assert!(page.insert_record(b"").is_err());
    }

    #[test]
    fn test_record_mut_and_links() {
        let mut buffer = vec![0u8; PAGE_SIZE];
        {
            let mut page = DataPageMut::init(&mut buffer, 4);
            page.insert_record(b"one").unwrap();
            page.insert_record(b"two").unwrap();
            page.set_next_page(Some(9));
            page.into_record_mut(1).unwrap().copy_from_slice(b"TWO");
        }

        // Reattach to the same bytes
        let view = DataPage::new(&buffer);
        assert_eq!(view.record(0).unwrap(), b"one");
        assert_eq!(view.record(1).unwrap(), b"TWO");
        assert_eq!(view.next_page(), Some(9));
    }

    #[test]
    fn test_header_page() {
        let mut buffer = vec![0u8; PAGE_SIZE];
        {
            let mut header = HeaderPageMut::init(&mut buffer, "students");
            assert_eq!(header.as_page().first_page(), None);
            header.set_first_page(Some(2));
            header.set_last_page(Some(5));
            header.set_page_cnt(3);
            header.set_rec_cnt(120);
        }

        let header = HeaderPage::new(&buffer);
        assert_eq!(header.file_name(), "students");
        assert_eq!(header.first_page(), Some(2));
        assert_eq!(header.last_page(), Some(5));
        assert_eq!(header.page_cnt(), 3);
        assert_eq!(header.rec_cnt(), 120);
    }

    #[test]
    fn test_header_name_truncated() {
        let mut buffer = vec![0u8; PAGE_SIZE];
        let long_name = "é".repeat(MAX_NAME_LEN);
        let header = HeaderPageMut::init(&mut buffer, &long_name);
        let name = header.as_page().file_name();
        assert!(name.len() <= MAX_NAME_LEN);
        assert!(long_name.starts_with(&name));
    }
}
