mod error;
mod heap_file;
mod page;
mod record;
mod scan;
mod value;

pub use error::{RecordError, RecordResult};
pub use heap_file::{HeapFile, create_heap_file, destroy_heap_file};
pub use page::{
    DPFIXED, DataPage, DataPageMut, HeaderPage, HeaderPageMut, MAX_NAME_LEN, MAX_RECORD_LEN,
    SLOT_SIZE,
};
pub use record::{RecordId, SlotId};
pub use scan::{HeapFileScan, InsertFileScan, Operator, ScanFilter, ScanState};
pub use value::{AttrType, Value};
