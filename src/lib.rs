pub mod catalog;
pub mod file;
pub mod query;
pub mod record;

pub use catalog::{AttrDesc, AttrSpec, Catalog, CatalogError, CatalogResult, RelDesc};
pub use file::{BUFFER_POOL_SIZE, BufferManager, FileError, FileHandle, PAGE_SIZE, PagedFileManager};
pub use query::{AttrRef, AttrValue, Database, DatabaseConfig, Predicate, QueryError, QueryResult};
pub use record::{
    AttrType, HeapFile, HeapFileScan, InsertFileScan, Operator, RecordError, RecordId,
    RecordResult, Value,
};
