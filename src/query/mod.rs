mod delete;
mod error;
mod insert;
mod load;
mod print;
mod select;
#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::catalog::{AttrDesc, AttrSpec, Catalog};
use crate::file::{BUFFER_POOL_SIZE, BufferManager, PagedFileManager};
use crate::record::{
    AttrType, HeapFileScan, Operator, RecordError, Value, create_heap_file, destroy_heap_file,
};

pub use error::{QueryError, QueryResult};
pub use insert::AttrValue;
pub use print::format_relation;
pub use select::AttrRef;

/// Extension of relation heap files inside the data directory
const RELATION_EXT: &str = "rel";

/// Runtime settings of a [`Database`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Frames in the buffer pool
    pub buffer_pages: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            buffer_pages: BUFFER_POOL_SIZE,
        }
    }
}

/// `attr op value` filter; the value is a text literal converted to the
/// attribute's type before scanning
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub attribute: String,
    pub op: Operator,
    pub value: String,
}

impl Predicate {
    pub fn new(attribute: &str, op: Operator, value: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            op,
            value: value.to_string(),
        }
    }
}

/// Scan parameters resolved from a [`Predicate`]
struct ResolvedFilter {
    attr: AttrDesc,
    value: Vec<u8>,
    op: Operator,
}

/// A data directory: relation heap files, their catalog and the buffer
/// pool serving them. Every operator goes through this context.
pub struct Database {
    data_dir: PathBuf,
    buffer_mgr: BufferManager,
    catalog: Catalog,
}

impl Database {
    pub fn open<P: AsRef<Path>>(data_dir: P, config: DatabaseConfig) -> QueryResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let catalog = Catalog::open(&data_dir)?;
        let buffer_mgr = BufferManager::with_capacity(PagedFileManager::new(), config.buffer_pages);
        info!(
            "Opened database at {} with {} buffer pages",
            data_dir.display(),
            config.buffer_pages
        );

        Ok(Self {
            data_dir,
            buffer_mgr,
            catalog,
        })
    }

    pub fn buffer_manager(&self) -> &BufferManager {
        &self.buffer_mgr
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn relation_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", name, RELATION_EXT))
    }

    pub fn create_relation(&mut self, name: &str, attrs: &[AttrSpec]) -> QueryResult<()> {
        self.catalog.create_relation(name, attrs)?;

        let path = self.relation_path(name);
        if let Err(err) = create_heap_file(&mut self.buffer_mgr, &path) {
            if let Err(cat_err) = self.catalog.remove_relation(name) {
                warn!("Error removing catalog entry of {}: {}", name, cat_err);
            }
            return Err(err.into());
        }

        info!("Created relation {}", name);
        Ok(())
    }

    pub fn destroy_relation(&mut self, name: &str) -> QueryResult<()> {
        self.catalog.get_relation_info(name)?;
        let path = self.relation_path(name);
        destroy_heap_file(&mut self.buffer_mgr, path)?;
        self.catalog.remove_relation(name)?;
        info!("Destroyed relation {}", name);
        Ok(())
    }

    /// Every record of a relation, decoded attribute by attribute
    pub fn scan_relation(&mut self, relation: &str) -> QueryResult<Vec<Vec<Value>>> {
        let attrs = self.catalog.get_attribute_info(relation)?.to_vec();
        let path = self.relation_path(relation);
        let bm = &mut self.buffer_mgr;

        let mut scan = HeapFileScan::open(bm, path)?;
        let rows = collect_rows(bm, &mut scan, &attrs);
        let closed = scan.close(bm);

        let rows = rows?;
        closed?;
        Ok(rows)
    }

    /// Write every dirty page back to disk
    pub fn flush(&mut self) -> QueryResult<()> {
        self.buffer_mgr.flush_all()?;
        Ok(())
    }

    fn resolve_filter(&self, relation: &str, predicate: &Predicate) -> QueryResult<ResolvedFilter> {
        let attr = self.catalog.get_attr(relation, &predicate.attribute)?.clone();
        let value = encode_literal(&attr, &predicate.value)?;
        Ok(ResolvedFilter {
            attr,
            value,
            op: predicate.op,
        })
    }
}

fn collect_rows(
    bm: &mut BufferManager,
    scan: &mut HeapFileScan,
    attrs: &[AttrDesc],
) -> QueryResult<Vec<Vec<Value>>> {
    start_filtered(scan, None)?;
    let mut rows = Vec::new();
    while scan.scan_next(bm)?.is_some() {
        rows.push(decode_record(attrs, scan.get_record(bm)?)?);
    }
    Ok(rows)
}

/// Start `scan` with an optional resolved filter
fn start_filtered(scan: &mut HeapFileScan, filter: Option<&ResolvedFilter>) -> QueryResult<()> {
    match filter {
        Some(f) => scan.start_scan(
            f.attr.attr_offset,
            f.attr.attr_len,
            f.attr.attr_type,
            Some(f.value.as_slice()),
            f.op,
        )?,
        None => scan.start_scan(0, 0, AttrType::String, None, Operator::Eq)?,
    }
    Ok(())
}

fn encode_literal(attr: &AttrDesc, text: &str) -> QueryResult<Vec<u8>> {
    attr.attr_type
        .encode_literal(text, attr.attr_len)
        .map_err(|source| QueryError::InvalidLiteral {
            attr: attr.attr_name.clone(),
            source,
        })
}

/// Build a record from one text literal per attribute, in attribute order
fn encode_record(attrs: &[AttrDesc], fields: &[&str]) -> QueryResult<Vec<u8>> {
    if fields.len() != attrs.len() {
        return Err(QueryError::AttrCountMismatch {
            expected: attrs.len(),
            actual: fields.len(),
        });
    }

    let record_len = attrs.last().map_or(0, |a| a.attr_offset + a.attr_len);
    let mut record = vec![0u8; record_len];
    for (attr, field) in attrs.iter().zip(fields) {
        let bytes = encode_literal(attr, field)?;
        record[attr.attr_offset..attr.attr_offset + attr.attr_len].copy_from_slice(&bytes);
    }
    Ok(record)
}

fn decode_record(attrs: &[AttrDesc], record: &[u8]) -> QueryResult<Vec<Value>> {
    attrs
        .iter()
        .map(|attr| -> QueryResult<Value> {
            let bytes = record
                .get(attr.attr_offset..attr.attr_offset + attr.attr_len)
                .ok_or_else(|| {
                    RecordError::Corrupted(format!(
                        "record of {} bytes has no attribute {}",
                        record.len(),
                        attr.attr_name
                    ))
                })?;
            Ok(Value::decode(bytes, attr.attr_type)?)
        })
        .collect()
}
