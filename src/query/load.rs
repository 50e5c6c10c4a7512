use std::fs::File;
use std::path::Path;

use csv::{Reader, ReaderBuilder};
use log::info;

use super::{Database, QueryResult, encode_record};
use crate::catalog::AttrDesc;
use crate::file::BufferManager;
use crate::record::InsertFileScan;

impl Database {
    /// Append the rows of a headerless CSV file, one field per attribute in
    /// catalog order. Returns the number of rows loaded; on error the rows
    /// before the failing one stay inserted.
    pub fn load<P: AsRef<Path>>(&mut self, relation: &str, csv_path: P) -> QueryResult<usize> {
        let attrs = self.catalog.get_attribute_info(relation)?.to_vec();
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(csv_path.as_ref())?;

        let path = self.relation_path(relation);
        let bm = &mut self.buffer_mgr;
        let mut scan = InsertFileScan::open(bm, path)?;
        let loaded = load_rows(bm, &mut scan, &mut reader, &attrs);
        let closed = scan.close(bm);

        let loaded = loaded?;
        closed?;
        info!(
            "Loaded {} rows from {} into {}",
            loaded,
            csv_path.as_ref().display(),
            relation
        );
        Ok(loaded)
    }
}

fn load_rows(
    bm: &mut BufferManager,
    scan: &mut InsertFileScan,
    reader: &mut Reader<File>,
    attrs: &[AttrDesc],
) -> QueryResult<usize> {
    let mut loaded = 0;
    for row in reader.records() {
        let row = row?;
        let fields: Vec<&str> = row.iter().collect();
        let record = encode_record(attrs, &fields)?;
        scan.insert_record(bm, &record)?;
        loaded += 1;
    }
    Ok(loaded)
}
