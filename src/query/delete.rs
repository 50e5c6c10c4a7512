use log::debug;

use super::{Database, Predicate, QueryResult, ResolvedFilter, start_filtered};
use crate::file::BufferManager;
use crate::record::HeapFileScan;

impl Database {
    /// Delete the records of `relation` matching `predicate`, or all of them.
    /// Returns the number deleted.
    pub fn delete(&mut self, relation: &str, predicate: Option<&Predicate>) -> QueryResult<usize> {
        self.catalog.get_relation_info(relation)?;
        let filter = predicate
            .map(|p| self.resolve_filter(relation, p))
            .transpose()?;

        let path = self.relation_path(relation);
        let bm = &mut self.buffer_mgr;
        let mut scan = HeapFileScan::open(bm, path)?;
        let deleted = delete_matching(bm, &mut scan, filter.as_ref());
        let closed = scan.close(bm);

        let deleted = deleted?;
        closed?;
        debug!("Deleted {} records from {}", deleted, relation);
        Ok(deleted)
    }
}

fn delete_matching(
    bm: &mut BufferManager,
    scan: &mut HeapFileScan,
    filter: Option<&ResolvedFilter>,
) -> QueryResult<usize> {
    start_filtered(scan, filter)?;
    let mut deleted = 0;
    while scan.scan_next(bm)?.is_some() {
        scan.delete_record(bm)?;
        deleted += 1;
    }
    Ok(deleted)
}
