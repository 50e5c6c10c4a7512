use log::{debug, warn};

use super::{Database, Predicate, QueryError, QueryResult, ResolvedFilter, start_filtered};
use crate::catalog::{AttrDesc, AttrSpec};
use crate::file::BufferManager;
use crate::record::{HeapFileScan, InsertFileScan};

/// `relation.attribute` reference in a projection list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrRef {
    pub relation: String,
    pub attribute: String,
}

impl AttrRef {
    pub fn new(relation: &str, attribute: &str) -> Self {
        Self {
            relation: relation.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

impl Database {
    /// Copy the projection of every record of the projected relation that
    /// satisfies `predicate` into `result`. The result relation is created
    /// from the projection when missing. Returns the number of records copied.
    pub fn select(
        &mut self,
        result: &str,
        projections: &[AttrRef],
        predicate: Option<&Predicate>,
    ) -> QueryResult<usize> {
        let source = match projections.first() {
            Some(first) => first.relation.clone(),
            None => return Err(QueryError::InvalidQuery("empty projection list".to_string())),
        };
        if result == source {
            return Err(QueryError::InvalidQuery(format!(
                "cannot select from {} into itself",
                source
            )));
        }

        let mut attrs: Vec<AttrDesc> = Vec::with_capacity(projections.len());
        for proj in projections {
            if proj.relation != source {
                return Err(QueryError::InvalidQuery(format!(
                    "projection mixes relations {} and {}",
                    source, proj.relation
                )));
            }
            attrs.push(self.catalog.get_attr(&proj.relation, &proj.attribute)?.clone());
        }
        let record_len: usize = attrs.iter().map(|a| a.attr_len).sum();

        let filter = predicate
            .map(|p| self.resolve_filter(&source, p))
            .transpose()?;

        if self.catalog.contains(result) {
            let existing = self.catalog.get_relation_info(result)?;
            if existing.record_len != record_len {
                return Err(QueryError::RecordLengthMismatch {
                    relation: result.to_string(),
                    expected: record_len,
                    actual: existing.record_len,
                });
            }
        } else {
            let specs: Vec<AttrSpec> = attrs
                .iter()
                .map(|a| AttrSpec {
                    name: a.attr_name.clone(),
                    attr_type: a.attr_type,
                    length: a.attr_len,
                })
                .collect();
            self.create_relation(result, &specs)?;
        }

        let source_path = self.relation_path(&source);
        let result_path = self.relation_path(result);
        let bm = &mut self.buffer_mgr;

        let mut output = InsertFileScan::open(bm, result_path)?;
        let mut scan = match HeapFileScan::open(bm, source_path) {
            Ok(scan) => scan,
            Err(err) => {
                if let Err(close_err) = output.close(bm) {
                    warn!("Error closing {}: {}", result, close_err);
                }
                return Err(err.into());
            }
        };

        let copied = scan_select(bm, &mut scan, &mut output, &attrs, filter.as_ref(), record_len);
        let scan_closed = scan.close(bm);
        let output_closed = output.close(bm);

        let copied = copied?;
        scan_closed?;
        output_closed?;
        debug!("Selected {} records from {} into {}", copied, source, result);
        Ok(copied)
    }
}

fn scan_select(
    bm: &mut BufferManager,
    scan: &mut HeapFileScan,
    output: &mut InsertFileScan,
    attrs: &[AttrDesc],
    filter: Option<&ResolvedFilter>,
    record_len: usize,
) -> QueryResult<usize> {
    start_filtered(scan, filter)?;

    let mut out = vec![0u8; record_len];
    let mut copied = 0;
    while scan.scan_next(bm)?.is_some() {
        {
            let record = scan.get_record(bm)?;
            let mut at = 0;
            for attr in attrs {
                let field = record
                    .get(attr.attr_offset..attr.attr_offset + attr.attr_len)
                    .ok_or_else(|| {
                        QueryError::InvalidQuery(format!(
                            "record of {} bytes has no attribute {}",
                            record.len(),
                            attr.attr_name
                        ))
                    })?;
                out[at..at + attr.attr_len].copy_from_slice(field);
                at += attr.attr_len;
            }
        }
        output.insert_record(bm, &out)?;
        copied += 1;
    }
    Ok(copied)
}
