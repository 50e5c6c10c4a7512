use log::debug;

use super::{Database, QueryError, QueryResult, encode_record};
use crate::record::{InsertFileScan, RecordId};

/// Named attribute value of an insert, given as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrValue {
    pub name: String,
    pub value: String,
}

impl AttrValue {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

impl Database {
    /// Insert one record. Every attribute of the relation must be given
    /// exactly once, in any order.
    pub fn insert(&mut self, relation: &str, values: &[AttrValue]) -> QueryResult<RecordId> {
        let attrs = self.catalog.get_attribute_info(relation)?.to_vec();
        if values.len() != attrs.len() {
            return Err(QueryError::AttrCountMismatch {
                expected: attrs.len(),
                actual: values.len(),
            });
        }

        let mut fields = Vec::with_capacity(attrs.len());
        for attr in &attrs {
            let value = values
                .iter()
                .find(|v| v.name == attr.attr_name)
                .ok_or_else(|| QueryError::MissingAttribute(attr.attr_name.clone()))?;
            fields.push(value.value.as_str());
        }
        let record = encode_record(&attrs, &fields)?;

        let path = self.relation_path(relation);
        let bm = &mut self.buffer_mgr;
        let mut scan = InsertFileScan::open(bm, path)?;
        let inserted = scan.insert_record(bm, &record);
        let closed = scan.close(bm);

        let rid = inserted?;
        closed?;
        debug!("Inserted {} into {}", rid, relation);
        Ok(rid)
    }
}
