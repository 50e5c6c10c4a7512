use prettytable::{Cell, Row, Table};

use super::{Database, QueryResult};
use crate::catalog::AttrDesc;
use crate::record::Value;

/// Render rows as a table titled with the attribute names
pub fn format_relation(attrs: &[AttrDesc], rows: &[Vec<Value>]) -> Table {
    let mut table = Table::new();
    table.set_titles(Row::new(
        attrs.iter().map(|a| Cell::new(&a.attr_name)).collect(),
    ));
    for row in rows {
        table.add_row(Row::new(
            row.iter().map(|v| Cell::new(&v.to_string())).collect(),
        ));
    }
    table
}

impl Database {
    pub fn print_relation(&mut self, relation: &str) -> QueryResult<Table> {
        let rows = self.scan_relation(relation)?;
        let attrs = self.catalog.get_attribute_info(relation)?;
        Ok(format_relation(attrs, &rows))
    }
}
