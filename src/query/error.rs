use thiserror::Error;

use crate::catalog::CatalogError;
use crate::file::FileError;
use crate::record::RecordError;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("File error: {0}")]
    FileError(#[from] FileError),

    #[error("Record error: {0}")]
    RecordError(#[from] RecordError),

    #[error("Catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    #[error("Cannot read/write file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Expected {expected} attribute values, got {actual}")]
    AttrCountMismatch { expected: usize, actual: usize },

    #[error("No value given for attribute {0}")]
    MissingAttribute(String),

    #[error("Invalid literal for attribute {attr}: {source}")]
    InvalidLiteral {
        attr: String,
        #[source]
        source: RecordError,
    },

    #[error("Relation {relation} has record length {actual}, projection needs {expected}")]
    RecordLengthMismatch {
        relation: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

pub type QueryResult<T> = Result<T, QueryError>;
