use std::path::PathBuf;

use clap::{Parser, Subcommand};
use regex::Regex;
use thiserror::Error;

use minirel::{
    AttrRef, AttrSpec, AttrType, AttrValue, BUFFER_POOL_SIZE, Operator, Predicate, QueryError,
    RecordError,
};

/// `[rel.]attr op value`, value optionally quoted
const PREDICATE_PATTERN: &str = r#"^\s*(?:(\w+)\.)?(\w+)\s*(<=|>=|!=|<>|==|=|<|>)\s*(.*?)\s*$"#;

#[derive(Debug, Parser)]
#[command(name = "minirel", about = "Heap file storage engine with scan-based queries")]
pub struct CommandLine {
    /// Directory holding relations and the catalog
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Frames in the buffer pool
    #[arg(long, default_value_t = BUFFER_POOL_SIZE)]
    pub buffer_pages: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a relation from `name:type[:len]` attribute definitions
    Create {
        relation: String,
        #[arg(required = true)]
        attrs: Vec<String>,
    },
    Destroy {
        relation: String,
    },
    /// Insert one record from `attr=value` pairs
    Insert {
        relation: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Project `rel.attr` columns of matching records into a result relation
    Select {
        result: String,
        #[arg(required = true)]
        projections: Vec<String>,
        #[arg(long = "where")]
        predicate: Option<String>,
    },
    Delete {
        relation: String,
        #[arg(long = "where")]
        predicate: Option<String>,
    },
    /// Bulk insert rows from a headerless CSV file
    Load {
        relation: String,
        csv: PathBuf,
    },
    Print {
        relation: String,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid argument: {0}")]
    Usage(String),
}

pub fn parse_attr_spec(text: &str) -> Result<AttrSpec, CliError> {
    let parts: Vec<&str> = text.split(':').collect();
    let (name, attr_type, length) = match parts.as_slice() {
        [name, attr_type] => (*name, attr_type.parse::<AttrType>()?, None),
        [name, attr_type, length] => {
            let length = length
                .parse::<usize>()
                .map_err(|_| CliError::Usage(format!("bad length in '{}'", text)))?;
            (*name, attr_type.parse::<AttrType>()?, Some(length))
        }
        _ => {
            return Err(CliError::Usage(format!(
                "expected name:type[:len], got '{}'",
                text
            )));
        }
    };
    Ok(AttrSpec::new(name, attr_type, length))
}

pub fn parse_attr_value(text: &str) -> Result<AttrValue, CliError> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| CliError::Usage(format!("expected attr=value, got '{}'", text)))?;
    Ok(AttrValue::new(name.trim(), unquote(value)))
}

pub fn parse_attr_ref(text: &str) -> Result<AttrRef, CliError> {
    match text.split_once('.') {
        Some((relation, attribute)) if !relation.is_empty() && !attribute.is_empty() => {
            Ok(AttrRef::new(relation, attribute))
        }
        _ => Err(CliError::Usage(format!("expected rel.attr, got '{}'", text))),
    }
}

/// Parse `attr op value` against `relation`; a `rel.` prefix must name it
pub fn parse_predicate(text: &str, relation: &str) -> Result<Predicate, CliError> {
    let re = Regex::new(PREDICATE_PATTERN)?;
    let caps = re
        .captures(text)
        .ok_or_else(|| CliError::Usage(format!("cannot parse predicate '{}'", text)))?;

    if let Some(rel) = caps.get(1) {
        if rel.as_str() != relation {
            return Err(CliError::Usage(format!(
                "predicate refers to {} but the query reads {}",
                rel.as_str(),
                relation
            )));
        }
    }
    let op = caps[3].parse::<Operator>()?;
    Ok(Predicate::new(&caps[2], op, unquote(&caps[4])))
}

fn unquote(text: &str) -> &str {
    let text = text.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}
