use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use log::debug;

use crate::record::{AttrType, MAX_NAME_LEN, MAX_RECORD_LEN};

const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Relation {0} not found")]
    RelationNotFound(String),

    #[error("Relation {0} already exists")]
    RelationExists(String),

    #[error("Attribute {attr} not found in relation {rel}")]
    AttributeNotFound { rel: String, attr: String },

    #[error("Duplicate attribute {0}")]
    DuplicateAttribute(String),

    #[error("Invalid attribute {name}: {reason}")]
    InvalidAttribute { name: String, reason: String },

    #[error("Name too long: {0}")]
    NameTooLong(String),

    #[error("Invalid name {0}: only letters, digits and '_' are allowed")]
    InvalidName(String),

    #[error("Record length {length} exceeds maximum {max}")]
    RecordTooLong { length: usize, max: usize },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Relation names double as file names, so they are kept to `[A-Za-z0-9_]`
fn check_name(name: &str) -> CatalogResult<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(CatalogError::NameTooLong(name.to_string()));
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(CatalogError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Attribute definition as supplied when creating a relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSpec {
    pub name: String,
    pub attr_type: AttrType,
    pub length: usize,
}

impl AttrSpec {
    /// Numeric types get their fixed width; strings need an explicit length
    pub fn new(name: &str, attr_type: AttrType, length: Option<usize>) -> Self {
        let length = attr_type.fixed_size().or(length).unwrap_or(0);
        Self {
            name: name.to_string(),
            attr_type,
            length,
        }
    }
}

/// Catalog entry of one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrDesc {
    pub rel_name: String,
    pub attr_name: String,
    pub attr_offset: usize,
    pub attr_type: AttrType,
    pub attr_len: usize,
}

/// Catalog entry of one relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelDesc {
    pub rel_name: String,
    pub attr_cnt: usize,
    pub record_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RelationMetadata {
    name: String,
    attributes: Vec<AttrDesc>,
}

impl RelationMetadata {
    fn record_len(&self) -> usize {
        self.attributes
            .last()
            .map_or(0, |a| a.attr_offset + a.attr_len)
    }
}

/// Relation and attribute catalog of a data directory, kept in
/// `catalog.json` and rewritten on every change.
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    relations: BTreeMap<String, RelationMetadata>,
}

impl Catalog {
    pub fn open(db_path: &Path) -> CatalogResult<Self> {
        let path = db_path.join(CATALOG_FILE);
        let relations = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, relations })
    }

    fn save(&self) -> CatalogResult<()> {
        let content = serde_json::to_string_pretty(&self.relations)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Register a relation, laying out its attributes back to back
    pub fn create_relation(&mut self, name: &str, attrs: &[AttrSpec]) -> CatalogResult<RelDesc> {
        check_name(name)?;
        if self.relations.contains_key(name) {
            return Err(CatalogError::RelationExists(name.to_string()));
        }
        if attrs.is_empty() {
            return Err(CatalogError::InvalidAttribute {
                name: name.to_string(),
                reason: "relation needs at least one attribute".to_string(),
            });
        }

        let mut attributes: Vec<AttrDesc> = Vec::with_capacity(attrs.len());
        let mut offset = 0;
        for spec in attrs {
            check_name(&spec.name)?;
            if attributes.iter().any(|a| a.attr_name == spec.name) {
                return Err(CatalogError::DuplicateAttribute(spec.name.clone()));
            }
            match spec.attr_type.fixed_size() {
                Some(size) if size != spec.length => {
                    return Err(CatalogError::InvalidAttribute {
                        name: spec.name.clone(),
                        reason: format!("{} attributes are {} bytes", spec.attr_type, size),
                    });
                }
                None if spec.length == 0 => {
                    return Err(CatalogError::InvalidAttribute {
                        name: spec.name.clone(),
                        reason: "string attributes need a length".to_string(),
                    });
                }
                _ => {}
            }

            attributes.push(AttrDesc {
                rel_name: name.to_string(),
                attr_name: spec.name.clone(),
                attr_offset: offset,
                attr_type: spec.attr_type,
                attr_len: spec.length,
            });
            offset += spec.length;
        }

        if offset > MAX_RECORD_LEN {
            return Err(CatalogError::RecordTooLong {
                length: offset,
                max: MAX_RECORD_LEN,
            });
        }

        let metadata = RelationMetadata {
            name: name.to_string(),
            attributes,
        };
        let desc = Self::describe(&metadata);
        self.relations.insert(name.to_string(), metadata);
        self.save()?;
        debug!("Catalog: added relation {} ({} bytes)", name, desc.record_len);
        Ok(desc)
    }

    pub fn remove_relation(&mut self, name: &str) -> CatalogResult<()> {
        self.relations
            .remove(name)
            .ok_or_else(|| CatalogError::RelationNotFound(name.to_string()))?;
        self.save()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn get_relation_info(&self, name: &str) -> CatalogResult<RelDesc> {
        self.relation(name).map(Self::describe)
    }

    /// Attributes of a relation in offset order
    pub fn get_attribute_info(&self, rel: &str) -> CatalogResult<&[AttrDesc]> {
        Ok(&self.relation(rel)?.attributes)
    }

    pub fn get_attr(&self, rel: &str, attr: &str) -> CatalogResult<&AttrDesc> {
        self.relation(rel)?
            .attributes
            .iter()
            .find(|a| a.attr_name == attr)
            .ok_or_else(|| CatalogError::AttributeNotFound {
                rel: rel.to_string(),
                attr: attr.to_string(),
            })
    }

    pub fn relation_names(&self) -> Vec<String> {
        self.relations.keys().cloned().collect()
    }

    fn relation(&self, name: &str) -> CatalogResult<&RelationMetadata> {
        self.relations
            .get(name)
            .ok_or_else(|| CatalogError::RelationNotFound(name.to_string()))
    }

    fn describe(metadata: &RelationMetadata) -> RelDesc {
        RelDesc {
            rel_name: metadata.name.clone(),
            attr_cnt: metadata.attributes.len(),
            record_len: metadata.record_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student_attrs() -> Vec<AttrSpec> {
        vec![
            AttrSpec::new("id", AttrType::Integer, None),
            AttrSpec::new("name", AttrType::String, Some(20)),
            AttrSpec::new("gpa", AttrType::Float, None),
        ]
    }

    #[test]
    fn test_create_lays_out_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(dir.path()).unwrap();
        let desc = catalog.create_relation("students", &student_attrs()).unwrap();
        assert_eq!(desc.attr_cnt, 3);
        assert_eq!(desc.record_len, 28);

        let attrs = catalog.get_attribute_info("students").unwrap();
        let offsets: Vec<_> = attrs.iter().map(|a| a.attr_offset).collect();
        assert_eq!(offsets, vec![0, 4, 24]);
        assert_eq!(catalog.get_attr("students", "gpa").unwrap().attr_len, 4);
        assert!(matches!(
            catalog.get_attr("students", "age"),
            Err(CatalogError::AttributeNotFound { .. })
        ));
    }

    #[test]
    fn test_persisted_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut catalog = Catalog::open(dir.path()).unwrap();
            catalog.create_relation("students", &student_attrs()).unwrap();
            catalog
                .create_relation("tmp", &[AttrSpec::new("x", AttrType::Integer, None)])
                .unwrap();
            catalog.remove_relation("tmp").unwrap();
        }

        let catalog = Catalog::open(dir.path()).unwrap();
        assert_eq!(catalog.relation_names(), vec!["students".to_string()]);
        assert_eq!(
            catalog.get_relation_info("students").unwrap().record_len,
            28
        );
    }

    #[test]
    fn test_invalid_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(dir.path()).unwrap();
        catalog.create_relation("r", &student_attrs()).unwrap();

        assert!(matches!(
            catalog.create_relation("r", &student_attrs()),
            Err(CatalogError::RelationExists(_))
        ));
        let dup = vec![
            AttrSpec::new("a", AttrType::Integer, None),
            AttrSpec::new("a", AttrType::Float, None),
        ];
        assert!(matches!(
            catalog.create_relation("dup", &dup),
            Err(CatalogError::DuplicateAttribute(_))
        ));
        assert!(matches!(
            catalog.create_relation("s", &[AttrSpec::new("s", AttrType::String, None)]),
            Err(CatalogError::InvalidAttribute { .. })
        ));
        let huge = AttrSpec::new("blob", AttrType::String, Some(MAX_RECORD_LEN + 1));
        assert!(matches!(
            catalog.create_relation("big", &[huge]),
            Err(CatalogError::RecordTooLong { .. })
        ));
        for bad in ["../escape", "a/b", "x.rel", ""] {
            assert!(catalog.create_relation(bad, &student_attrs()).is_err());
        }
        assert!(matches!(
            catalog.create_relation("../escape", &student_attrs()),
            Err(CatalogError::InvalidName(_))
        ));
        assert!(matches!(
            catalog.create_relation("ok", &[AttrSpec::new("a b", AttrType::Integer, None)]),
            Err(CatalogError::InvalidName(_))
        ));
        assert!(matches!(
            catalog.remove_relation("missing"),
            Err(CatalogError::RelationNotFound(_))
        ));
        assert_eq!(catalog.relation_names().len(), 1);
    }
}
