//! Flat attribute records keyed by registry keys.
//!
//! One record per line: `<key>\t<attribute>\t<value>`. Attributes never
//! affect key uniqueness or lineage; they ride alongside the registry as
//! plain annotations.

use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrRecord {
    pub key: String,
    pub attribute: String,
    pub value: String,
}

/// Append-only attribute file.
#[derive(Debug)]
pub struct AttrStore {
    path: PathBuf,
}

impl AttrStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn set(&self, key: &str, attribute: &str, value: &str) -> Result<(), RegistryError> {
        store::append_line(&self.path, &format!("{}\t{}\t{}", key, attribute, value))
    }

    /// Every attribute recorded for `key`, in insertion order.
    pub fn for_key(&self, key: &str) -> Result<Vec<AttrRecord>, RegistryError> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| r.key == key)
            .collect())
    }

    pub fn records(&self) -> Result<Vec<AttrRecord>, RegistryError> {
        let mut records = Vec::new();
        for (idx, line) in store::read_lines(&self.path)?.iter().enumerate() {
            match parse_record(&self.path, idx + 1, line) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!("skipping record: {}", e),
            }
        }
        Ok(records)
    }
}

fn parse_record(
    path: &Path,
    line_no: usize,
    line: &str,
) -> Result<Option<AttrRecord>, RegistryError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let fields: Vec<&str> = line.splitn(3, '\t').collect();
    match fields.as_slice() {
        [key, attribute, value] if !key.is_empty() && !attribute.is_empty() => Ok(Some(AttrRecord {
            key: key.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        })),
        _ => Err(RegistryError::MalformedRecord {
            path: path.to_path_buf(),
            line: line_no,
            text: line.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("keymint-attrs-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_set_and_read_back() {
        let dir = test_dir();
        let attrs = AttrStore::open(dir.join("reg_attr.txt"));

        attrs.set("zR56", "species", "Genus specificus").unwrap();
        attrs.set("zR56", "source", "field-2024").unwrap();
        attrs.set("Q7kp", "species", "Other thing").unwrap();

        let records = attrs.for_key("zR56").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].attribute, "species");
        assert_eq!(records[0].value, "Genus specificus");
        assert_eq!(records[1].attribute, "source");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_attr_lines_are_skipped() {
        let dir = test_dir();
        let path = dir.join("reg_attr.txt");
        std::fs::write(&path, "zR56\tspecies\tGenus sp.\nno-tabs-here\n").unwrap();

        let attrs = AttrStore::open(&path);
        assert_eq!(attrs.records().unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
