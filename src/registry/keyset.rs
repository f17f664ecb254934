//! The persisted key set.
//!
//! One record per line in the key registry file: `<key>\t<filename>`, with
//! the literal `NONE` standing in for "no associated filename". The file is
//! append-only; a key re-keyed to a new filename simply gains a second line,
//! and hydration is last-wins.

use std::collections::HashMap;
use std::path::Path;

use log::warn;

use crate::error::RegistryError;
use crate::store;

/// Sentinel value recorded for keys minted without a filename association.
pub const NO_ASSOCIATION: &str = "NONE";

/// In-memory mapping of every key known to the registry.
#[derive(Debug, Default)]
pub struct KeySet {
    entries: HashMap<String, String>,
}

impl KeySet {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Hydrate from the key registry file at `path`, or start empty if no
    /// registry has been persisted yet.
    ///
    /// Malformed lines are surfaced as warnings and skipped; a load never
    /// aborts on bad records.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let mut set = Self::new();
        for (idx, line) in store::read_lines(path)?.iter().enumerate() {
            match parse_record(path, idx + 1, line) {
                Ok(Some((key, value))) => {
                    set.entries.insert(key, value);
                }
                Ok(None) => {} // blank line
                Err(e) => warn!("skipping record: {}", e),
            }
        }
        Ok(set)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite the association for `key`. Overwriting is the
    /// in-memory face of intentional re-keying.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys that carry a real filename association (not the sentinel).
    pub fn named_count(&self) -> usize {
        self.entries.values().filter(|v| *v != NO_ASSOCIATION).count()
    }
}

/// Parse one `<key>\t<value>` registry line. Returns `Ok(None)` for blank
/// lines, `MalformedRecord` for anything that is not exactly two fields.
fn parse_record(
    path: &Path,
    line_no: usize,
    line: &str,
) -> Result<Option<(String, String)>, RegistryError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(key), Some(value), None) => Ok(Some((key.to_string(), value.to_string()))),
        _ => Err(RegistryError::MalformedRecord {
            path: path.to_path_buf(),
            line: line_no,
            text: line.to_string(),
        }),
    }
}
