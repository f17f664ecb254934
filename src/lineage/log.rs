//! The derivation-edge log and its queries.
//!
//! One record per line in the lineage file: `<newKey>\t<oldKey>`, meaning
//! "oldKey was renamed/superseded by newKey". The log is the sole source of
//! truth for lineage; records are never rewritten. Chains are derived by
//! walking edges backward from a queried key.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use super::MatchMode;
use crate::error::RegistryError;
use crate::store;

/// A recorded derivation relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub new_key: String,
    pub old_key: String,
}

/// Append-only store of lineage edges, backed by a flat file.
#[derive(Debug)]
pub struct LineageLog {
    path: PathBuf,
}

impl LineageLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one immutable edge record.
    pub fn append_edge(&self, new_key: &str, old_key: &str) -> Result<(), RegistryError> {
        store::append_line(&self.path, &format!("{}\t{}", new_key, old_key))
    }

    /// Every edge currently stored, in append order. Malformed lines are
    /// surfaced as warnings and skipped.
    pub fn edges(&self) -> Result<Vec<LineageEdge>, RegistryError> {
        let mut edges = Vec::new();
        for (idx, line) in store::read_lines(&self.path)?.iter().enumerate() {
            match parse_edge(&self.path, idx + 1, line) {
                Ok(Some(edge)) => edges.push(edge),
                Ok(None) => {}
                Err(e) => warn!("skipping record: {}", e),
            }
        }
        Ok(edges)
    }

    /// Resolve the ancestor chain for `start_key`, most recent ancestor
    /// first. A key with no recorded edges resolves to `[start_key]`.
    ///
    /// A self-edge (a key re-keyed to itself) terminates the walk: the key
    /// is its own earliest traceable name. When a key carries several edges
    /// the most recently appended one wins. Any other repeated visit means
    /// the log is cyclic and the query fails with `CorruptLineage`.
    pub fn resolve_chain(&self, start_key: &str) -> Result<Vec<String>, RegistryError> {
        // Later appends override earlier ones for the same new_key.
        let mut parents: HashMap<String, String> = HashMap::new();
        for edge in self.edges()? {
            parents.insert(edge.new_key, edge.old_key);
        }

        let mut chain = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(start_key);

        let mut current = start_key;
        while let Some(old) = parents.get(current) {
            if old == current {
                break;
            }
            if !visited.insert(old) {
                return Err(RegistryError::CorruptLineage(format!(
                    "cycle detected at {:?} while resolving {:?}",
                    old, start_key
                )));
            }
            chain.push(old.clone());
            current = old;
        }

        if chain.is_empty() {
            chain.push(start_key.to_string());
        }
        Ok(chain)
    }

    /// All edges matching `pattern` under the given policy. A pattern
    /// matches an edge when it matches either endpoint. Result order is not
    /// part of the contract.
    pub fn filter_edges(
        &self,
        pattern: &str,
        mode: MatchMode,
    ) -> Result<Vec<LineageEdge>, RegistryError> {
        Ok(self
            .edges()?
            .into_iter()
            .filter(|e| mode.matches(pattern, &e.new_key) || mode.matches(pattern, &e.old_key))
            .collect())
    }
}

fn parse_edge(
    path: &Path,
    line_no: usize,
    line: &str,
) -> Result<Option<LineageEdge>, RegistryError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(new_key), Some(old_key), None) => Ok(Some(LineageEdge {
            new_key: new_key.to_string(),
            old_key: old_key.to_string(),
        })),
        _ => Err(RegistryError::MalformedRecord {
            path: path.to_path_buf(),
            line: line_no,
            text: line.to_string(),
        }),
    }
}
