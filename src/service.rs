//! Registry service: the composition root tying the key generator, the
//! persisted key set and the lineage log together into the operations the
//! CLI exposes.
//!
//! All durable state lives in flat files under one base directory, sharing
//! a base name: `<base>_main.txt` (key registry), `<base>_rev_hist.txt`
//! (lineage log), `<base>_attr.txt` (attributes) and `<base>_log.txt`
//! (informational operation log).

use std::path::PathBuf;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attrs::{AttrRecord, AttrStore};
use crate::error::RegistryError;
use crate::lineage::{LineageEdge, LineageLog, MatchMode};
use crate::registry::{CollisionBudget, KeyGenerator, KeySet, NO_ASSOCIATION};
use crate::store;

/// Reserved query returning every stored edge, compared case-insensitively.
pub const WILDCARD_QUERY: &str = "ALL";

/// Where the registry lives and how keys are minted and matched.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory holding the registry files.
    pub base_dir: PathBuf,
    /// Base filename shared by the registry files.
    pub base_name: String,
    /// Symbol length of generated keys.
    pub key_length: usize,
    /// Pattern policy for lineage reports.
    pub match_mode: MatchMode,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            base_name: "registry".to_string(),
            key_length: 4,
            match_mode: MatchMode::Substring,
        }
    }
}

/// A request to key (or re-key) a named file.
#[derive(Debug, Clone)]
pub struct AssignRequest {
    /// The filename being renamed.
    pub original_name: String,
    /// Prefix the composed filename starts with.
    pub prefix: String,
    /// Optional extension the composed filename ends with.
    pub extension: Option<String>,
    /// Caller-supplied key; `None` mints a fresh one.
    pub key: Option<String>,
    /// Free-text comment for the operation log.
    pub comment: Option<String>,
}

/// Outcome of a successful key assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedKey {
    pub key: String,
    pub new_name: String,
}

/// One entry of a per-key lineage report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntry {
    pub key: String,
    pub ancestors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a lineage report query.
#[derive(Debug, Clone)]
pub enum LineageReport {
    /// Wildcard query: every stored edge, order not guaranteed.
    AllEdges(Vec<LineageEdge>),
    /// Per-key ancestor chains for every stored key matching the query.
    Chains(Vec<ChainEntry>),
}

/// Summary counters over the registry files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_keys: usize,
    pub named_keys: usize,
    pub total_edges: usize,
}

/// Orchestrates key assignment, minting and lineage reporting over one
/// registry.
#[derive(Debug)]
pub struct RegistryService {
    config: RegistryConfig,
    generator: KeyGenerator,
}

impl RegistryService {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            generator: KeyGenerator::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn registry_path(&self) -> PathBuf {
        self.file_path("main")
    }

    fn lineage_path(&self) -> PathBuf {
        self.file_path("rev_hist")
    }

    fn attr_path(&self) -> PathBuf {
        self.file_path("attr")
    }

    fn oplog_path(&self) -> PathBuf {
        self.file_path("log")
    }

    fn file_path(&self, suffix: &str) -> PathBuf {
        self.config
            .base_dir
            .join(format!("{}_{}.txt", self.config.base_name, suffix))
    }

    /// Assign a key to `request.original_name` and compose its new
    /// filename.
    ///
    /// A caller-supplied key is accepted even when it already exists in the
    /// registry; re-keying under a new extension is an intentional
    /// operation, not a conflict. The recorded lineage edge points from the
    /// assigned key back to the identifier extracted from the original
    /// filename (or the literal filename when it does not follow the
    /// `prefix.<key>.<extension>` shape).
    pub fn assign_key(&self, request: &AssignRequest) -> Result<AssignedKey, RegistryError> {
        let registry_path = self.registry_path();
        let mut keys = KeySet::load(&registry_path)?;

        let key = match &request.key {
            Some(supplied) => supplied.clone(),
            None => self
                .generator
                .generate_keys(1, self.config.key_length, &mut keys)?
                .remove(0),
        };

        let new_name = compose_name(&request.prefix, &key, request.extension.as_deref());
        keys.insert(key.clone(), new_name.clone());
        store::append_line(&registry_path, &format!("{}\t{}", key, new_name))?;

        let origin = extract_origin(
            &request.original_name,
            &request.prefix,
            request.extension.as_deref(),
        );
        LineageLog::open(self.lineage_path()).append_edge(&key, &origin)?;

        info!("assigned key {} -> {}", key, new_name);
        self.log_operation(
            &format!("key {} -> {} [{}]", request.original_name, new_name, key),
            request.comment.as_deref(),
        );

        Ok(AssignedKey { key, new_name })
    }

    /// Mint `count` standalone keys with no filename association and no
    /// lineage edge.
    ///
    /// Keys are persisted one at a time, so keys minted before a
    /// saturation failure stay committed; the error reports how many.
    pub fn mint_simple_keys(&self, count: usize) -> Result<Vec<String>, RegistryError> {
        let registry_path = self.registry_path();
        let mut keys = KeySet::load(&registry_path)?;
        let mut budget = CollisionBudget::default();
        let mut minted = Vec::with_capacity(count);

        for _ in 0..count {
            let key = match self
                .generator
                .generate_one(self.config.key_length, &mut keys, &mut budget)
            {
                Ok(key) => key,
                Err(RegistryError::RegistrySaturated { .. }) => {
                    return Err(RegistryError::RegistrySaturated {
                        minted: minted.len(),
                    })
                }
                Err(e) => return Err(e),
            };
            store::append_line(&registry_path, &format!("{}\t{}", key, NO_ASSOCIATION))?;
            minted.push(key);
        }

        info!("minted {} standalone keys", minted.len());
        self.log_operation(&format!("mint {} keys: {}", minted.len(), minted.join(" ")), None);
        Ok(minted)
    }

    /// Report lineage for `query`: every stored edge for the `ALL`
    /// wildcard, otherwise the ancestor chain of each stored key matching
    /// the query under the configured policy.
    ///
    /// A corrupt chain is reported on its own entry and does not abort the
    /// sibling entries of the same report.
    pub fn report_lineage(&self, query: &str) -> Result<LineageReport, RegistryError> {
        let log = LineageLog::open(self.lineage_path());

        if query.eq_ignore_ascii_case(WILDCARD_QUERY) {
            return Ok(LineageReport::AllEdges(log.edges()?));
        }

        // Candidate keys are those recorded as a rename target; a query
        // matching none of them still reports its own trivial chain.
        let mut candidates: Vec<String> = Vec::new();
        for edge in log.edges()? {
            if self.config.match_mode.matches(query, &edge.new_key)
                && !candidates.contains(&edge.new_key)
            {
                candidates.push(edge.new_key);
            }
        }
        if candidates.is_empty() {
            candidates.push(query.to_string());
        }

        let mut entries = Vec::with_capacity(candidates.len());
        for key in candidates {
            match log.resolve_chain(&key) {
                Ok(ancestors) => entries.push(ChainEntry {
                    key,
                    ancestors,
                    error: None,
                }),
                Err(e @ RegistryError::CorruptLineage(_)) => entries.push(ChainEntry {
                    key,
                    ancestors: Vec::new(),
                    error: Some(e.to_string()),
                }),
                Err(e) => return Err(e),
            }
        }
        Ok(LineageReport::Chains(entries))
    }

    /// Record an attribute for `key`.
    pub fn set_attribute(
        &self,
        key: &str,
        attribute: &str,
        value: &str,
    ) -> Result<(), RegistryError> {
        AttrStore::open(self.attr_path()).set(key, attribute, value)?;
        self.log_operation(&format!("attr {} {}={}", key, attribute, value), None);
        Ok(())
    }

    /// Attributes recorded for `key`, in insertion order.
    pub fn attributes_for(&self, key: &str) -> Result<Vec<AttrRecord>, RegistryError> {
        AttrStore::open(self.attr_path()).for_key(key)
    }

    /// Summary counters over the registry and lineage files.
    pub fn stats(&self) -> Result<RegistryStats, RegistryError> {
        let keys = KeySet::load(&self.registry_path())?;
        let edges = LineageLog::open(self.lineage_path()).edges()?;
        Ok(RegistryStats {
            total_keys: keys.len(),
            named_keys: keys.named_count(),
            total_edges: edges.len(),
        })
    }

    /// Append one informational record to the operation log. The log is
    /// never consumed by queries, so a write failure is a warning, not an
    /// operation failure.
    fn log_operation(&self, text: &str, comment: Option<&str>) {
        let record = match comment {
            Some(c) if !c.is_empty() => format!(
                "{}\t{}\t{} ({})",
                Utc::now().to_rfc3339(),
                Uuid::new_v4(),
                text,
                c
            ),
            _ => format!("{}\t{}\t{}", Utc::now().to_rfc3339(), Uuid::new_v4(), text),
        };
        if let Err(e) = store::append_line(&self.oplog_path(), &record) {
            warn!("operation log write failed: {}", e);
        }
    }
}

/// Compose the derived filename: `prefix.key` plus the extension when one
/// is given.
fn compose_name(prefix: &str, key: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("{}.{}.{}", prefix, key, ext),
        None => format!("{}.{}", prefix, key),
    }
}

/// Extract the lineage origin from `original`: the embedded key when the
/// filename follows the `prefix.<key>.<extension>` shape, otherwise the
/// literal filename as the chain root.
fn extract_origin(original: &str, prefix: &str, extension: Option<&str>) -> String {
    let Some(rest) = original
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('.'))
    else {
        return original.to_string();
    };
    let mid = match extension {
        Some(ext) => match rest.strip_suffix(ext).and_then(|r| r.strip_suffix('.')) {
            Some(mid) => mid,
            None => return original.to_string(),
        },
        None => rest,
    };
    if mid.is_empty() || mid.contains('.') {
        return original.to_string();
    }
    mid.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::KeyAlphabet;
    use std::path::Path;

    fn test_dir() -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("keymint-service-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_service(dir: &Path) -> RegistryService {
        RegistryService::new(RegistryConfig {
            base_dir: dir.to_path_buf(),
            base_name: "reg".to_string(),
            ..RegistryConfig::default()
        })
    }

    #[test]
    fn test_compose_and_extract() {
        assert_eq!(
            compose_name("gensp.pre", "zR56", Some("fa")),
            "gensp.pre.zR56.fa"
        );
        assert_eq!(compose_name("gensp.pre", "zR56", None), "gensp.pre.zR56");

        assert_eq!(
            extract_origin("gensp.pre.zR56.fa", "gensp.pre", Some("fa")),
            "zR56"
        );
        assert_eq!(
            extract_origin("initial_file.fa", "gensp.pre", Some("fa")),
            "initial_file.fa"
        );
        assert_eq!(
            extract_origin("gensp.pre.zR56.fa", "gensp.pre", None),
            "gensp.pre.zR56.fa"
        );
    }

    #[test]
    fn test_assign_with_supplied_key_and_rekey() {
        let dir = test_dir();
        let svc = test_service(&dir);

        // First assignment: literal original name becomes the chain root.
        let assigned = svc
            .assign_key(&AssignRequest {
                original_name: "initial_file.fa".to_string(),
                prefix: "gensp.pre".to_string(),
                extension: Some("fa".to_string()),
                key: Some("zR56".to_string()),
                comment: Some("field sample".to_string()),
            })
            .unwrap();
        assert_eq!(assigned.key, "zR56");
        assert_eq!(assigned.new_name, "gensp.pre.zR56.fa");

        // Re-key the composed name under the same key: tolerated self-edge.
        let again = svc
            .assign_key(&AssignRequest {
                original_name: "gensp.pre.zR56.fa".to_string(),
                prefix: "gensp.pre".to_string(),
                extension: Some("fa".to_string()),
                key: Some("zR56".to_string()),
                comment: None,
            })
            .unwrap();
        assert_eq!(again.new_name, "gensp.pre.zR56.fa");

        let edges = LineageLog::open(dir.join("reg_rev_hist.txt")).edges().unwrap();
        assert_eq!(
            edges,
            vec![
                LineageEdge {
                    new_key: "zR56".to_string(),
                    old_key: "initial_file.fa".to_string()
                },
                LineageEdge {
                    new_key: "zR56".to_string(),
                    old_key: "zR56".to_string()
                },
            ]
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_assign_generates_when_no_key_supplied() {
        let dir = test_dir();
        let svc = test_service(&dir);

        let assigned = svc
            .assign_key(&AssignRequest {
                original_name: "sample.fa".to_string(),
                prefix: "gensp.pre".to_string(),
                extension: Some("fa".to_string()),
                key: None,
                comment: None,
            })
            .unwrap();

        assert_eq!(assigned.key.len(), 4);
        assert!(KeyAlphabet::new().spans(&assigned.key));
        assert_eq!(
            assigned.new_name,
            format!("gensp.pre.{}.fa", assigned.key)
        );

        let keys = KeySet::load(&dir.join("reg_main.txt")).unwrap();
        assert_eq!(keys.get(&assigned.key), Some(assigned.new_name.as_str()));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_chained_renames_round_trip() {
        let dir = test_dir();
        let svc = test_service(&dir);

        let mut previous = "first_capture.fa".to_string();
        for key in ["Bb22", "Cc33", "Dd44"] {
            let assigned = svc
                .assign_key(&AssignRequest {
                    original_name: previous.clone(),
                    prefix: "gensp.pre".to_string(),
                    extension: Some("fa".to_string()),
                    key: Some(key.to_string()),
                    comment: None,
                })
                .unwrap();
            previous = assigned.new_name;
        }

        match svc.report_lineage("Dd44").unwrap() {
            LineageReport::Chains(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].ancestors, vec!["Cc33", "Bb22", "first_capture.fa"]);
            }
            other => panic!("expected chains, got {:?}", other),
        }

        match svc.report_lineage("Cc33").unwrap() {
            LineageReport::Chains(entries) => {
                assert_eq!(entries[0].ancestors, vec!["Bb22", "first_capture.fa"]);
            }
            other => panic!("expected chains, got {:?}", other),
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_mint_records_sentinel_and_trivial_lineage() {
        let dir = test_dir();
        let svc = test_service(&dir);

        let minted = svc.mint_simple_keys(3).unwrap();
        assert_eq!(minted.len(), 3);

        let keys = KeySet::load(&dir.join("reg_main.txt")).unwrap();
        for key in &minted {
            assert_eq!(keys.get(key), Some(NO_ASSOCIATION));
            match svc.report_lineage(key).unwrap() {
                LineageReport::Chains(entries) => {
                    assert_eq!(entries[0].ancestors, vec![key.clone()]);
                }
                other => panic!("expected chains, got {:?}", other),
            }
        }

        // Standalone keys never gain lineage edges.
        assert!(LineageLog::open(dir.join("reg_rev_hist.txt"))
            .edges()
            .unwrap()
            .is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_saturated_mint_leaves_registry_intact() {
        let dir = test_dir();
        let svc = RegistryService::new(RegistryConfig {
            base_dir: dir.clone(),
            base_name: "reg".to_string(),
            key_length: 2,
            ..RegistryConfig::default()
        });

        // Pre-fill the whole 2-symbol key space.
        let alphabet = KeyAlphabet::new();
        let symbols: Vec<char> = (0u8..=255)
            .filter_map(|b| {
                let c = b as char;
                alphabet.spans(&c.to_string()).then_some(c)
            })
            .collect();
        let mut lines = String::new();
        for a in &symbols {
            for b in &symbols {
                lines.push_str(&format!("{}{}\tNONE\n", a, b));
            }
        }
        let registry = dir.join("reg_main.txt");
        std::fs::write(&registry, &lines).unwrap();
        let before = std::fs::read(&registry).unwrap();

        match svc.mint_simple_keys(2).unwrap_err() {
            RegistryError::RegistrySaturated { minted } => assert_eq!(minted, 0),
            other => panic!("expected RegistrySaturated, got {:?}", other),
        }

        // Nothing was appended and nothing was rewritten.
        assert_eq!(std::fs::read(&registry).unwrap(), before);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_wildcard_report_is_idempotent() {
        let dir = test_dir();
        let svc = test_service(&dir);

        for (key, original) in [("Bb22", "one.fa"), ("Cc33", "two.fa")] {
            svc.assign_key(&AssignRequest {
                original_name: original.to_string(),
                prefix: "gensp.pre".to_string(),
                extension: Some("fa".to_string()),
                key: Some(key.to_string()),
                comment: None,
            })
            .unwrap();
        }

        let first = match svc.report_lineage("all").unwrap() {
            LineageReport::AllEdges(edges) => edges,
            other => panic!("expected all edges, got {:?}", other),
        };
        let second = match svc.report_lineage("ALL").unwrap() {
            LineageReport::AllEdges(edges) => edges,
            other => panic!("expected all edges, got {:?}", other),
        };
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_chain_reported_per_entry() {
        let dir = test_dir();
        let svc = test_service(&dir);

        let log = LineageLog::open(dir.join("reg_rev_hist.txt"));
        log.append_edge("B", "A").unwrap();
        log.append_edge("A", "B").unwrap();
        log.append_edge("Zz99", "clean.fa").unwrap();

        match svc.report_lineage("Zz99").unwrap() {
            LineageReport::Chains(entries) => {
                assert_eq!(entries.len(), 1);
                assert!(entries[0].error.is_none());
                assert_eq!(entries[0].ancestors, vec!["clean.fa"]);
            }
            other => panic!("expected chains, got {:?}", other),
        }

        // The cyclic pair reports its corruption without failing the call.
        match svc.report_lineage("A").unwrap() {
            LineageReport::Chains(entries) => {
                assert!(entries.iter().any(|e| e.error.is_some()));
            }
            other => panic!("expected chains, got {:?}", other),
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_registry_file_is_append_only_across_operations() {
        let dir = test_dir();
        let svc = test_service(&dir);

        svc.assign_key(&AssignRequest {
            original_name: "one.fa".to_string(),
            prefix: "gensp.pre".to_string(),
            extension: Some("fa".to_string()),
            key: Some("Bb22".to_string()),
            comment: None,
        })
        .unwrap();

        let registry = dir.join("reg_main.txt");
        let lineage = dir.join("reg_rev_hist.txt");
        let registry_before = std::fs::read(&registry).unwrap();
        let lineage_before = std::fs::read(&lineage).unwrap();

        svc.mint_simple_keys(2).unwrap();
        svc.assign_key(&AssignRequest {
            original_name: "two.fa".to_string(),
            prefix: "gensp.pre".to_string(),
            extension: Some("fa".to_string()),
            key: Some("Cc33".to_string()),
            comment: None,
        })
        .unwrap();

        assert!(std::fs::read(&registry).unwrap().starts_with(&registry_before));
        assert!(std::fs::read(&lineage).unwrap().starts_with(&lineage_before));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_attributes_round_trip() {
        let dir = test_dir();
        let svc = test_service(&dir);

        svc.set_attribute("zR56", "species", "Genus specificus").unwrap();
        svc.set_attribute("zR56", "source", "field-2024").unwrap();

        let records = svc.attributes_for("zR56").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].attribute, "species");
        assert_eq!(records[1].value, "field-2024");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_stats() {
        let dir = test_dir();
        let svc = test_service(&dir);

        svc.assign_key(&AssignRequest {
            original_name: "one.fa".to_string(),
            prefix: "gensp.pre".to_string(),
            extension: Some("fa".to_string()),
            key: Some("Bb22".to_string()),
            comment: None,
        })
        .unwrap();
        svc.mint_simple_keys(2).unwrap();

        let stats = svc.stats().unwrap();
        assert_eq!(stats.total_keys, 3);
        assert_eq!(stats.named_keys, 1);
        assert_eq!(stats.total_edges, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
