//! Error kinds shared across the registry.

use std::path::PathBuf;

/// Registry-wide errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("key space saturated: collision retry budget exhausted ({minted} keys minted before failure)")]
    RegistrySaturated { minted: usize },

    #[error("storage unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt lineage: {0}")]
    CorruptLineage(String),

    #[error("malformed record at {path}:{line}: {text:?}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        text: String,
    },
}

impl RegistryError {
    pub(crate) fn storage(path: &std::path::Path, source: std::io::Error) -> Self {
        RegistryError::StorageUnavailable {
            path: path.to_path_buf(),
            source,
        }
    }
}
