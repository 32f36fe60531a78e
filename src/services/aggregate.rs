//! Address aggregation and persistence.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::mining::AddressMiner;

/// Errors that can occur while writing the address list.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

/// Deduplicated, lexicographically ordered email addresses.
///
/// Addresses compare as exact strings; no case folding or trimming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSet {
    addresses: BTreeSet<String>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mine every text and merge the results.
    pub fn collect<S: AsRef<str>>(texts: &[S], miner: &dyn AddressMiner) -> Self {
        texts
            .iter()
            .flat_map(|text| miner.find_addresses(text.as_ref()))
            .collect()
    }

    /// Add an address, returning false if it was already present.
    pub fn insert(&mut self, address: impl Into<String>) -> bool {
        self.addresses.insert(address.into())
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Addresses in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }

    /// File contents: one address per line, no trailing newline.
    pub fn to_file_contents(&self) -> String {
        self.iter().collect::<Vec<_>>().join("\n")
    }
}

impl FromIterator<String> for AddressSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            addresses: iter.into_iter().collect(),
        }
    }
}

impl Extend<String> for AddressSet {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        self.addresses.extend(iter);
    }
}

/// Replace `path` with the address list.
///
/// Contents go to a temporary file in the same directory which is then
/// renamed over the destination, so readers never see a half-written list.
pub fn write_addresses(addresses: &AddressSet, path: &Path) -> Result<(), AggregationError> {
    let write_err = |source: std::io::Error| AggregationError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(addresses.to_file_contents().as_bytes())
        .map_err(write_err)?;
    file.flush().map_err(write_err)?;

    file.persist(path).map_err(|source| AggregationError::Persist {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!("Wrote {} addresses to {}", addresses.len(), path.display());
    Ok(())
}
