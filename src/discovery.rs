//! Source document discovery.
//!
//! Walks a root directory and returns every file carrying the document
//! extension. Nothing is cached between calls.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// Errors that can occur while enumerating source documents.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Document root not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Document root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Find all documents under `root` whose extension matches `extension`.
///
/// The match is exact apart from a leading dot in `extension`, so `a.pdf`
/// and `a.PDF` never both qualify. Results are sorted so
/// repeated runs see the same order.
pub fn find_documents(root: &Path, extension: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    let wanted = extension.trim_start_matches('.');
    let mut documents = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| DiscoveryError::Unreadable {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            source: e,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == wanted);

        if matches {
            documents.push(entry.into_path());
        }
    }

    documents.sort();
    tracing::debug!("Found {} documents under {}", documents.len(), root.display());
    Ok(documents)
}
