//! Derived image path computation.
//!
//! Documents and their page images live in parallel trees that differ by one
//! directory name (`.../pdfs/a/b.pdf` becomes `.../pngs/a/b-1.png`). Every
//! function here is pure; nothing touches the filesystem except
//! [`ImageLayout::find_first_page`].

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Default directory token marking the document tree.
pub const DEFAULT_DOCUMENT_TOKEN: &str = "pdfs";

/// Default directory token marking the image tree.
pub const DEFAULT_IMAGE_TOKEN: &str = "pngs";

/// Extension used for rasterized pages.
pub const IMAGE_EXTENSION: &str = "png";

/// Maps source document paths to the image paths the rasterizer produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLayout {
    document_token: String,
    image_token: String,
}

impl Default for ImageLayout {
    fn default() -> Self {
        Self::new(DEFAULT_DOCUMENT_TOKEN, DEFAULT_IMAGE_TOKEN)
    }
}

impl ImageLayout {
    pub fn new(document_token: impl Into<String>, image_token: impl Into<String>) -> Self {
        Self {
            document_token: document_token.into(),
            image_token: image_token.into(),
        }
    }

    pub fn document_token(&self) -> &str {
        &self.document_token
    }

    pub fn image_token(&self) -> &str {
        &self.image_token
    }

    /// Directory the page images for `source` are written to.
    ///
    /// The first directory component equal to the document token is swapped
    /// for the image token. A source outside any document tree keeps its own
    /// directory, so images land next to the document.
    pub fn image_dir(&self, source: &Path) -> PathBuf {
        let parent = source.parent().unwrap_or_else(|| Path::new(""));
        let mut swapped = false;
        let mut dir = PathBuf::new();

        for component in parent.components() {
            match component {
                Component::Normal(name) if !swapped && name == self.document_token.as_str() => {
                    dir.push(&self.image_token);
                    swapped = true;
                }
                other => dir.push(other.as_os_str()),
            }
        }

        dir
    }

    /// Path prefix handed to the rasterizer: `<image_dir>/<stem>`.
    ///
    /// Page images are written as `<prefix>-<page>.png`.
    pub fn output_prefix(&self, source: &Path) -> PathBuf {
        let stem = source.file_stem().unwrap_or_default();
        self.image_dir(source).join(stem)
    }

    /// Canonical path of the first page image for `source`.
    pub fn first_page_path(&self, source: &Path) -> PathBuf {
        page_path(&self.output_prefix(source), 1, 1)
    }

    /// All names the first page of `source` may carry.
    pub fn first_page_candidates(&self, source: &Path) -> Vec<PathBuf> {
        first_page_candidates(&self.output_prefix(source))
    }

    /// Return the first existing first-page image for `source`, if any.
    pub async fn find_first_page(&self, source: &Path) -> Option<PathBuf> {
        for candidate in self.first_page_candidates(source) {
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Some(candidate);
            }
        }
        None
    }
}

/// All names the first page image written under `prefix` may carry.
///
/// pdftoppm zero-pads page numbers to the width of the page count, so a
/// 12 page document yields `-01.png` and a 150 page one `-001.png`.
pub fn first_page_candidates(prefix: &Path) -> Vec<PathBuf> {
    (1..=4).map(|width| page_path(prefix, 1, width)).collect()
}

fn page_path(prefix: &Path, page: u32, width: usize) -> PathBuf {
    let mut name: OsString = prefix.file_name().unwrap_or_default().to_os_string();
    name.push(format!("-{:0width$}.{}", page, IMAGE_EXTENSION, width = width));
    prefix.with_file_name(name)
}
