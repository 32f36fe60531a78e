//! Email extraction service.
//!
//! Drives a full run: discover documents, rasterize them, OCR the first page
//! images, mine addresses and write the sorted list. Separated from UI
//! concerns - emits progress events for whoever is listening.

mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::discovery::find_documents;
use crate::layout::ImageLayout;
use crate::mining::{AddressMiner, RegexAddressMiner};
use crate::ocr::{
    PdftoppmRasterizer, RasterizationError, Rasterizer, TesseractExtractor, TextExtractor,
};
use crate::pipeline::{run_stage, ProgressEvent, ProgressTracker, StageError, StageSpec};
use crate::services::aggregate::{write_addresses, AddressSet};

pub use types::{PipelineError, RasterOutcome, RunSummary};

pub const PHASE_DISCOVER: &str = "Finding pdf files";
pub const PHASE_RASTERIZE: &str = "Converting pdfs to images";
pub const PHASE_OCR: &str = "Extracting text from images";
pub const PHASE_MINE: &str = "Extracting email addresses";
pub const PHASE_WRITE: &str = "Writing email addresses";
pub const PHASE_DONE: &str = "Finished";

/// Overall progress split: the two external-tool stages get most of the bar.
const RASTERIZE_SPAN: (u8, u8) = (5, 50);
const OCR_SPAN: (u8, u8) = (50, 95);
const MINE_PERCENT: u8 = 96;
const WRITE_PERCENT: u8 = 98;

/// Knobs for a run that are not collaborator settings.
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub document_extension: String,
    pub language: String,
    pub rasterize_workers: usize,
    pub ocr_workers: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        let settings = Settings::default();
        Self::from(&settings)
    }
}

impl From<&Settings> for ExtractionOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            document_extension: settings.document_extension.clone(),
            language: settings.language.clone(),
            rasterize_workers: settings.rasterize_workers,
            ocr_workers: settings.ocr_workers,
        }
    }
}

/// Service for batch email extraction.
pub struct ExtractionService {
    rasterizer: Arc<dyn Rasterizer>,
    extractor: Arc<dyn TextExtractor>,
    miner: Arc<dyn AddressMiner>,
    layout: ImageLayout,
    options: ExtractionOptions,
}

impl ExtractionService {
    /// Create a service over the given collaborators with default options.
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        extractor: Arc<dyn TextExtractor>,
        miner: Arc<dyn AddressMiner>,
    ) -> Self {
        Self {
            rasterizer,
            extractor,
            miner,
            layout: ImageLayout::default(),
            options: ExtractionOptions::default(),
        }
    }

    /// Service backed by pdftoppm, tesseract and the regex miner.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(PdftoppmRasterizer::with_config(settings.rasterizer_config())),
            Arc::new(TesseractExtractor::with_config(settings.tesseract_config())),
            Arc::new(RegexAddressMiner::new()),
        )
        .with_layout(settings.image_layout())
        .with_options(ExtractionOptions::from(settings))
    }

    pub fn with_layout(mut self, layout: ImageLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_options(mut self, options: ExtractionOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the whole pipeline over `root`, writing addresses to `output`.
    ///
    /// Any failure aborts the run before `output` is touched.
    pub async fn process(
        &self,
        root: &Path,
        output: &Path,
        event_tx: mpsc::Sender<ProgressEvent>,
    ) -> Result<RunSummary, PipelineError> {
        let mut progress = ProgressTracker::new(event_tx);

        // ==================== Discovery ====================
        progress.update(0, PHASE_DISCOVER).await;
        let documents = find_documents(root, &self.options.document_extension)?;
        tracing::info!("Found {} documents under {}", documents.len(), root.display());
        check_distinct_prefixes(&self.layout, &documents)?;

        // ==================== Stage 1: Rasterize ====================
        let stage = StageSpec::new(
            PHASE_RASTERIZE,
            self.options.rasterize_workers,
            RASTERIZE_SPAN.0,
            RASTERIZE_SPAN.1,
        );
        let outcomes = run_stage(&stage, &documents, &mut progress, |source: PathBuf| {
            let rasterizer = self.rasterizer.clone();
            let layout = self.layout.clone();
            async move { rasterize_cached(rasterizer.as_ref(), &layout, &source).await }
        })
        .await
        .map_err(|e| {
            locate(e, &documents, |stage, item, source| {
                PipelineError::Rasterization {
                    stage,
                    item,
                    source,
                }
            })
        })?;

        let cached = outcomes.iter().filter(|o| o.cached).count();
        let images: Vec<PathBuf> = outcomes.into_iter().map(|o| o.image).collect();

        // ==================== Stage 2: OCR ====================
        let stage = StageSpec::new(
            PHASE_OCR,
            self.options.ocr_workers,
            OCR_SPAN.0,
            OCR_SPAN.1,
        );
        let texts = run_stage(&stage, &images, &mut progress, |image: PathBuf| {
            let extractor = self.extractor.clone();
            let language = self.options.language.clone();
            async move { extractor.extract_text(&image, &language).await }
        })
        .await
        .map_err(|e| {
            locate(e, &images, |stage, item, source| PipelineError::Ocr {
                stage,
                item,
                source,
            })
        })?;

        // ==================== Mining ====================
        progress.update(MINE_PERCENT, PHASE_MINE).await;
        let addresses = AddressSet::collect(&texts, self.miner.as_ref());
        let address_count = addresses.len();

        // ==================== Write ====================
        progress.update(WRITE_PERCENT, PHASE_WRITE).await;
        let destination = output.to_path_buf();
        tokio::task::spawn_blocking(move || write_addresses(&addresses, &destination))
            .await
            .map_err(|source| PipelineError::Worker {
                stage: PHASE_WRITE.to_string(),
                source,
            })??;

        progress.update(100, PHASE_DONE).await;

        Ok(RunSummary {
            documents: documents.len(),
            rasterized: documents.len() - cached,
            cached,
            texts: texts.len(),
            addresses: address_count,
            output: output.to_path_buf(),
        })
    }
}

/// Stage 1 step for one document: reuse an existing first page image or
/// invoke the rasterizer.
pub async fn rasterize_cached(
    rasterizer: &dyn Rasterizer,
    layout: &ImageLayout,
    source: &Path,
) -> Result<RasterOutcome, RasterizationError> {
    if let Some(image) = layout.find_first_page(source).await {
        tracing::debug!("Reusing {} for {}", image.display(), source.display());
        return Ok(RasterOutcome {
            image,
            cached: true,
        });
    }

    tracing::debug!("Rasterizing {} with {}", source.display(), rasterizer.name());
    let image = rasterizer
        .rasterize(source, &layout.output_prefix(source))
        .await?;
    Ok(RasterOutcome {
        image,
        cached: false,
    })
}

/// Every document must own its page images; two sources mapping to one
/// output prefix would share (and overwrite) the same files.
fn check_distinct_prefixes(
    layout: &ImageLayout,
    documents: &[PathBuf],
) -> Result<(), PipelineError> {
    let mut owners: HashMap<PathBuf, &PathBuf> = HashMap::with_capacity(documents.len());
    for document in documents {
        let prefix = layout.output_prefix(document);
        if let Some(first) = owners.insert(prefix.clone(), document) {
            tracing::warn!(
                "{} and {} share output prefix {}",
                first.display(),
                document.display(),
                prefix.display()
            );
            return Err(PipelineError::SharedPrefix {
                prefix,
                first: first.clone(),
                second: document.clone(),
            });
        }
    }
    Ok(())
}

/// Attach the stage label and failing item path to a stage error.
fn locate<E>(
    err: StageError<E>,
    items: &[PathBuf],
    wrap: impl FnOnce(String, PathBuf, E) -> PipelineError,
) -> PipelineError {
    match err {
        StageError::Item {
            label,
            index,
            source,
        } => {
            let item = items.get(index).cloned().unwrap_or_default();
            wrap(label, item, source)
        }
        StageError::Worker { label, source } => PipelineError::Worker {
            stage: label,
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct WritingRasterizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Rasterizer for WritingRasterizer {
        fn name(&self) -> &str {
            "writing"
        }

        async fn rasterize(
            &self,
            _source: &Path,
            output_prefix: &Path,
        ) -> Result<PathBuf, RasterizationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let image = crate::layout::first_page_candidates(output_prefix)[0].clone();
            tokio::fs::create_dir_all(image.parent().unwrap()).await?;
            tokio::fs::write(&image, b"png").await?;
            Ok(image)
        }
    }

    #[tokio::test]
    async fn test_rasterize_cached_skips_existing_image() {
        let dir = TempDir::new().unwrap();
        let layout = ImageLayout::default();
        let source = dir.path().join("pdfs").join("a.pdf");
        let rasterizer = WritingRasterizer {
            calls: AtomicUsize::new(0),
        };

        let first = rasterize_cached(&rasterizer, &layout, &source).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.image, dir.path().join("pngs").join("a-1.png"));

        let second = rasterize_cached(&rasterizer, &layout, &source).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.image, first.image);
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_prefixes() {
        let layout = ImageLayout::default();
        let documents = vec![
            PathBuf::from("data/pdfs/a.pdf"),
            PathBuf::from("data/pdfs/b.pdf"),
            PathBuf::from("data/pngs/a.pdf"),
        ];

        assert!(check_distinct_prefixes(&layout, &documents[..2]).is_ok());

        let err = check_distinct_prefixes(&layout, &documents).unwrap_err();
        assert_eq!(err.stage(), PHASE_DISCOVER);
        assert_eq!(err.item(), Some(Path::new("data/pngs/a.pdf")));
        assert!(matches!(
            err,
            PipelineError::SharedPrefix { ref first, ref prefix, .. }
                if first == Path::new("data/pdfs/a.pdf") && prefix == Path::new("data/pngs/a")
        ));
    }

    #[test]
    fn test_locate_maps_index_to_item() {
        let items = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
        let err: StageError<RasterizationError> = StageError::Item {
            label: PHASE_RASTERIZE.to_string(),
            index: 1,
            source: RasterizationError::ToolNotFound("pdftoppm".to_string()),
        };

        let mapped = locate(err, &items, |stage, item, source| {
            PipelineError::Rasterization {
                stage,
                item,
                source,
            }
        });

        assert_eq!(mapped.stage(), PHASE_RASTERIZE);
        assert_eq!(mapped.item(), Some(Path::new("b.pdf")));
        assert!(mapped.to_string().contains("b.pdf"));
    }
}
