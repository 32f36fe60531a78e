//! End-to-end extraction runs with in-memory collaborators.
//!
//! The fake rasterizer copies a document's bytes into its first page image
//! and the fake OCR returns the image bytes as text, so each "PDF" simply
//! contains the text its page should yield.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use pdfmail::layout::first_page_candidates;
use pdfmail::services::ExtractionOptions;
use pdfmail::{
    ExtractionService, OcrError, PipelineError, ProgressEvent, RasterizationError, Rasterizer,
    RegexAddressMiner, RunSummary, TextExtractor,
};

#[derive(Default)]
struct CopyRasterizer {
    calls: AtomicUsize,
    fail_on: Option<&'static str>,
}

#[async_trait]
impl Rasterizer for CopyRasterizer {
    fn name(&self) -> &str {
        "copy"
    }

    async fn rasterize(
        &self,
        source: &Path,
        output_prefix: &Path,
    ) -> Result<PathBuf, RasterizationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.is_some_and(|name| source.ends_with(name)) {
            return Err(RasterizationError::Failed {
                tool: "copy".to_string(),
                source_path: source.to_path_buf(),
                status: "exit status: 1".to_string(),
                stderr: "Syntax Error: Couldn't read xref table".to_string(),
            });
        }

        let image = first_page_candidates(output_prefix)[0].clone();
        tokio::fs::create_dir_all(image.parent().unwrap()).await?;
        tokio::fs::copy(source, &image).await?;
        Ok(image)
    }
}

#[derive(Default)]
struct EchoOcr {
    started: Mutex<Vec<String>>,
    fail_on: Option<&'static str>,
}

#[async_trait]
impl TextExtractor for EchoOcr {
    fn name(&self) -> &str {
        "echo"
    }

    async fn extract_text(&self, image: &Path, language: &str) -> Result<String, OcrError> {
        assert_eq!(language, "eng");
        let name = image.file_name().unwrap().to_string_lossy().into_owned();
        self.started.lock().unwrap().push(name.clone());

        tokio::time::sleep(Duration::from_millis(2)).await;

        if self.fail_on == Some(name.as_str()) {
            return Err(OcrError::OcrFailed {
                image: image.display().to_string(),
                message: "Error in pixReadStream".to_string(),
            });
        }
        Ok(tokio::fs::read_to_string(image).await.unwrap())
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(documents: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("pdfs")).unwrap();
        for (name, text) in documents {
            let path = dir.path().join("pdfs").join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, text).unwrap();
        }
        Self { dir }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().join("pdfs")
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("emails.txt")
    }
}

fn service(rasterizer: Arc<CopyRasterizer>, ocr: Arc<EchoOcr>, workers: usize) -> ExtractionService {
    ExtractionService::new(rasterizer, ocr, Arc::new(RegexAddressMiner::new())).with_options(
        ExtractionOptions {
            rasterize_workers: workers,
            ocr_workers: workers,
            ..Default::default()
        },
    )
}

async fn run(
    service: &ExtractionService,
    fixture: &Fixture,
) -> (Result<RunSummary, PipelineError>, Vec<ProgressEvent>) {
    let (tx, mut rx) = mpsc::channel(8);
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });

    let result = service.process(&fixture.root(), &fixture.output(), tx).await;
    let events = collector.await.unwrap();
    (result, events)
}

#[tokio::test]
async fn test_addresses_are_deduplicated_and_sorted() {
    let fixture = Fixture::new(&[
        ("one.pdf", "Reply to z@x.com"),
        ("nested/two.pdf", "a@x.com, cc z@x.com"),
        ("three.pdf", "no contact details on this page"),
        ("notes.txt", "ignored@x.com"),
    ]);
    let rasterizer = Arc::new(CopyRasterizer::default());
    let ocr = Arc::new(EchoOcr::default());

    let (result, _) = run(&service(rasterizer.clone(), ocr, 2), &fixture).await;
    let summary = result.unwrap();

    assert_eq!(
        std::fs::read_to_string(fixture.output()).unwrap(),
        "a@x.com\nz@x.com"
    );
    assert_eq!(summary.documents, 3);
    assert_eq!(summary.rasterized, 3);
    assert_eq!(summary.cached, 0);
    assert_eq!(summary.texts, 3);
    assert_eq!(summary.addresses, 2);
    assert!(fixture.dir.path().join("pngs/nested/two-1.png").exists());
}

#[tokio::test]
async fn test_rerun_uses_cached_images() {
    let fixture = Fixture::new(&[
        ("a.pdf", "first@agency.gov"),
        ("b.pdf", "second@agency.gov"),
        ("c.pdf", "first@agency.gov"),
    ]);

    let first_rasterizer = Arc::new(CopyRasterizer::default());
    let (result, _) = run(
        &service(first_rasterizer.clone(), Arc::new(EchoOcr::default()), 3),
        &fixture,
    )
    .await;
    result.unwrap();
    let first_output = std::fs::read(fixture.output()).unwrap();
    assert_eq!(first_rasterizer.calls.load(Ordering::SeqCst), 3);

    let second_rasterizer = Arc::new(CopyRasterizer::default());
    let (result, _) = run(
        &service(second_rasterizer.clone(), Arc::new(EchoOcr::default()), 3),
        &fixture,
    )
    .await;
    let summary = result.unwrap();

    assert_eq!(second_rasterizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.cached, 3);
    assert_eq!(summary.rasterized, 0);
    assert_eq!(std::fs::read(fixture.output()).unwrap(), first_output);
}

#[tokio::test]
async fn test_ocr_failure_aborts_without_output() {
    let fixture = Fixture::new(&[
        ("d1.pdf", "one@x.com"),
        ("d2.pdf", "two@x.com"),
        ("d3.pdf", "three@x.com"),
        ("d4.pdf", "four@x.com"),
        ("d5.pdf", "five@x.com"),
    ]);
    let ocr = Arc::new(EchoOcr {
        fail_on: Some("d3-1.png"),
        ..Default::default()
    });

    let (result, _) = run(
        &service(Arc::new(CopyRasterizer::default()), ocr.clone(), 1),
        &fixture,
    )
    .await;
    let err = result.unwrap_err();

    assert!(matches!(err, PipelineError::Ocr { .. }));
    assert_eq!(err.stage(), "Extracting text from images");
    assert_eq!(
        err.item(),
        Some(fixture.dir.path().join("pngs/d3-1.png").as_path())
    );
    assert_eq!(
        *ocr.started.lock().unwrap(),
        vec!["d1-1.png", "d2-1.png", "d3-1.png"]
    );
    assert!(!fixture.output().exists());
}

#[tokio::test]
async fn test_rasterization_failure_names_document() {
    let fixture = Fixture::new(&[("good.pdf", "ok@x.com"), ("broken.pdf", "x")]);
    std::fs::write(fixture.output(), "stale@x.com").unwrap();
    let rasterizer = Arc::new(CopyRasterizer {
        fail_on: Some("broken.pdf"),
        ..Default::default()
    });
    let ocr = Arc::new(EchoOcr::default());

    let (result, _) = run(&service(rasterizer, ocr.clone(), 4), &fixture).await;
    let err = result.unwrap_err();

    assert!(matches!(err, PipelineError::Rasterization { .. }));
    assert_eq!(err.item(), Some(fixture.root().join("broken.pdf").as_path()));
    assert!(err.to_string().contains("broken.pdf"));
    // Stage 2 never ran and the previous output is untouched.
    assert!(ocr.started.lock().unwrap().is_empty());
    assert_eq!(
        std::fs::read_to_string(fixture.output()).unwrap(),
        "stale@x.com"
    );
}

#[tokio::test]
async fn test_empty_directory_writes_empty_file() {
    let fixture = Fixture::new(&[]);
    std::fs::write(fixture.output(), "old@x.com").unwrap();

    let (result, events) = run(
        &service(
            Arc::new(CopyRasterizer::default()),
            Arc::new(EchoOcr::default()),
            4,
        ),
        &fixture,
    )
    .await;
    let summary = result.unwrap();

    assert_eq!(summary.documents, 0);
    assert_eq!(summary.addresses, 0);
    assert_eq!(std::fs::read_to_string(fixture.output()).unwrap(), "");
    assert_eq!(events.last().map(|e| e.percent), Some(100));
}

#[tokio::test]
async fn test_missing_root_is_a_discovery_error() {
    let fixture = Fixture::new(&[]);
    std::fs::remove_dir(fixture.root()).unwrap();

    let (result, _) = run(
        &service(
            Arc::new(CopyRasterizer::default()),
            Arc::new(EchoOcr::default()),
            4,
        ),
        &fixture,
    )
    .await;

    assert!(matches!(result, Err(PipelineError::Discovery(_))));
    assert!(!fixture.output().exists());
}

#[tokio::test]
async fn test_progress_covers_every_phase_in_order() {
    let fixture = Fixture::new(&[
        ("a.pdf", "a@x.com"),
        ("b.pdf", "b@x.com"),
        ("c.pdf", "c@x.com"),
        ("d.pdf", "d@x.com"),
    ]);

    let (result, events) = run(
        &service(
            Arc::new(CopyRasterizer::default()),
            Arc::new(EchoOcr::default()),
            2,
        ),
        &fixture,
    )
    .await;
    result.unwrap();

    let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.first(), Some(&0));
    assert_eq!(percents.last(), Some(&100));

    let mut labels: Vec<&str> = events.iter().map(|e| e.label.as_str()).collect();
    labels.dedup();
    assert_eq!(
        labels,
        vec![
            "Finding pdf files",
            "Converting pdfs to images",
            "Extracting text from images",
            "Extracting email addresses",
            "Writing email addresses",
            "Finished",
        ]
    );

    for event in &events {
        match event.label.as_str() {
            "Converting pdfs to images" => assert!((5..=50).contains(&event.percent)),
            "Extracting text from images" => assert!((50..=95).contains(&event.percent)),
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_extension_case_variant_is_not_a_second_document() {
    let fixture = Fixture::new(&[("a.pdf", "lower@x.com"), ("a.PDF", "upper@x.com")]);
    let rasterizer = Arc::new(CopyRasterizer::default());

    let (result, _) = run(
        &service(rasterizer.clone(), Arc::new(EchoOcr::default()), 1),
        &fixture,
    )
    .await;
    let summary = result.unwrap();

    assert_eq!(summary.documents, 1);
    assert_eq!(summary.cached, 0);
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        std::fs::read_to_string(fixture.output()).unwrap(),
        "lower@x.com"
    );
}

#[tokio::test]
async fn test_documents_sharing_image_prefix_abort_run() {
    let fixture = Fixture::new(&[("a.pdf", "from-pdfs@x.com")]);
    let clash = fixture.dir.path().join("pngs").join("a.pdf");
    std::fs::create_dir_all(clash.parent().unwrap()).unwrap();
    std::fs::write(&clash, "from-pngs@x.com").unwrap();

    let rasterizer = Arc::new(CopyRasterizer::default());
    let service = service(rasterizer.clone(), Arc::new(EchoOcr::default()), 1);
    let (tx, mut rx) = mpsc::channel(8);
    let collector = tokio::spawn(async move { while rx.recv().await.is_some() {} });

    let result = service
        .process(fixture.dir.path(), &fixture.output(), tx)
        .await;
    collector.await.unwrap();
    let err = result.unwrap_err();

    assert!(matches!(err, PipelineError::SharedPrefix { .. }));
    assert_eq!(err.stage(), "Finding pdf files");
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
    assert!(!fixture.output().exists());
}
