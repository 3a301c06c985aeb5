use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vcat_core::ImportSettings;
use vcat_db::MemoryCatalog;
use vcat_fetch::{ImageOutcome, ImageSource};
use vcat_import::{refresh_images, run_image_job, ImportBudget, ImportDocument, Importer};

/// Serves a fixed body for every URL except the ones listed as broken.
struct FakeSource {
    broken: HashSet<String>,
    calls: AtomicUsize,
}

#[async_trait]
impl ImageSource for FakeSource {
    async fn resolve(&self, url: &str) -> ImageOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(url) {
            ImageOutcome::Fallback(Arc::new(b"fallback".to_vec()))
        } else {
            ImageOutcome::Fetched(Arc::new(url.as_bytes().to_vec()))
        }
    }
}

async fn seeded(rows: &str) -> Importer<MemoryCatalog> {
    let importer = Importer::new(MemoryCatalog::new(), ImportSettings::default());
    let csv = format!("CATNO,IMAGE\n{rows}");
    let doc = ImportDocument::from_csv_bytes("catalog.csv", csv.as_bytes()).unwrap();
    importer
        .run(&[doc], &ImportBudget::start(Duration::from_secs(60)), "test")
        .await
        .unwrap();
    importer
}

#[tokio::test]
async fn image_pass_stores_fetched_and_fallback_images() {
    let importer = seeded("A1,https://img/a1.png\nA2,https://img/a2.png\nA3,\n").await;
    let source = FakeSource {
        broken: HashSet::from(["https://img/a2.png".to_string()]),
        calls: AtomicUsize::new(0),
    };

    let report = refresh_images(
        importer.store(),
        &source,
        1,
        &ImportBudget::start(Duration::from_secs(60)),
    )
    .await
    .unwrap();

    assert_eq!(report.fetched, 1);
    assert_eq!(report.fallbacks, 1);
    assert_eq!(report.batches, 2);
    assert_eq!(report.remaining, 0);
    assert!(!report.needs_reschedule());

    let s = importer.store().snapshot();
    let a1 = s.template_by_code("A1").unwrap();
    let a2 = s.template_by_code("A2").unwrap();
    assert!(!a1.image_updated && !a1.image_failed);
    assert!(!a2.image_updated && a2.image_failed);
    assert_eq!(s.images[&a1.id], b"https://img/a1.png");
    assert_eq!(s.images[&a2.id], b"fallback");
    // Blank urls were never flagged.
    assert_eq!(s.images.len(), 2);
}

#[tokio::test]
async fn exhausted_budget_leaves_images_pending() {
    let importer = seeded("A1,https://img/a1.png\n").await;
    let source = FakeSource {
        broken: HashSet::new(),
        calls: AtomicUsize::new(0),
    };

    let report = refresh_images(
        importer.store(),
        &source,
        10,
        &ImportBudget::start(Duration::ZERO),
    )
    .await
    .unwrap();

    assert!(report.budget_exhausted);
    assert_eq!(report.remaining, 1);
    assert!(report.needs_reschedule());
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn image_job_uses_configured_batch_size() {
    let importer =
        seeded("A1,https://img/a1.png\nA2,https://img/a2.png\nA3,https://img/a3.png\n").await;
    let source = FakeSource {
        broken: HashSet::new(),
        calls: AtomicUsize::new(0),
    };
    let settings = ImportSettings {
        image_batch_size: 2,
        ..ImportSettings::default()
    };

    let report = run_image_job(importer.store(), &source, &settings)
        .await
        .unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(report.fetched, 3);
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
}
