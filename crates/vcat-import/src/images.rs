//! Image refresh pass.
//!
//! Works off the `image_updated` flag rather than an offset: every batch
//! re-queries the flagged templates, so an interrupted pass simply resumes.

use vcat_db::{CatalogStore, CatalogTx};
use vcat_fetch::ImageSource;

use crate::error::ImportError;
use crate::orchestrator::ImportBudget;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageReport {
    pub fetched: usize,
    pub fallbacks: usize,
    pub batches: usize,
    /// Templates still flagged when the pass stopped.
    pub remaining: i64,
    pub budget_exhausted: bool,
}

impl ImageReport {
    #[must_use]
    pub fn needs_reschedule(&self) -> bool {
        self.remaining > 0
    }
}

/// Resolve and store images for flagged templates, `batch_size` at a time.
///
/// Fetches happen outside any transaction; each batch's results are stored
/// in one commit. A failed fetch stores the fallback image and sets
/// `image_failed`.
///
/// # Errors
///
/// Returns [`ImportError::Db`] if the pending list cannot be read or a batch
/// cannot be stored.
pub async fn refresh_images<S, I>(
    store: &S,
    source: &I,
    batch_size: usize,
    budget: &ImportBudget,
) -> Result<ImageReport, ImportError>
where
    S: CatalogStore,
    I: ImageSource + ?Sized,
{
    let limit = i64::try_from(batch_size.max(1)).unwrap_or(i64::MAX);
    let mut report = ImageReport::default();

    loop {
        if budget.exhausted() {
            report.budget_exhausted = true;
            break;
        }

        let mut tx = store.begin().await?;
        let pending = tx.list_image_pending(limit).await?;
        tx.rollback().await?;
        if pending.is_empty() {
            break;
        }

        let mut resolved = Vec::with_capacity(pending.len());
        for row in &pending {
            resolved.push((row.id, source.resolve(&row.image_url).await));
        }

        let mut tx = store.begin().await?;
        for (id, outcome) in &resolved {
            tx.store_image(*id, outcome.bytes(), outcome.is_fallback())
                .await?;
            if outcome.is_fallback() {
                report.fallbacks += 1;
            } else {
                report.fetched += 1;
            }
        }
        tx.commit().await?;
        report.batches += 1;

        tracing::debug!(batch = report.batches, images = resolved.len(), "image batch stored");
    }

    let mut tx = store.begin().await?;
    report.remaining = tx.count_image_pending().await?;
    tx.rollback().await?;

    tracing::info!(
        fetched = report.fetched,
        fallbacks = report.fallbacks,
        remaining = report.remaining,
        budget_exhausted = report.budget_exhausted,
        "image pass finished"
    );
    Ok(report)
}
