//! Entry points shared by the CLI and the scheduled worker.

use vcat_core::ImportSettings;
use vcat_db::CatalogStore;
use vcat_fetch::ImageSource;

use crate::error::ImportError;
use crate::images::{refresh_images, ImageReport};
use crate::inbox::Inbox;
use crate::orchestrator::{DocumentOutcome, ImportBudget, Importer, RunReport};
use crate::reconcile::ReconcileReport;

/// Import everything in the inbox within the configured budget and archive
/// the documents that finished.
///
/// # Errors
///
/// Returns [`ImportError`] if the inbox cannot be listed or run bookkeeping
/// fails. Window failures are reported in the [`RunReport`] instead.
pub async fn run_import_job<S: CatalogStore>(
    importer: &Importer<S>,
    inbox: &Inbox,
    trigger: &str,
) -> Result<RunReport, ImportError> {
    let documents = inbox.load().await?;
    let budget = ImportBudget::start(importer.settings().budget);
    let report = importer.run(&documents, &budget, trigger).await?;

    for document in &report.documents {
        if document.outcome != DocumentOutcome::Done {
            continue;
        }
        if let Err(e) = inbox.archive(&document.name).await {
            tracing::warn!(document = %document.name, error = %e, "could not archive document");
        }
    }
    Ok(report)
}

/// # Errors
///
/// Returns [`ImportError::Db`] if flagged templates cannot be read or stored.
pub async fn run_image_job<S, I>(
    store: &S,
    source: &I,
    settings: &ImportSettings,
) -> Result<ImageReport, ImportError>
where
    S: CatalogStore,
    I: ImageSource + ?Sized,
{
    let budget = ImportBudget::start(settings.budget);
    refresh_images(store, source, settings.image_batch_size, &budget).await
}

/// Reconcile outside an import run, e.g. after a policy change.
///
/// # Errors
///
/// Returns [`ImportError::Db`] if the pass cannot be written.
pub async fn run_reconcile_job<S: CatalogStore>(
    importer: &Importer<S>,
) -> Result<ReconcileReport, ImportError> {
    importer.reconcile_completed().await
}
