//! The batch import loop.
//!
//! A document moves `pending -> importing(batch) -> done`, or stops at
//! `failed(batch)` when a window cannot be committed. Every window is one
//! transaction that also advances the attachment's batch cursor, so a
//! restarted run resumes at the first uncommitted window.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use vcat_core::{CatalogField, ImportSettings};
use vcat_db::{AttachmentStatus, CatalogStore, CatalogTx};

use crate::classify::{classify_rows, RowSlot};
use crate::context::ImportContext;
use crate::error::ImportError;
use crate::mapper::{FieldMapping, RawRow};
use crate::pricelist::rebuild_price_lists;
use crate::reader::ImportDocument;
use crate::reconcile::{reconcile, ReconcileReport};
use crate::variants::synthesize_variants;
use crate::writer::{optimized_create, optimized_update};

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Cooperative wall-clock limit for one run, checked between windows.
///
/// Clones share one cancellation flag, so a run can also be stopped early
/// from outside at the next window boundary.
#[derive(Debug, Clone)]
pub struct ImportBudget {
    started: Instant,
    limit: Duration,
    cancelled: Arc<AtomicBool>,
}

impl ImportBudget {
    #[must_use]
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
            cancelled: Arc::default(),
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Treat the budget as spent from now on.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.elapsed() >= self.limit
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Where a document stopped in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Done,
    /// A window failed; the cursor still points at it.
    Failed { batch: i32, error: String },
    /// The budget ran out before the document finished.
    Interrupted { batch: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    pub name: String,
    pub attachment_id: i64,
    pub outcome: DocumentOutcome,
    pub windows: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: i64,
    pub documents: Vec<DocumentReport>,
    pub reconciled: Option<ReconcileReport>,
    pub budget_exhausted: bool,
}

impl RunReport {
    /// The scheduler should run the import again soon.
    #[must_use]
    pub fn needs_reschedule(&self) -> bool {
        self.budget_exhausted
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        self.documents
            .iter()
            .any(|d| matches!(d.outcome, DocumentOutcome::Failed { .. }))
    }

    #[must_use]
    pub fn windows_committed(&self) -> usize {
        self.documents.iter().map(|d| d.windows).sum()
    }

    fn first_error(&self) -> Option<String> {
        self.documents.iter().find_map(|d| match &d.outcome {
            DocumentOutcome::Failed { error, .. } => Some(format!("{}: {error}", d.name)),
            _ => None,
        })
    }
}

#[derive(Debug, Default)]
struct WindowStats {
    created: usize,
    updated: usize,
    skipped: usize,
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

pub struct Importer<S> {
    store: S,
    settings: ImportSettings,
}

impl<S: CatalogStore> Importer<S> {
    pub fn new(store: S, settings: ImportSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Import `documents` in order, then reconcile stale products if every
    /// document finished.
    ///
    /// Window failures are recorded on the document and in the report; they
    /// do not stop the remaining documents.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Db`] when run or attachment bookkeeping cannot
    /// be written. The run is recorded as failed where still possible.
    pub async fn run(
        &self,
        documents: &[ImportDocument],
        budget: &ImportBudget,
        trigger: &str,
    ) -> Result<RunReport, ImportError> {
        let mut tx = self.store.begin().await?;
        let run = tx.create_import_run(trigger).await?;
        tx.start_import_run(run.id).await?;
        let size_attribute_id = tx.ensure_attribute(&self.settings.size_attribute).await?;
        tx.commit().await?;

        tracing::info!(run_id = run.id, trigger, documents = documents.len(), "import run started");

        let mut report = RunReport {
            run_id: run.id,
            documents: Vec::with_capacity(documents.len()),
            reconciled: None,
            budget_exhausted: false,
        };

        match self
            .import_all(documents, budget, size_attribute_id, &mut report)
            .await
        {
            Ok(()) => {
                let error = report.first_error();
                self.finish_run(&report, error.as_deref()).await?;
                tracing::info!(
                    run_id = run.id,
                    windows = report.windows_committed(),
                    failed = report.failed(),
                    budget_exhausted = report.budget_exhausted,
                    elapsed_ms = budget.elapsed().as_millis(),
                    "import run finished"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(run_id = run.id, error = %e, "import run aborted");
                if let Err(finish) = self.finish_run(&report, Some(&e.to_string())).await {
                    tracing::error!(
                        run_id = run.id,
                        error = %finish,
                        "could not record aborted run"
                    );
                }
                Err(e)
            }
        }
    }

    /// Reconcile every completed attachment not yet used by a reconciliation
    /// pass, then mark them used.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Db`] if the pass cannot be written.
    pub async fn reconcile_completed(&self) -> Result<ReconcileReport, ImportError> {
        let mut tx = self.store.begin().await?;
        let attachment_ids = tx.list_unreconciled_attachments().await?;
        let report = reconcile(&mut tx, self.settings.stale_policy, &attachment_ids).await?;
        tx.mark_attachments_reconciled(&attachment_ids).await?;
        tx.commit().await?;
        Ok(report)
    }

    async fn import_all(
        &self,
        documents: &[ImportDocument],
        budget: &ImportBudget,
        size_attribute_id: i64,
        report: &mut RunReport,
    ) -> Result<(), ImportError> {
        for document in documents {
            if budget.exhausted() {
                tracing::info!(document = %document.name, "budget exhausted before document");
                report.budget_exhausted = true;
                break;
            }
            let doc_report = self
                .import_document(document, budget, size_attribute_id)
                .await?;
            let interrupted = matches!(doc_report.outcome, DocumentOutcome::Interrupted { .. });
            report.documents.push(doc_report);
            if interrupted {
                report.budget_exhausted = true;
                break;
            }
        }

        let all_done = report.documents.len() == documents.len()
            && report
                .documents
                .iter()
                .all(|d| d.outcome == DocumentOutcome::Done);
        if all_done && !report.budget_exhausted {
            report.reconciled = Some(self.reconcile_completed().await?);
        } else {
            tracing::info!("reconciliation skipped; not every document finished");
        }
        Ok(())
    }

    async fn finish_run(&self, report: &RunReport, error: Option<&str>) -> Result<(), ImportError> {
        let windows = i32::try_from(report.windows_committed()).unwrap_or(i32::MAX);
        let mut tx = self.store.begin().await?;
        tx.finish_import_run(report.run_id, windows, error).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn import_document(
        &self,
        document: &ImportDocument,
        budget: &ImportBudget,
        size_attribute_id: i64,
    ) -> Result<DocumentReport, ImportError> {
        let source = document.source.as_ref();
        let mapping = FieldMapping::resolve(source.headers());
        let row_count = i32::try_from(source.len()).unwrap_or(i32::MAX);

        let mut tx = self.store.begin().await?;
        let attachment = tx
            .register_attachment(&document.name, &document.checksum, row_count)
            .await?;
        let mut report = DocumentReport {
            name: document.name.clone(),
            attachment_id: attachment.id,
            outcome: DocumentOutcome::Done,
            windows: 0,
            created: 0,
            updated: 0,
            skipped: 0,
        };
        let mut batch = attachment.batch;

        let rejection = document.load_error.clone().or_else(|| {
            (!mapping.contains(CatalogField::ProductCode)).then(|| {
                ImportError::MissingCodeColumn {
                    document: document.name.clone(),
                }
                .to_string()
            })
        });
        if let Some(error) = rejection {
            tx.set_attachment_state(attachment.id, AttachmentStatus::Failed, batch, Some(&error))
                .await?;
            tx.commit().await?;
            tracing::error!(document = %document.name, error = %error, "document rejected");
            report.outcome = DocumentOutcome::Failed { batch, error };
            return Ok(report);
        }

        tx.set_attachment_state(attachment.id, AttachmentStatus::Importing, batch, None)
            .await?;
        tx.commit().await?;

        tracing::info!(
            document = %document.name,
            attachment_id = attachment.id,
            rows = source.len(),
            resume_batch = batch,
            "importing document"
        );

        let window_size = self.settings.window_size.max(1);
        let ctx = ImportContext {
            settings: &self.settings,
            attachment_id: attachment.id,
            size_attribute_id,
        };

        loop {
            if budget.exhausted() {
                tracing::info!(document = %document.name, batch, "budget exhausted; yielding");
                report.outcome = DocumentOutcome::Interrupted { batch };
                return Ok(report);
            }

            let start = usize::try_from(batch).unwrap_or(0) * window_size;
            if start >= source.len() {
                if let Err(e) = self.mark_done(attachment.id, batch).await {
                    let range = source.len()..source.len();
                    return self
                        .fail_document(document, attachment.id, batch, &range, &e, report)
                        .await;
                }
                tracing::info!(
                    document = %document.name,
                    windows = report.windows,
                    created = report.created,
                    updated = report.updated,
                    "document imported"
                );
                return Ok(report);
            }

            let range = start..(start + window_size).min(source.len());
            let raw = source.rows(range.clone());

            match self.commit_window(&ctx, &mapping, &raw, batch + 1).await {
                Ok(stats) => {
                    batch += 1;
                    report.windows += 1;
                    report.created += stats.created;
                    report.updated += stats.updated;
                    report.skipped += stats.skipped;
                    tracing::debug!(
                        document = %document.name,
                        rows = ?range,
                        batch,
                        "window committed"
                    );
                }
                Err(e) => {
                    return self
                        .fail_document(document, attachment.id, batch, &range, &e, report)
                        .await;
                }
            }
        }
    }

    /// Process one window and advance the cursor to `next_batch`, all in one
    /// transaction. Nothing of the window survives an error.
    async fn commit_window(
        &self,
        ctx: &ImportContext<'_>,
        mapping: &FieldMapping,
        raw: &[RawRow],
        next_batch: i32,
    ) -> Result<WindowStats, ImportError> {
        let mut tx = self.store.begin().await?;
        let stats = match process_window(&mut tx, ctx, mapping, raw).await {
            Ok(stats) => stats,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "window rollback failed");
                }
                return Err(e);
            }
        };
        tx.set_attachment_state(ctx.attachment_id, AttachmentStatus::Importing, next_batch, None)
            .await?;
        tx.commit().await?;
        Ok(stats)
    }

    async fn mark_done(&self, attachment_id: i64, batch: i32) -> Result<(), ImportError> {
        let mut tx = self.store.begin().await?;
        tx.set_attachment_state(attachment_id, AttachmentStatus::Done, batch, None)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fail_document(
        &self,
        document: &ImportDocument,
        attachment_id: i64,
        batch: i32,
        range: &Range<usize>,
        cause: &ImportError,
        mut report: DocumentReport,
    ) -> Result<DocumentReport, ImportError> {
        let error = format!("rows {}..{}: {cause}", range.start, range.end);
        tracing::error!(
            document = %document.name,
            rows = ?range,
            batch,
            error = %cause,
            "window failed; rolled back"
        );

        let mut tx = self.store.begin().await?;
        tx.set_attachment_state(attachment_id, AttachmentStatus::Failed, batch, Some(&error))
            .await?;
        tx.commit().await?;

        report.outcome = DocumentOutcome::Failed { batch, error };
        Ok(report)
    }
}

/// Classify, write, synthesize and price one window inside `tx`.
async fn process_window<T: CatalogTx>(
    tx: &mut T,
    ctx: &ImportContext<'_>,
    mapping: &FieldMapping,
    raw: &[RawRow],
) -> Result<WindowStats, ImportError> {
    let rows = raw.iter().map(|r| mapping.clean_row(r)).collect();
    let window = classify_rows(tx, ctx, rows).await?;

    let created = optimized_create(tx, ctx, &window.to_create).await?;
    let outcome = optimized_update(tx, ctx, &window.to_update).await?;

    let mut image_ids = created.clone();
    image_ids.extend(&outcome.image_changed);
    tx.flag_image_updated(&image_ids).await?;
    tx.enable_dropship(&created).await?;
    tx.retag_variants(&outcome.unchanged, ctx.attachment_id).await?;

    // Row order decides variant-code collisions.
    let changed: BTreeSet<i64> = outcome.variants_changed.iter().copied().collect();
    let touched: Vec<i64> = window
        .order
        .iter()
        .filter_map(|slot| match *slot {
            RowSlot::Create(i) => created.get(i).copied(),
            RowSlot::Update(i) => window
                .to_update
                .get(i)
                .map(|(id, _)| *id)
                .filter(|id| changed.contains(id)),
        })
        .collect();

    synthesize_variants(tx, ctx, &touched).await?;
    rebuild_price_lists(tx, ctx, &touched).await?;

    Ok(WindowStats {
        created: created.len(),
        updated: window.to_update.len(),
        skipped: window.skipped,
    })
}
