//! Command handlers. Each one connects what it needs, runs one job and
//! prints a short summary; progress detail goes to the log.

use std::path::PathBuf;

use anyhow::Context;
use vcat_core::{AppConfig, ImportSettings, StalePolicy};
use vcat_db::{CatalogStore, CatalogTx, MemoryCatalog, PgCatalog, PoolConfig};
use vcat_fetch::{load_fallback_image, ImageFetcher};
use vcat_import::{
    run_image_job, run_import_job, run_reconcile_job, DocumentOutcome, ImportBudget, Importer,
    Inbox, ReconcileReport, RunReport,
};

async fn connect(config: &AppConfig) -> anyhow::Result<PgCatalog> {
    let pool = vcat_db::connect_pool(&config.database_url, PoolConfig::from_app_config(config))
        .await
        .context("failed to connect to database")?;
    Ok(PgCatalog::new(pool))
}

pub(crate) async fn db_ping(config: &AppConfig) -> anyhow::Result<()> {
    let catalog = connect(config).await?;
    vcat_db::ping(catalog.pool()).await?;
    println!("database reachable");
    Ok(())
}

pub(crate) async fn db_migrate(config: &AppConfig) -> anyhow::Result<()> {
    let catalog = connect(config).await?;
    let applied = vcat_db::run_migrations(catalog.pool()).await?;
    println!("{applied} migration(s) applied");
    Ok(())
}

pub(crate) async fn import(
    config: &AppConfig,
    dry_run: bool,
    dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let settings = ImportSettings::from_app_config(config);
    let inbox = Inbox::new(
        dir.unwrap_or_else(|| config.import_dir.clone()),
        config.completed_dir.clone(),
    );

    if dry_run {
        let documents = inbox.load().await?;
        let importer = Importer::new(MemoryCatalog::new(), settings);
        let budget = ImportBudget::start(importer.settings().budget);
        let report = importer.run(&documents, &budget, "cli-dry-run").await?;
        print_run(&report);

        let state = importer.store().snapshot();
        println!(
            "dry run: {} template(s), {} variant(s), {} price entr(ies) would be written",
            state.templates.len(),
            state.variants.len(),
            state.vendor_prices.len()
        );
        return Ok(());
    }

    let importer = Importer::new(connect(config).await?, settings);
    let report = run_import_job(&importer, &inbox, "cli").await?;
    print_run(&report);

    if report.failed() {
        anyhow::bail!("import finished with failed documents; see log for row ranges");
    }
    Ok(())
}

pub(crate) async fn images(config: &AppConfig) -> anyhow::Result<()> {
    let catalog = connect(config).await?;
    let fallback = match &config.fallback_image_path {
        Some(path) => Some(load_fallback_image(path).await?),
        None => None,
    };
    let fetcher = ImageFetcher::new(config.image_timeout_secs, &config.image_user_agent, fallback)?;

    let settings = ImportSettings::from_app_config(config);
    let report = run_image_job(&catalog, &fetcher, &settings).await?;
    println!(
        "images: {} fetched, {} fallback, {} still pending",
        report.fetched, report.fallbacks, report.remaining
    );
    Ok(())
}

pub(crate) async fn reconcile(
    config: &AppConfig,
    policy: Option<StalePolicy>,
) -> anyhow::Result<()> {
    let mut settings = ImportSettings::from_app_config(config);
    if let Some(policy) = policy {
        settings.stale_policy = policy;
    }
    let importer = Importer::new(connect(config).await?, settings);
    let report = run_reconcile_job(&importer).await?;
    print_reconcile(&report);
    Ok(())
}

pub(crate) async fn status(config: &AppConfig, limit: i64) -> anyhow::Result<()> {
    let catalog = connect(config).await?;
    let mut tx = catalog.begin().await?;
    let runs = tx.list_import_runs(limit).await?;
    let attachments = tx.list_attachments(limit).await?;
    let pending_images = tx.count_image_pending().await?;
    tx.rollback().await?;

    println!("import runs:");
    for run in &runs {
        println!(
            "  #{:<6} {:<10} {:<10} windows={:<5} {}",
            run.id,
            run.status,
            run.trigger_source,
            run.windows_committed,
            run.error_message.as_deref().unwrap_or("")
        );
    }
    println!("attachments:");
    for a in &attachments {
        println!(
            "  #{:<6} {:<10} batch={:<5} rows={:<7} {} {}",
            a.id,
            a.status,
            a.batch,
            a.row_count,
            a.name,
            a.error_message.as_deref().unwrap_or("")
        );
    }
    println!("images pending: {pending_images}");
    Ok(())
}

fn print_run(report: &RunReport) {
    println!("run #{}", report.run_id);
    for doc in &report.documents {
        let outcome = match &doc.outcome {
            DocumentOutcome::Done => "done".to_string(),
            DocumentOutcome::Failed { batch, error } => format!("failed at batch {batch}: {error}"),
            DocumentOutcome::Interrupted { batch } => format!("paused at batch {batch}"),
        };
        println!(
            "  {}: {outcome} ({} created, {} updated, {} skipped, {} window(s))",
            doc.name, doc.created, doc.updated, doc.skipped, doc.windows
        );
    }
    if report.budget_exhausted {
        println!("  budget exhausted; run again to continue");
    }
    if let Some(reconciled) = &report.reconciled {
        print_reconcile(reconciled);
    }
}

fn print_reconcile(report: &ReconcileReport) {
    println!(
        "reconciled {} attachment(s) with policy {}: {} template(s) / {} variant(s) reactivated, \
         {} template(s) / {} variant(s) stale",
        report.attachments.len(),
        report.policy,
        report.reactivated.templates,
        report.reactivated.variants,
        report.stale.templates,
        report.stale.variants
    );
}
