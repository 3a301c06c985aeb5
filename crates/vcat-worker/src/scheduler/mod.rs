//! Background job scheduler.
//!
//! Registers the recurring import and image jobs. A job that stops early
//! (budget spent, images still pending) asks to run again soon by adding a
//! one-shot job after the configured delay. Overlapping ticks of the same job
//! are skipped, never queued.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use vcat_core::{AppConfig, ImportSettings};
use vcat_db::PgCatalog;
use vcat_fetch::ImageFetcher;
use vcat_import::{run_image_job, run_import_job, Importer, Inbox};

type Tick = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Everything the scheduled jobs share.
pub struct WorkerState {
    importer: Importer<PgCatalog>,
    inbox: Inbox,
    fetcher: ImageFetcher,
    reschedule_delay: Duration,
    import_running: Mutex<()>,
    images_running: Mutex<()>,
}

impl WorkerState {
    pub fn new(config: &AppConfig, catalog: PgCatalog, fetcher: ImageFetcher) -> Self {
        Self {
            importer: Importer::new(catalog, ImportSettings::from_app_config(config)),
            inbox: Inbox::new(config.import_dir.clone(), config.completed_dir.clone()),
            fetcher,
            reschedule_delay: Duration::from_secs(config.reschedule_delay_secs),
            import_running: Mutex::new(()),
            images_running: Mutex::new(()),
        }
    }
}

/// Builds and starts the scheduler.
///
/// The returned [`JobScheduler`] must be kept alive for the lifetime of the
/// process; dropping it stops all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if a cron expression is invalid or the
/// scheduler cannot be started.
pub async fn build_scheduler(
    state: Arc<WorkerState>,
    import_cron: &str,
    image_cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let import_state = Arc::clone(&state);
    let import_job = Job::new_async(import_cron, move |_uuid, scheduler| {
        import_tick(Arc::clone(&import_state), scheduler, "schedule")
    })?;
    scheduler.add(import_job).await?;

    let image_job = Job::new_async(image_cron, move |_uuid, scheduler| {
        image_tick(Arc::clone(&state), scheduler, "schedule")
    })?;
    scheduler.add(image_job).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

fn import_tick(state: Arc<WorkerState>, scheduler: JobScheduler, trigger: &'static str) -> Tick {
    Box::pin(async move {
        let Ok(_running) = state.import_running.try_lock() else {
            tracing::info!(trigger, "scheduler: import still running; tick skipped");
            return;
        };

        tracing::info!(trigger, "scheduler: starting import run");
        match run_import_job(&state.importer, &state.inbox, trigger).await {
            Ok(report) => {
                tracing::info!(
                    run_id = report.run_id,
                    documents = report.documents.len(),
                    windows = report.windows_committed(),
                    failed = report.failed(),
                    "scheduler: import run complete"
                );
                if report.needs_reschedule() {
                    let next = Arc::clone(&state);
                    run_again_soon(&scheduler, state.reschedule_delay, "import", move |scheduler| {
                        import_tick(Arc::clone(&next), scheduler, "reschedule")
                    })
                    .await;
                }
            }
            Err(e) => tracing::error!(error = %e, "scheduler: import run failed"),
        }
    })
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

fn image_tick(state: Arc<WorkerState>, scheduler: JobScheduler, trigger: &'static str) -> Tick {
    Box::pin(async move {
        let Ok(_running) = state.images_running.try_lock() else {
            tracing::info!(trigger, "scheduler: image pass still running; tick skipped");
            return;
        };

        match run_image_job(state.importer.store(), &state.fetcher, state.importer.settings())
            .await
        {
            Ok(report) => {
                if report.needs_reschedule() {
                    let next = Arc::clone(&state);
                    run_again_soon(&scheduler, state.reschedule_delay, "images", move |scheduler| {
                        image_tick(Arc::clone(&next), scheduler, "reschedule")
                    })
                    .await;
                }
            }
            Err(e) => tracing::error!(error = %e, "scheduler: image pass failed"),
        }
    })
}

/// Add a one-shot job running `tick` after `delay`.
async fn run_again_soon<F>(scheduler: &JobScheduler, delay: Duration, name: &'static str, tick: F)
where
    F: Fn(JobScheduler) -> Tick + Send + Sync + 'static,
{
    let job = match Job::new_one_shot_async(delay, move |_uuid, scheduler| tick(scheduler)) {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(job = name, error = %e, "scheduler: could not build follow-up job");
            return;
        }
    };
    match scheduler.add(job).await {
        Ok(_) => tracing::info!(
            job = name,
            delay_secs = delay.as_secs(),
            "scheduler: follow-up run scheduled"
        ),
        Err(e) => tracing::error!(job = name, error = %e, "scheduler: could not schedule follow-up"),
    }
}
