mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use vcat_db::PgCatalog;
use vcat_fetch::{load_fallback_image, ImageFetcher};

use crate::scheduler::WorkerState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = vcat_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = vcat_db::PoolConfig::from_app_config(&config);
    let pool = vcat_db::connect_pool(&config.database_url, pool_config).await?;
    vcat_db::run_migrations(&pool).await?;

    let fallback = match &config.fallback_image_path {
        Some(path) => Some(load_fallback_image(path).await?),
        None => None,
    };
    let fetcher = ImageFetcher::new(config.image_timeout_secs, &config.image_user_agent, fallback)?;

    let state = Arc::new(WorkerState::new(&config, PgCatalog::new(pool), fetcher));
    let mut scheduler =
        scheduler::build_scheduler(state, &config.import_cron, &config.image_cron).await?;
    tracing::info!(
        import_cron = %config.import_cron,
        image_cron = %config.image_cron,
        "worker started"
    );

    shutdown_signal().await;
    scheduler.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping scheduler");
}
