use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use domain::services::{CrmClient, MailingListClient, SpreadsheetWriter};
use persistence::repositories::{
    CompanyRepository, ExportJobRepository, FilterRepository, IntegrationLogRepository,
};
use prospect_api::app::{create_app, AppState};
use prospect_api::config::Config;
use prospect_api::jobs::{ExportWorkerPool, JobScheduler, PoolMetricsJob, StaleExportsJob};
use prospect_api::middleware::{init_metrics, logging::init_logging};
use prospect_api::services::destinations::{
    CrmExecutor, DisabledDestination, Executors, FileExecutor, FsSpreadsheetWriter,
    HttpCrmClient, HttpMailingListClient, MailingExecutor,
};
use prospect_api::services::{ExportRunner, ExportService};
use shared::jwt::JwtVerifier;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging).context("Failed to initialize logging")?;
    init_metrics().context("Failed to install metrics recorder")?;

    info!("Starting Prospect API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.database).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let companies = Arc::new(CompanyRepository::new(pool.clone()));
    let jobs = Arc::new(ExportJobRepository::new(pool.clone()));
    let logs = Arc::new(IntegrationLogRepository::new(pool.clone()));
    let filters = Arc::new(FilterRepository::new(pool.clone()));

    let jwt = match config.jwt.secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => {
            warn!("Verifying tokens with a shared HS256 secret");
            JwtVerifier::from_secret(secret, config.jwt.leeway_secs)?
        }
        None => JwtVerifier::from_rsa_pem(&config.jwt.public_key, config.jwt.leeway_secs)?,
    };

    let crm_client: Arc<dyn CrmClient> = if config.crm.enabled {
        Arc::new(HttpCrmClient::new(&config.crm)?)
    } else {
        info!("CRM destination disabled");
        Arc::new(DisabledDestination("CRM"))
    };
    let mailing_client: Arc<dyn MailingListClient> = if config.mailing.enabled {
        Arc::new(HttpMailingListClient::new(&config.mailing)?)
    } else {
        info!("Mailing destination disabled");
        Arc::new(DisabledDestination("Mailing"))
    };
    let artifacts: Arc<dyn SpreadsheetWriter> =
        Arc::new(FsSpreadsheetWriter::new(&config.export.output_dir));

    let executors = Executors::new(
        Arc::new(FileExecutor::new(artifacts.clone())),
        Arc::new(CrmExecutor::new(crm_client, config.export.crm_batch_size)),
        Arc::new(MailingExecutor::new(mailing_client)),
    );
    let runner = Arc::new(ExportRunner::new(
        companies.clone(),
        jobs.clone(),
        filters.clone(),
        executors,
        Duration::from_secs(config.export.destination_timeout_secs),
    ));
    let (queue, workers) =
        ExportWorkerPool::start(runner, config.export.workers, config.export.queue_depth);

    let mut scheduler = JobScheduler::new();
    scheduler.register(StaleExportsJob::new(
        jobs.clone(),
        queue.active(),
        config.export.stale_after_minutes,
    ));
    scheduler.register(PoolMetricsJob::new(pool.clone()));
    scheduler.start();

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        companies,
        filters: filters.clone(),
        exports: ExportService::new(jobs, logs, filters, artifacts, queue),
        jwt: Arc::new(jwt),
    };
    let app = create_app(state);

    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let shutdown_timeout = Duration::from_secs(config.export.shutdown_timeout_secs);
    workers.shutdown(shutdown_timeout).await;
    scheduler.shutdown();
    scheduler.wait_for_shutdown(shutdown_timeout).await;
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
