use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use brandcast::config;
use brandcast::db;
use brandcast::linkedin::{LinkedInClient, PublishingService};
use brandcast::mailer::HttpMailer;
use brandcast::outbox::{self, RetryPolicy};
use brandcast::registry::ConnectionRegistry;
use brandcast::scheduler::Scheduler;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/brandcast.db", cfg.app.resolved_data_dir()));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let registry = ConnectionRegistry::new();
    let publisher: Arc<dyn PublishingService> =
        Arc::new(LinkedInClient::from_config(&cfg.linkedin)?);
    let mailer = HttpMailer::from_config(&cfg.mailer)?;

    // Outbox worker
    let worker_pool = pool.clone();
    let worker_registry = registry.clone();
    let poll_sleep = Duration::from_millis(cfg.app.poll_interval_ms);
    let policy = RetryPolicy {
        max_backoff_secs: cfg.app.max_backoff_seconds as i64,
        max_attempts: cfg.app.max_outbox_attempts,
    };
    let worker = tokio::spawn(async move {
        loop {
            match outbox::process_next_task(&worker_pool, &worker_registry, &mailer, policy).await {
                Ok(processed) => {
                    if !processed {
                        tokio::time::sleep(poll_sleep).await;
                    }
                }
                Err(err) => {
                    error!(?err, "outbox worker error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    // Scheduled publication loop
    let scheduler = Scheduler::new(
        pool.clone(),
        publisher,
        cfg.app.resolved_upload_dir(),
        &cfg.scheduler,
    );
    let sweep_every = Duration::from_secs(cfg.scheduler.sweep_interval_seconds);
    let sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = scheduler.sweep(Utc::now()).await {
                error!(?err, "scheduled publication sweep failed");
            }
        }
    });

    info!("brandcast worker started");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    worker.abort();
    sweeper.abort();
    pool.close().await;
    Ok(())
}
