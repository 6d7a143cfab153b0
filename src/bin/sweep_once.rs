use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use brandcast::config;
use brandcast::db;
use brandcast::linkedin::{LinkedInClient, PublishingService};
use brandcast::mailer::HttpMailer;
use brandcast::outbox::{self, RetryPolicy};
use brandcast::registry::ConnectionRegistry;
use brandcast::scheduler::Scheduler;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run one scheduled publication sweep, drain the outbox and exit"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Only run the sweep; leave outbox tasks for the worker
    #[arg(long)]
    skip_outbox: bool,
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

    let publisher: Arc<dyn PublishingService> =
        Arc::new(LinkedInClient::from_config(&cfg.linkedin)?);
    let scheduler = Scheduler::new(
        pool.clone(),
        publisher,
        cfg.app.resolved_upload_dir(),
        &cfg.scheduler,
    );
    let report = scheduler.sweep(Utc::now()).await?;
    info!(
        due = report.due,
        posted = report.posted,
        skipped = report.skipped,
        failed = report.failed,
        overdue_invoices = report.overdue_invoices,
        "sweep complete"
    );

    if args.skip_outbox {
        return Ok(());
    }

    let mailer = HttpMailer::from_config(&cfg.mailer)?;
    let policy = RetryPolicy {
        max_backoff_secs: cfg.app.max_backoff_seconds as i64,
        max_attempts: cfg.app.max_outbox_attempts,
    };
    let handled = outbox::drain(&pool, &ConnectionRegistry::new(), &mailer, policy).await?;
    let remaining = db::count_remaining_outbox_tasks(&pool).await?;
    let failed = db::count_failed_outbox_tasks(&pool).await?;
    if remaining > 0 || failed > 0 {
        warn!(handled, remaining, failed, "outbox not empty; tasks are in backoff or parked");
    } else {
        info!(handled, "outbox drained");
    }
    Ok(())
}
