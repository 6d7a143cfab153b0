//! Scheduled publication loop.
//!
//! A sweep publishes every pending post whose date has passed. Each post is
//! claimed with a conditional `pending -> publishing` update before the remote
//! call, so overlapping sweeps never publish the same post twice. A claim that
//! is never finished (crash mid-publish) is handed back after the lease.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::db::{self, NewScheduledPost, Pool};
use crate::error::{LifecycleError, LifecycleResult};
use crate::invoice;
use crate::linkedin::{self, PublishingService};
use crate::model::{PostStatus, ScheduledPost, SideEffect};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub due: usize,
    pub posted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub released: u64,
    pub overdue_invoices: u64,
}

/// What a user asks to publish later.
#[derive(Debug, Clone, Default)]
pub struct PostRequest {
    pub text: Option<String>,
    pub files: Vec<String>,
    pub kind: String,
    pub label: Option<String>,
}

#[derive(Clone)]
pub struct Scheduler {
    pool: Pool,
    publisher: Arc<dyn PublishingService>,
    media_root: PathBuf,
    claim_lease: Duration,
    invoice_overdue_days: i64,
}

impl Scheduler {
    pub fn new(
        pool: Pool,
        publisher: Arc<dyn PublishingService>,
        media_root: PathBuf,
        cfg: &crate::config::Scheduler,
    ) -> Self {
        Self {
            pool,
            publisher,
            media_root,
            claim_lease: Duration::seconds(cfg.claim_lease_seconds),
            invoice_overdue_days: cfg.invoice_overdue_days,
        }
    }

    #[instrument(skip(self, request))]
    pub async fn schedule_post(
        &self,
        user_id: i64,
        scheduled_date: DateTime<Utc>,
        request: PostRequest,
    ) -> LifecycleResult<ScheduledPost> {
        let has_text = request
            .text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_text && request.files.is_empty() {
            return Err(LifecycleError::validation("A content or images are required"));
        }
        if db::get_user(&self.pool, user_id).await?.is_none() {
            return Err(LifecycleError::NotFound("User"));
        }
        let kind = if request.kind.trim().is_empty() {
            "post".to_string()
        } else {
            request.kind
        };
        let id = db::insert_scheduled_post(
            &self.pool,
            &NewScheduledPost {
                user_id,
                scheduled_date,
                text: request.text,
                files: request.files,
                kind,
                label: request.label,
            },
        )
        .await?;
        info!(post_id = id, %scheduled_date, "post scheduled");
        db::get_scheduled_post(&self.pool, id)
            .await?
            .ok_or(LifecycleError::NotFound("Scheduled post"))
    }

    pub async fn list_posts(&self, user_id: i64) -> LifecycleResult<Vec<ScheduledPost>> {
        Ok(db::list_scheduled_posts(&self.pool, user_id).await?)
    }

    /// Cancel a post that has not been picked up yet.
    #[instrument(skip(self))]
    pub async fn cancel_post(&self, user_id: i64, post_id: i64) -> LifecycleResult<()> {
        if db::delete_pending_scheduled_post(&self.pool, post_id, user_id).await? {
            return Ok(());
        }
        match db::get_scheduled_post(&self.pool, post_id).await? {
            Some(post) if post.user_id == user_id && post.status != PostStatus::Pending => Err(
                LifecycleError::precondition("Only pending posts can be cancelled"),
            ),
            _ => Err(LifecycleError::NotFound("Scheduled post")),
        }
    }

    /// One pass over everything due at `now`. Failures of individual posts are
    /// logged and counted; they never abort the sweep.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport {
            released: db::release_stale_claims(&self.pool, now - self.claim_lease).await?,
            ..Default::default()
        };
        if report.released > 0 {
            warn!(released = report.released, "released abandoned claims");
        }

        let due = db::list_due_posts(&self.pool, now).await?;
        report.due = due.len();
        for post in due {
            match self.publish_one(&post, now).await {
                Ok(true) => report.posted += 1,
                Ok(false) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    error!(?err, post_id = post.id, "scheduled post failed");
                }
            }
        }

        report.overdue_invoices =
            invoice::mark_overdue(&self.pool, now, self.invoice_overdue_days).await?;
        if report.due > 0 {
            info!(?report, "sweep finished");
        }
        Ok(report)
    }

    /// `Ok(false)` when the post was skipped (no linked account, or another
    /// sweep owns it).
    async fn publish_one(&self, post: &ScheduledPost, now: DateTime<Utc>) -> Result<bool> {
        let account = match db::get_user(&self.pool, post.user_id).await? {
            Some(user) => user.linkedin,
            None => None,
        };
        let Some(account) = account else {
            warn!(post_id = post.id, user_id = post.user_id, "no linked account; skipping");
            return Ok(false);
        };
        if !db::claim_post(&self.pool, post.id, now).await? {
            info!(post_id = post.id, "post already claimed");
            return Ok(false);
        }

        let text = post.text.clone().unwrap_or_default();
        let published = match linkedin::publish(
            self.publisher.as_ref(),
            &self.media_root,
            &account,
            &text,
            &post.files,
        )
        .await
        {
            Ok(p) => p,
            Err(err) => {
                db::release_post(&self.pool, post.id, &format!("{err:#}"), Utc::now()).await?;
                return Err(err);
            }
        };

        let label = post.label.as_deref().unwrap_or(post.kind.as_str());
        let effect = SideEffect::notify(
            post.user_id,
            post.user_id,
            format!("Great news! Your post \"{label}\" has been shared successfully"),
            None,
        );
        let mut tx = self.pool.begin().await?;
        if !db::mark_post_posted_tx(&mut tx, post.id, &published.id, Utc::now()).await? {
            warn!(post_id = post.id, external_id = %published.id, "post was already marked posted");
        }
        db::enqueue_outbox_tx(&mut tx, &effect, Utc::now()).await?;
        tx.commit().await?;
        info!(post_id = post.id, external_id = %published.id, "scheduled post published");
        Ok(true)
    }
}
