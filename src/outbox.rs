use crate::db;
use crate::mailer::Mailer;
use crate::model::{OutboxTask, SideEffect};
use crate::registry::ConnectionRegistry;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, error, info, instrument, warn};

/// Event name pushed to a receiver's live connections.
pub const NEW_NOTIFICATION_EVENT: &str = "newNotification";

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_backoff_secs: i64,
    /// Attempts after which a task is parked as failed.
    pub max_attempts: i32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_backoff_secs: 300,
            max_attempts: 8,
        }
    }
}

async fn deliver(
    pool: &SqlitePool,
    registry: &ConnectionRegistry,
    mailer: &dyn Mailer,
    task: &OutboxTask,
) -> Result<()> {
    match &task.effect {
        SideEffect::Notify {
            sender_id,
            receiver_id,
            message,
            link,
        } => {
            let notification = db::insert_notification(
                pool,
                *sender_id,
                *receiver_id,
                message,
                link.as_deref(),
                task.id,
            )
            .await
            .context("failed to store notification")?;
            let payload = serde_json::to_value(&notification)?;
            if !registry
                .emit(*receiver_id, NEW_NOTIFICATION_EVENT, payload)
                .await
            {
                debug!(receiver_id, "receiver offline; notification stored only");
            }
            Ok(())
        }
        SideEffect::Email {
            to_email,
            to_name,
            template_id,
            params,
        } => mailer.send(to_email, to_name, *template_id, params).await,
    }
}

/// Deliver the next due task. Returns `false` when nothing was due.
#[instrument(skip_all)]
pub async fn process_next_task(
    pool: &SqlitePool,
    registry: &ConnectionRegistry,
    mailer: &dyn Mailer,
    policy: RetryPolicy,
) -> Result<bool> {
    let now = Utc::now();
    let Some(task) = db::next_due_outbox(pool, now).await? else {
        return Ok(false);
    };
    let kind = task.effect.kind().as_str();
    match deliver(pool, registry, mailer, &task).await {
        Ok(()) => {
            db::delete_outbox(pool, task.id).await?;
            info!(id = task.id, kind, "outbox task succeeded");
        }
        Err(err) => {
            let msg = format!("{err:#}");
            if task.attempt + 1 >= policy.max_attempts {
                error!(
                    ?err,
                    id = task.id,
                    kind,
                    attempt = task.attempt,
                    "outbox task failed; giving up"
                );
                db::dead_letter_outbox(pool, task.id, task.attempt, &msg, now).await?;
            } else {
                warn!(
                    ?err,
                    id = task.id,
                    kind,
                    attempt = task.attempt,
                    "outbox task failed; backoff"
                );
                db::backoff_outbox_with_cap(
                    pool,
                    task.id,
                    task.attempt,
                    policy.max_backoff_secs,
                    &msg,
                    now,
                )
                .await?;
            }
        }
    }
    Ok(true)
}

/// Process tasks until none is due. Returns how many were handled.
pub async fn drain(
    pool: &SqlitePool,
    registry: &ConnectionRegistry,
    mailer: &dyn Mailer,
    policy: RetryPolicy,
) -> Result<usize> {
    let mut handled = 0;
    while process_next_task(pool, registry, mailer, policy).await? {
        handled += 1;
    }
    Ok(handled)
}
