use super::model::{NewInvoice, NewScheduledPost};
use crate::model::{
    Campaign, CampaignDraft, Invoice, InvoiceStatus, LinkedAccount, Notification, OutboxKind,
    OutboxTask, Participant, PostStatus, Review, ScheduledPost, SideEffect, User, UserKind,
};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::instrument;

pub type Pool = SqlitePool;
pub type DbResult<T> = Result<T, sqlx::Error>;

pub async fn init_pool(database_url: &str) -> anyhow::Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePoolOptions::new().connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and ask SQLite to create the file. Leaves in-memory URLs
/// untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match path_part.strip_prefix("~/") {
        Some(rest) => match std::env::var("HOME") {
            Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
            Err(_) => path_part.to_string(),
        },
        None => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    rebuilt.push('?');
    match query_part {
        Some(q) if q.contains("mode=") => rebuilt.push_str(q),
        Some(q) => {
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> DbResult<String> {
    serde_json::to_string(value)
        .map_err(|e| sqlx::Error::Protocol(format!("failed to encode json column: {e}")))
}

fn from_json<T: DeserializeOwned>(raw: &str) -> DbResult<T> {
    serde_json::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn decode_err(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

// ---------------------------------------------------------------------------
// users & reviews

#[instrument(skip_all)]
pub async fn create_user(pool: &Pool, name: &str, email: &str, kind: UserKind) -> DbResult<i64> {
    let rec = sqlx::query(
        "INSERT INTO users (name, email, kind, created_at) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(email)
    .bind(kind.as_str())
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

fn user_from_row(row: &SqliteRow) -> DbResult<User> {
    let kind_str: String = row.try_get("kind")?;
    let kind = UserKind::parse_kind(&kind_str)
        .ok_or_else(|| decode_err(format!("unknown user kind {kind_str}")))?;
    let member_id: Option<String> = row.try_get("linkedin_member_id")?;
    let token: Option<String> = row.try_get("linkedin_access_token")?;
    let linkedin = match (member_id, token) {
        (Some(member_id), Some(access_token))
            if !member_id.is_empty() && !access_token.is_empty() =>
        {
            Some(LinkedAccount {
                member_id,
                access_token,
                expires_at: row.try_get("linkedin_expires_at")?,
            })
        }
        _ => None,
    };
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        kind,
        linkedin,
        created_at: row.try_get("created_at")?,
    })
}

#[instrument(skip_all)]
pub async fn get_user(pool: &Pool, user_id: i64) -> DbResult<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn link_linkedin_account(
    pool: &Pool,
    user_id: i64,
    account: &LinkedAccount,
) -> DbResult<bool> {
    let res = sqlx::query(
        "UPDATE users SET linkedin_member_id = ?, linkedin_access_token = ?, linkedin_expires_at = ? WHERE id = ?",
    )
    .bind(&account.member_id)
    .bind(&account.access_token)
    .bind(account.expires_at)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() == 1)
}

#[instrument(skip_all)]
pub async fn has_review(
    pool: &Pool,
    creator_id: i64,
    reviewer_id: i64,
    campaign_id: i64,
) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM reviews WHERE creator_id = ? AND reviewer_id = ? AND campaign_id = ?",
    )
    .bind(creator_id)
    .bind(reviewer_id)
    .bind(campaign_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// Insert a review. Returns `false` when the (creator, reviewer, campaign)
/// triple already exists.
#[instrument(skip_all)]
pub async fn insert_review(pool: &Pool, creator_id: i64, review: &Review) -> DbResult<bool> {
    let res = sqlx::query(
        "INSERT INTO reviews (creator_id, reviewer_id, campaign_id, rating, review, created_at) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(creator_id, reviewer_id, campaign_id) DO NOTHING",
    )
    .bind(creator_id)
    .bind(review.reviewer_id)
    .bind(review.campaign_id)
    .bind(review.rating)
    .bind(&review.review)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn list_reviews(pool: &Pool, creator_id: i64) -> DbResult<Vec<Review>> {
    let rows = sqlx::query(
        "SELECT reviewer_id, campaign_id, rating, review FROM reviews WHERE creator_id = ? ORDER BY id",
    )
    .bind(creator_id)
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| {
            Ok(Review {
                reviewer_id: row.try_get("reviewer_id")?,
                campaign_id: row.try_get("campaign_id")?,
                rating: row.try_get("rating")?,
                review: row.try_get("review")?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// campaigns

fn campaign_from_row(row: &SqliteRow) -> DbResult<Campaign> {
    let tags: String = row.try_get("tags")?;
    let participants: String = row.try_get("participants")?;
    Ok(Campaign {
        id: row.try_get("id")?,
        brand_id: row.try_get("brand_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        tags: from_json(&tags)?,
        budget: row.try_get("budget")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        visible: row.try_get("visible")?,
        participants: from_json(&participants)?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[instrument(skip_all)]
pub async fn insert_campaign(pool: &Pool, brand_id: i64, draft: &CampaignDraft) -> DbResult<i64> {
    let now = Utc::now();
    let rec = sqlx::query(
        "INSERT INTO campaigns (brand_id, title, description, tags, budget, start_date, end_date, visible, participants, version, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, '[]', 1, ?, ?) RETURNING id",
    )
    .bind(brand_id)
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(to_json(&draft.tags)?)
    .bind(draft.budget)
    .bind(draft.start_date)
    .bind(draft.end_date)
    .bind(draft.visible)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn load_campaign(pool: &Pool, campaign_id: i64) -> DbResult<Option<Campaign>> {
    let row = sqlx::query("SELECT * FROM campaigns WHERE id = ?")
        .bind(campaign_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(campaign_from_row).transpose()
}

/// Write the participant list back if nobody else has written since
/// `expected_version` was read. Returns `false` on a stale version.
#[instrument(skip_all)]
pub async fn save_participants_tx(
    tx: &mut Transaction<'_, Sqlite>,
    campaign_id: i64,
    expected_version: i64,
    participants: &[Participant],
) -> DbResult<bool> {
    let res = sqlx::query(
        "UPDATE campaigns SET participants = ?, version = version + 1, updated_at = ? \
         WHERE id = ? AND version = ?",
    )
    .bind(to_json(&participants)?)
    .bind(Utc::now())
    .bind(campaign_id)
    .bind(expected_version)
    .execute(&mut **tx)
    .await?;
    Ok(res.rows_affected() == 1)
}

#[instrument(skip_all)]
pub async fn update_campaign_details(
    pool: &Pool,
    campaign_id: i64,
    draft: &CampaignDraft,
) -> DbResult<bool> {
    let res = sqlx::query(
        "UPDATE campaigns SET title = ?, description = ?, tags = ?, budget = ?, start_date = ?, end_date = ?, visible = ?, \
         version = version + 1, updated_at = ? WHERE id = ?",
    )
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(to_json(&draft.tags)?)
    .bind(draft.budget)
    .bind(draft.start_date)
    .bind(draft.end_date)
    .bind(draft.visible)
    .bind(Utc::now())
    .bind(campaign_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() == 1)
}

#[instrument(skip_all)]
pub async fn delete_campaign(pool: &Pool, campaign_id: i64, brand_id: i64) -> DbResult<bool> {
    let res = sqlx::query("DELETE FROM campaigns WHERE id = ? AND brand_id = ?")
        .bind(campaign_id)
        .bind(brand_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn list_campaigns_by_brand(pool: &Pool, brand_id: i64) -> DbResult<Vec<Campaign>> {
    let rows = sqlx::query("SELECT * FROM campaigns WHERE brand_id = ? ORDER BY id")
        .bind(brand_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(campaign_from_row).collect()
}

pub async fn list_campaigns_for_creator(pool: &Pool, creator_id: i64) -> DbResult<Vec<Campaign>> {
    let rows = sqlx::query(
        "SELECT c.* FROM campaigns c WHERE EXISTS ( \
            SELECT 1 FROM json_each(c.participants) p \
            WHERE json_extract(p.value, '$.creator_id') = ? \
         ) ORDER BY c.id",
    )
    .bind(creator_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(campaign_from_row).collect()
}

/// Campaigns open to creators, newest first. `tag` keeps only campaigns
/// carrying that exact tag.
pub async fn list_visible_campaigns(pool: &Pool, tag: Option<&str>) -> DbResult<Vec<Campaign>> {
    let rows = sqlx::query(
        "SELECT c.* FROM campaigns c WHERE c.visible = 1 AND ( \
            ? IS NULL OR EXISTS (SELECT 1 FROM json_each(c.tags) t WHERE t.value = ?) \
         ) ORDER BY c.id DESC",
    )
    .bind(tag)
    .bind(tag)
    .fetch_all(pool)
    .await?;
    rows.iter().map(campaign_from_row).collect()
}

// ---------------------------------------------------------------------------
// scheduled posts

fn scheduled_post_from_row(row: &SqliteRow) -> DbResult<ScheduledPost> {
    let status_str: String = row.try_get("status")?;
    let status = PostStatus::parse_status(&status_str)
        .ok_or_else(|| decode_err(format!("unknown post status {status_str}")))?;
    let files: String = row.try_get("files")?;
    Ok(ScheduledPost {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        scheduled_date: row.try_get("scheduled_date")?,
        status,
        text: row.try_get("text_content")?,
        files: from_json(&files)?,
        kind: row.try_get("kind")?,
        label: row.try_get("label")?,
        attempt: row.try_get("attempt")?,
        external_id: row.try_get("external_id")?,
        last_error: row.try_get("last_error")?,
    })
}

#[instrument(skip_all)]
pub async fn insert_scheduled_post(pool: &Pool, post: &NewScheduledPost) -> DbResult<i64> {
    let now = Utc::now();
    let rec = sqlx::query(
        "INSERT INTO scheduled_posts (user_id, scheduled_date, status, text_content, files, kind, label, created_at, updated_at) \
         VALUES (?, ?, 'pending', ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(post.user_id)
    .bind(post.scheduled_date)
    .bind(&post.text)
    .bind(to_json(&post.files)?)
    .bind(&post.kind)
    .bind(&post.label)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

pub async fn get_scheduled_post(pool: &Pool, post_id: i64) -> DbResult<Option<ScheduledPost>> {
    let row = sqlx::query("SELECT * FROM scheduled_posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(scheduled_post_from_row).transpose()
}

pub async fn list_scheduled_posts(pool: &Pool, user_id: i64) -> DbResult<Vec<ScheduledPost>> {
    let rows = sqlx::query(
        "SELECT * FROM scheduled_posts WHERE user_id = ? ORDER BY datetime(scheduled_date) ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(scheduled_post_from_row).collect()
}

/// Delete a post that has not been picked up yet.
#[instrument(skip_all)]
pub async fn delete_pending_scheduled_post(
    pool: &Pool,
    post_id: i64,
    user_id: i64,
) -> DbResult<bool> {
    let res = sqlx::query(
        "DELETE FROM scheduled_posts WHERE id = ? AND user_id = ? AND status = 'pending'",
    )
    .bind(post_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() == 1)
}

#[instrument(skip_all)]
pub async fn list_due_posts(pool: &Pool, now: DateTime<Utc>) -> DbResult<Vec<ScheduledPost>> {
    let rows = sqlx::query(
        "SELECT * FROM scheduled_posts WHERE status = 'pending' AND datetime(scheduled_date) <= datetime(?) \
         ORDER BY datetime(scheduled_date) ASC, id ASC",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;
    rows.iter().map(scheduled_post_from_row).collect()
}

/// Atomically move a post from `pending` to `publishing`. Only one caller can
/// win the claim for a given post.
#[instrument(skip_all)]
pub async fn claim_post(pool: &Pool, post_id: i64, now: DateTime<Utc>) -> DbResult<bool> {
    let res = sqlx::query(
        "UPDATE scheduled_posts SET status = 'publishing', claimed_at = ?, updated_at = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(now)
    .bind(post_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() == 1)
}

/// Record the external id of a published post. A claim that was handed back
/// after the lease still counts, so the post is not published again.
#[instrument(skip_all)]
pub async fn mark_post_posted_tx(
    tx: &mut Transaction<'_, Sqlite>,
    post_id: i64,
    external_id: &str,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let res = sqlx::query(
        "UPDATE scheduled_posts SET status = 'posted', external_id = ?, last_error = NULL, updated_at = ? \
         WHERE id = ? AND status != 'posted'",
    )
    .bind(external_id)
    .bind(now)
    .bind(post_id)
    .execute(&mut **tx)
    .await?;
    Ok(res.rows_affected() == 1)
}

/// Hand a claimed post back to the pending queue after a failed attempt.
#[instrument(skip_all)]
pub async fn release_post(
    pool: &Pool,
    post_id: i64,
    error: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE scheduled_posts SET status = 'pending', claimed_at = NULL, attempt = attempt + 1, last_error = ?, updated_at = ? \
         WHERE id = ? AND status = 'publishing'",
    )
    .bind(error)
    .bind(now)
    .bind(post_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Return claims older than `cutoff` to `pending`.
#[instrument(skip_all)]
pub async fn release_stale_claims(pool: &Pool, cutoff: DateTime<Utc>) -> DbResult<u64> {
    let res = sqlx::query(
        "UPDATE scheduled_posts SET status = 'pending', claimed_at = NULL \
         WHERE status = 'publishing' AND datetime(claimed_at) < datetime(?)",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

// ---------------------------------------------------------------------------
// invoices

fn invoice_from_row(row: &SqliteRow) -> DbResult<Invoice> {
    let status_str: String = row.try_get("status")?;
    let status = InvoiceStatus::parse_status(&status_str)
        .ok_or_else(|| decode_err(format!("unknown invoice status {status_str}")))?;
    let items: String = row.try_get("items")?;
    Ok(Invoice {
        id: row.try_get("id")?,
        invoice_number: row.try_get("invoice_number")?,
        brand_id: row.try_get("brand_id")?,
        creator_id: row.try_get("creator_id")?,
        campaign_id: row.try_get("campaign_id")?,
        items: from_json(&items)?,
        total_amount: row.try_get("total_amount")?,
        status,
        order_id: row.try_get("order_id")?,
        payment_ref: row.try_get("payment_ref")?,
        date_issued: row.try_get("date_issued")?,
        paid_at: row.try_get("paid_at")?,
    })
}

#[instrument(skip_all)]
pub async fn insert_invoice_tx(
    tx: &mut Transaction<'_, Sqlite>,
    invoice: &NewInvoice,
) -> DbResult<i64> {
    let rec = sqlx::query(
        "INSERT INTO invoices (invoice_number, brand_id, creator_id, campaign_id, items, total_amount, status, date_issued) \
         VALUES (?, ?, ?, ?, ?, ?, 'pending', ?) RETURNING id",
    )
    .bind(&invoice.invoice_number)
    .bind(invoice.brand_id)
    .bind(invoice.creator_id)
    .bind(invoice.campaign_id)
    .bind(to_json(&invoice.items)?)
    .bind(invoice.total_amount)
    .bind(invoice.date_issued)
    .fetch_one(&mut **tx)
    .await?;
    Ok(rec.get("id"))
}

pub async fn get_invoice(pool: &Pool, invoice_id: i64) -> DbResult<Option<Invoice>> {
    let row = sqlx::query("SELECT * FROM invoices WHERE id = ?")
        .bind(invoice_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(invoice_from_row).transpose()
}

pub async fn find_invoice_by_order(pool: &Pool, order_id: &str) -> DbResult<Option<Invoice>> {
    let row = sqlx::query("SELECT * FROM invoices WHERE order_id = ?")
        .bind(order_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(invoice_from_row).transpose()
}

pub async fn list_invoices_by_brand(pool: &Pool, brand_id: i64) -> DbResult<Vec<Invoice>> {
    let rows = sqlx::query("SELECT * FROM invoices WHERE brand_id = ? ORDER BY id")
        .bind(brand_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(invoice_from_row).collect()
}

#[instrument(skip_all)]
pub async fn set_invoice_order(pool: &Pool, invoice_id: i64, order_id: &str) -> DbResult<bool> {
    let res = sqlx::query("UPDATE invoices SET order_id = ? WHERE id = ? AND status != 'paid'")
        .bind(order_id)
        .bind(invoice_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() == 1)
}

#[instrument(skip_all)]
pub async fn mark_invoice_paid(
    pool: &Pool,
    invoice_id: i64,
    payment_ref: &str,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let res = sqlx::query(
        "UPDATE invoices SET status = 'paid', payment_ref = ?, paid_at = ? WHERE id = ? AND status != 'paid'",
    )
    .bind(payment_ref)
    .bind(now)
    .bind(invoice_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() == 1)
}

/// Flip pending invoices issued before `cutoff` to overdue.
#[instrument(skip_all)]
pub async fn mark_overdue_invoices(pool: &Pool, cutoff: DateTime<Utc>) -> DbResult<u64> {
    let res = sqlx::query(
        "UPDATE invoices SET status = 'overdue' WHERE status = 'pending' AND datetime(date_issued) < datetime(?)",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

// ---------------------------------------------------------------------------
// notifications

fn notification_from_row(row: &SqliteRow) -> DbResult<Notification> {
    Ok(Notification {
        id: row.try_get("id")?,
        sender_id: row.try_get("sender_id")?,
        receiver_id: row.try_get("receiver_id")?,
        message: row.try_get("message")?,
        link: row.try_get("link")?,
        is_read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Persist a notification produced by outbox task `source_outbox_id`.
/// Re-delivering the same task returns the row stored the first time.
#[instrument(skip_all)]
pub async fn insert_notification(
    pool: &Pool,
    sender_id: i64,
    receiver_id: i64,
    message: &str,
    link: Option<&str>,
    source_outbox_id: i64,
) -> DbResult<Notification> {
    sqlx::query(
        "INSERT INTO notifications (sender_id, receiver_id, message, link, is_read, source_outbox_id, created_at) \
         VALUES (?, ?, ?, ?, 0, ?, ?) ON CONFLICT(source_outbox_id) DO NOTHING",
    )
    .bind(sender_id)
    .bind(receiver_id)
    .bind(message)
    .bind(link)
    .bind(source_outbox_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    let row = sqlx::query("SELECT * FROM notifications WHERE source_outbox_id = ?")
        .bind(source_outbox_id)
        .fetch_one(pool)
        .await?;
    notification_from_row(&row)
}

pub async fn list_notifications(pool: &Pool, receiver_id: i64) -> DbResult<Vec<Notification>> {
    let rows = sqlx::query(
        "SELECT * FROM notifications WHERE receiver_id = ? ORDER BY id DESC",
    )
    .bind(receiver_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(notification_from_row).collect()
}

pub async fn unread_notification_count(pool: &Pool, receiver_id: i64) -> DbResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE receiver_id = ? AND is_read = 0")
        .bind(receiver_id)
        .fetch_one(pool)
        .await
}

#[instrument(skip_all)]
pub async fn mark_notification_read(
    pool: &Pool,
    notification_id: i64,
    receiver_id: i64,
) -> DbResult<bool> {
    let res = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND receiver_id = ?")
        .bind(notification_id)
        .bind(receiver_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() == 1)
}

// ---------------------------------------------------------------------------
// outbox

#[instrument(skip_all)]
pub async fn enqueue_outbox(
    pool: &Pool,
    effect: &SideEffect,
    due_at: DateTime<Utc>,
) -> DbResult<i64> {
    let mut tx = pool.begin().await?;
    let id = enqueue_outbox_tx(&mut tx, effect, due_at).await?;
    tx.commit().await?;
    Ok(id)
}

pub async fn enqueue_outbox_tx(
    tx: &mut Transaction<'_, Sqlite>,
    effect: &SideEffect,
    due_at: DateTime<Utc>,
) -> DbResult<i64> {
    let rec = sqlx::query(
        "INSERT INTO outbox (kind, payload, attempt, due_at) VALUES (?, ?, 0, ?) RETURNING id",
    )
    .bind(effect.kind().as_str())
    .bind(to_json(effect)?)
    .bind(due_at)
    .fetch_one(&mut **tx)
    .await?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn next_due_outbox(pool: &Pool, now: DateTime<Utc>) -> DbResult<Option<OutboxTask>> {
    let row = sqlx::query(
        "SELECT id, kind, payload, attempt, due_at FROM outbox \
         WHERE failed_at IS NULL AND datetime(due_at) <= datetime(?) \
         ORDER BY datetime(due_at) ASC, id ASC LIMIT 1",
    )
    .bind(now)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let kind: String = row.try_get("kind")?;
    if OutboxKind::parse_kind(&kind).is_none() {
        return Err(decode_err(format!("unknown outbox kind {kind}")));
    }
    let payload: String = row.try_get("payload")?;
    Ok(Some(OutboxTask {
        id: row.try_get("id")?,
        effect: from_json(&payload)?,
        attempt: row.try_get("attempt")?,
        due_at: row.try_get("due_at")?,
    }))
}

#[instrument(skip_all)]
pub async fn delete_outbox(pool: &Pool, id: i64) -> DbResult<()> {
    sqlx::query("DELETE FROM outbox WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Exponential backoff delay: 5s * 2^attempt, capped at `max_cap_secs`
/// (3600s when the cap is not positive).
pub fn backoff_delay_secs(attempt: i32, max_cap_secs: i64) -> i64 {
    let secs = 5_i64 * (1_i64 << attempt.clamp(0, 10));
    let cap = if max_cap_secs <= 0 { 3600 } else { max_cap_secs };
    secs.min(cap)
}

#[instrument(skip_all)]
pub async fn backoff_outbox_with_cap(
    pool: &Pool,
    id: i64,
    attempt: i32,
    max_cap_secs: i64,
    error: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let due_at = now + Duration::seconds(backoff_delay_secs(attempt, max_cap_secs));
    sqlx::query("UPDATE outbox SET attempt = ?, due_at = ?, last_error = ? WHERE id = ?")
        .bind(attempt + 1)
        .bind(due_at)
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Stop retrying a task; it stays in the table for inspection.
#[instrument(skip_all)]
pub async fn dead_letter_outbox(
    pool: &Pool,
    id: i64,
    attempt: i32,
    error: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE outbox SET attempt = ?, last_error = ?, failed_at = ? WHERE id = ?")
        .bind(attempt + 1)
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn count_remaining_outbox_tasks(pool: &Pool) -> DbResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE failed_at IS NULL")
        .fetch_one(pool)
        .await
}

pub async fn count_failed_outbox_tasks(pool: &Pool) -> DbResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE failed_at IS NOT NULL")
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParticipationStatus;

    async fn setup_pool() -> Pool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn draft() -> CampaignDraft {
        CampaignDraft {
            title: "Spring launch".into(),
            description: "New shoes".into(),
            tags: vec!["fashion".into()],
            budget: 5000,
            start_date: Utc::now(),
            end_date: Utc::now() + Duration::days(30),
            visible: true,
        }
    }

    #[test]
    fn prepare_sqlite_url_variants() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(prepare_sqlite_url("postgres://x"), "postgres://x");
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("db.sqlite");
        let url = prepare_sqlite_url(&format!("sqlite://{}", file.display()));
        assert_eq!(url, format!("sqlite://{}?mode=rwc", file.display()));
        assert!(file.parent().unwrap().exists());
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_delay_secs(0, 60), 5);
        assert_eq!(backoff_delay_secs(2, 60), 20);
        assert_eq!(backoff_delay_secs(5, 60), 60);
        assert_eq!(backoff_delay_secs(30, 0), 3600);
    }

    #[tokio::test]
    async fn save_participants_checks_version() {
        let pool = setup_pool().await;
        let brand = create_user(&pool, "Acme", "acme@example.com", UserKind::Brand)
            .await
            .unwrap();
        let cid = insert_campaign(&pool, brand, &draft()).await.unwrap();
        let campaign = load_campaign(&pool, cid).await.unwrap().unwrap();
        assert_eq!(campaign.version, 1);
        assert!(campaign.participants.is_empty());

        let participants = vec![Participant::new(9, ParticipationStatus::Pending, 200)];
        let mut tx = pool.begin().await.unwrap();
        assert!(save_participants_tx(&mut tx, cid, 1, &participants).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        assert!(!save_participants_tx(&mut tx, cid, 1, &participants).await.unwrap());
        tx.rollback().await.unwrap();

        let reloaded = load_campaign(&pool, cid).await.unwrap().unwrap();
        assert_eq!(reloaded.version, 2);
        assert_eq!(reloaded.participants, participants);

        let for_creator = list_campaigns_for_creator(&pool, 9).await.unwrap();
        assert_eq!(for_creator.len(), 1);
        assert!(list_campaigns_for_creator(&pool, 10).await.unwrap().is_empty());
    }

    #[test]
    fn json_columns_encode_or_fail_as_protocol_errors() {
        assert_eq!(to_json(&vec!["a", "b"]).unwrap(), r#"["a","b"]"#);
        let mut keyed = std::collections::HashMap::new();
        keyed.insert((1, 2), 3);
        assert!(matches!(to_json(&keyed), Err(sqlx::Error::Protocol(_))));
    }

    #[tokio::test]
    async fn visible_campaigns_filter_by_tag() {
        let pool = setup_pool().await;
        let brand = create_user(&pool, "Acme", "acme@example.com", UserKind::Brand)
            .await
            .unwrap();
        let fashion = insert_campaign(&pool, brand, &draft()).await.unwrap();
        let mut food = draft();
        food.tags = vec!["food".into(), "travel".into()];
        let food = insert_campaign(&pool, brand, &food).await.unwrap();
        let mut hidden = draft();
        hidden.visible = false;
        insert_campaign(&pool, brand, &hidden).await.unwrap();

        let all: Vec<i64> = list_visible_campaigns(&pool, None)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(all, vec![food, fashion]);

        let tagged = list_visible_campaigns(&pool, Some("travel")).await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, food);
        assert!(list_visible_campaigns(&pool, Some("cars")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn outbox_backoff_and_dead_letter() {
        let pool = setup_pool().await;
        let now = Utc::now();
        let id = enqueue_outbox(&pool, &SideEffect::notify(1, 2, "hello", None), now)
            .await
            .unwrap();
        let task = next_due_outbox(&pool, now).await.unwrap().unwrap();
        assert_eq!(task.id, id);
        assert_eq!(task.attempt, 0);

        backoff_outbox_with_cap(&pool, id, 0, 60, "boom", now).await.unwrap();
        assert!(next_due_outbox(&pool, now).await.unwrap().is_none());
        let later = now + Duration::seconds(6);
        let task = next_due_outbox(&pool, later).await.unwrap().unwrap();
        assert_eq!(task.attempt, 1);

        dead_letter_outbox(&pool, id, 1, "boom", later).await.unwrap();
        assert!(next_due_outbox(&pool, later + Duration::hours(1))
            .await
            .unwrap()
            .is_none());
        assert_eq!(count_remaining_outbox_tasks(&pool).await.unwrap(), 0);
        assert_eq!(count_failed_outbox_tasks(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn notifications_are_idempotent_per_outbox_task() {
        let pool = setup_pool().await;
        let first = insert_notification(&pool, 1, 2, "hi", Some("/x"), 42).await.unwrap();
        let second = insert_notification(&pool, 1, 2, "hi", Some("/x"), 42).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(unread_notification_count(&pool, 2).await.unwrap(), 1);
        assert!(mark_notification_read(&pool, first.id, 2).await.unwrap());
        assert!(!mark_notification_read(&pool, first.id, 3).await.unwrap());
        assert_eq!(unread_notification_count(&pool, 2).await.unwrap(), 0);
    }
}
