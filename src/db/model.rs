//! Insert and view models used by repositories.
//!
//! Keep these structs focused on the data written or returned by queries.
//! Business logic should live in higher layers.

use crate::model::InvoiceItem;
use chrono::{DateTime, Utc};

/// Invoice fields known before the row exists.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub brand_id: i64,
    pub creator_id: i64,
    pub campaign_id: i64,
    pub items: Vec<InvoiceItem>,
    pub total_amount: i64,
    pub date_issued: DateTime<Utc>,
}

/// A post the caller wants published at `scheduled_date`.
#[derive(Debug, Clone)]
pub struct NewScheduledPost {
    pub user_id: i64,
    pub scheduled_date: DateTime<Utc>,
    pub text: Option<String>,
    pub files: Vec<String>,
    pub kind: String,
    pub label: Option<String>,
}
