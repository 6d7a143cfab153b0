//! Invoice generation on accepted work and the payment confirmation flow.
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::{self, NewInvoice, Pool};
use crate::error::{LifecycleError, LifecycleResult};
use crate::model::{Campaign, ContentItem, Invoice, InvoiceItem, InvoiceStatus, Participant};
use crate::payments::{self, PaymentGateway};

/// Human readable invoice number, `INV-YYYYMMDD-XXXXXXXX`.
pub fn invoice_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("INV-{}-{}", now.format("%Y%m%d"), &suffix[..8])
}

/// Billing record for one accepted content item at the participant's
/// current amount.
pub fn build_invoice(
    campaign: &Campaign,
    participant: &Participant,
    content: &ContentItem,
    now: DateTime<Utc>,
) -> NewInvoice {
    let item = InvoiceItem {
        description: format!("{} - {}", campaign.title, content.kind),
        quantity: 1,
        price: participant.amount,
        total: participant.amount,
        files: content.files.clone(),
        content: (!content.text.is_empty()).then(|| content.text.clone()),
    };
    NewInvoice {
        invoice_number: invoice_number(now),
        brand_id: campaign.brand_id,
        creator_id: participant.creator_id,
        campaign_id: campaign.id,
        total_amount: item.total,
        items: vec![item],
        date_issued: now,
    }
}

/// Open a gateway order for an unpaid invoice. An invoice that already has an
/// order keeps it.
#[instrument(skip(pool, gateway))]
pub async fn create_payment_order(
    pool: &Pool,
    gateway: &dyn PaymentGateway,
    invoice_id: i64,
    currency: &str,
) -> LifecycleResult<Invoice> {
    let invoice = db::get_invoice(pool, invoice_id)
        .await?
        .ok_or(LifecycleError::NotFound("Invoice"))?;
    if invoice.status == InvoiceStatus::Paid {
        return Err(LifecycleError::precondition("Invoice is already paid"));
    }
    if invoice.order_id.is_some() {
        return Ok(invoice);
    }

    let amount_minor = invoice
        .total_amount
        .checked_mul(100)
        .ok_or_else(|| LifecycleError::validation("Invoice amount is too large"))?;
    let order_id = gateway
        .create_order(amount_minor, currency, &invoice.invoice_number)
        .await
        .map_err(LifecycleError::Integration)?;
    if !db::set_invoice_order(pool, invoice_id, &order_id).await? {
        warn!(invoice_id, "invoice changed while creating order");
    }
    info!(invoice_id, %order_id, "payment order created");
    db::get_invoice(pool, invoice_id)
        .await?
        .ok_or(LifecycleError::NotFound("Invoice"))
}

/// Handle a gateway callback: check the signature, then flip the invoice to
/// paid. Confirming an already paid invoice returns it unchanged.
#[instrument(skip(pool, secret, signature))]
pub async fn confirm_payment(
    pool: &Pool,
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> LifecycleResult<Invoice> {
    if !payments::verify_signature(secret, order_id, payment_id, signature) {
        warn!(order_id, "payment signature mismatch");
        return Err(LifecycleError::InvalidSignature);
    }
    let invoice = db::find_invoice_by_order(pool, order_id)
        .await?
        .ok_or(LifecycleError::NotFound("Invoice"))?;
    if invoice.status == InvoiceStatus::Paid {
        return Ok(invoice);
    }
    if db::mark_invoice_paid(pool, invoice.id, payment_id, Utc::now()).await? {
        info!(invoice_id = invoice.id, payment_id, "invoice paid");
    }
    db::get_invoice(pool, invoice.id)
        .await?
        .ok_or(LifecycleError::NotFound("Invoice"))
}

/// Mark invoices still pending `days` after issue as overdue.
pub async fn mark_overdue(pool: &Pool, now: DateTime<Utc>, days: i64) -> db::DbResult<u64> {
    let flipped = db::mark_overdue_invoices(pool, now - Duration::days(days)).await?;
    if flipped > 0 {
        info!(flipped, "invoices marked overdue");
    }
    Ok(flipped)
}
