use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config;

type HmacSha256 = Hmac<Sha256>;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment order for `amount_minor` (smallest currency unit) and
    /// return the gateway's order id.
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str)
        -> Result<String>;
}

#[derive(Clone)]
pub struct RazorpayClient {
    http: Client,
    api_base: Url,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn from_config(cfg: &config::Payments) -> Result<Self> {
        Ok(Self {
            http: Client::builder()
                .user_agent("brandcast/0.1")
                .build()
                .context("failed to build http client")?,
            api_base: Url::parse(&cfg.api_base).context("invalid payments.api_base")?,
            key_id: cfg.key_id.clone(),
            key_secret: cfg.key_secret.clone(),
        })
    }

    pub fn build_order_request(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<reqwest::Request> {
        let endpoint = self
            .api_base
            .join("v1/orders")
            .context("invalid payments endpoint")?;
        self.http
            .post(endpoint)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount_minor,
                "currency": currency,
                "receipt": receipt,
            }))
            .build()
            .context("failed to build order request")
    }
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<String> {
        let request = self.build_order_request(amount_minor, currency, receipt)?;
        debug!(amount_minor, receipt, "creating payment order");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach payment gateway")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "payment gateway error: {}", body);
            return Err(anyhow!("payment gateway error {}: {}", status, body));
        }
        let order: OrderResponse = res.json().await.context("invalid order response")?;
        Ok(order.id)
    }
}

/// Hex HMAC-SHA256 of `"{order_id}|{payment_id}"`.
pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow!("invalid hmac key: {e}"))?;
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a gateway callback signature.
pub fn verify_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    mac.verify_slice(&expected).is_ok()
}
