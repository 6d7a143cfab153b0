use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to_email: &str, to_name: &str, template_id: i64, params: &Value)
        -> Result<()>;
}

/// Template-based transactional email over HTTP.
#[derive(Clone)]
pub struct HttpMailer {
    http: Client,
    url: Url,
    api_key: String,
}

impl HttpMailer {
    pub fn from_config(cfg: &config::Mailer) -> Result<Self> {
        Ok(Self {
            http: Client::builder()
                .user_agent("brandcast/0.1")
                .build()
                .context("failed to build http client")?,
            url: Url::parse(&cfg.url).context("invalid mailer.url")?,
            api_key: cfg.api_key.clone(),
        })
    }

    pub fn build_request(
        &self,
        to_email: &str,
        to_name: &str,
        template_id: i64,
        params: &Value,
    ) -> Result<reqwest::Request> {
        self.http
            .post(self.url.clone())
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .json(&build_mail_body(to_email, to_name, template_id, params))
            .build()
            .context("failed to build mail request")
    }
}

pub fn build_mail_body(to_email: &str, to_name: &str, template_id: i64, params: &Value) -> Value {
    json!({
        "to": [{ "email": to_email, "name": to_name }],
        "templateId": template_id,
        "params": params,
    })
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        template_id: i64,
        params: &Value,
    ) -> Result<()> {
        let request = self.build_request(to_email, to_name, template_id, params)?;
        debug!(template_id, "sending email");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach mail service")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "mail service error: {}", body);
            return Err(anyhow!("mail service error {}: {}", status, body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_api_key_and_body() {
        let mailer = HttpMailer::from_config(&config::Mailer {
            url: "https://mail.example.com/v3/smtp/email".into(),
            api_key: "k-123".into(),
            templates: Default::default(),
        })
        .unwrap();
        let request = mailer
            .build_request("c@example.com", "Cara", 12, &json!({ "campaign": "Spring" }))
            .unwrap();
        assert_eq!(
            request.headers().get("api-key").and_then(|h| h.to_str().ok()),
            Some("k-123")
        );
        let body: Value =
            serde_json::from_slice(request.body().and_then(|b| b.as_bytes()).unwrap()).unwrap();
        assert_eq!(body["to"][0]["email"], "c@example.com");
        assert_eq!(body["templateId"], 12);
        assert_eq!(body["params"]["campaign"], "Spring");
    }
}
