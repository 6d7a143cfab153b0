#![allow(dead_code)]

use anyhow::{anyhow, Result};
use brandcast::db;
use brandcast::linkedin::{AccessToken, MediaKind, PublishingService, UploadTarget};
use brandcast::mailer::Mailer;
use brandcast::model::{LinkedAccount, UserKind};
use brandcast::payments::PaymentGateway;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub async fn setup_pool() -> sqlx::SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

pub async fn brand(pool: &sqlx::SqlitePool, name: &str) -> i64 {
    db::create_user(pool, name, &format!("{}@brand.test", name.to_lowercase()), UserKind::Brand)
        .await
        .unwrap()
}

pub async fn creator(pool: &sqlx::SqlitePool, name: &str) -> i64 {
    db::create_user(
        pool,
        name,
        &format!("{}@creator.test", name.to_lowercase()),
        UserKind::Creator,
    )
    .await
    .unwrap()
}

pub async fn link(pool: &sqlx::SqlitePool, user_id: i64) -> LinkedAccount {
    let account = LinkedAccount {
        member_id: format!("member-{user_id}"),
        access_token: format!("token-{user_id}"),
        expires_at: None,
    };
    assert!(db::link_linkedin_account(pool, user_id, &account).await.unwrap());
    account
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostCall {
    pub author: String,
    pub text: String,
    pub media: Vec<String>,
}

#[derive(Clone, Default)]
pub struct RecordingPublisher {
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
    posts: Arc<Mutex<Vec<PostCall>>>,
    uploads: Arc<Mutex<Vec<(String, usize)>>>,
    counter: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl RecordingPublisher {
    pub fn with_responses(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    /// Every `create_post` sleeps first, so concurrent callers interleave.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub async fn posts(&self) -> Vec<PostCall> {
        self.posts.lock().await.clone()
    }

    pub async fn uploads(&self) -> Vec<(String, usize)> {
        self.uploads.lock().await.clone()
    }

    async fn pop_response(&self) -> Result<String> {
        let next = self.responses.lock().await.pop_front();
        next.unwrap_or_else(|| {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("urn:li:share:{n}"))
        })
    }
}

#[async_trait::async_trait]
impl PublishingService for RecordingPublisher {
    async fn register_upload(
        &self,
        _access_token: &str,
        owner_urn: &str,
        media: MediaKind,
    ) -> Result<UploadTarget> {
        Ok(UploadTarget {
            upload_url: format!("https://upload.test/{owner_urn}"),
            asset: format!("urn:li:digitalmediaAsset:{}", media.share_category()),
        })
    }

    async fn put_media(
        &self,
        _access_token: &str,
        target: &UploadTarget,
        bytes: Vec<u8>,
        _media: MediaKind,
    ) -> Result<String> {
        self.uploads
            .lock()
            .await
            .push((target.upload_url.clone(), bytes.len()));
        Ok(target.asset.clone())
    }

    async fn create_post(
        &self,
        _access_token: &str,
        author_urn: &str,
        text: &str,
        media: &[String],
        _media_kind: MediaKind,
    ) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.posts.lock().await.push(PostCall {
            author: author_urn.to_string(),
            text: text.to_string(),
            media: media.to_vec(),
        });
        self.pop_response().await
    }

    async fn get_reactions(&self, _access_token: &str, post_id: &str) -> Result<Value> {
        Ok(json!({ "post": post_id, "likes": 3 }))
    }

    async fn exchange_code(&self, code: &str) -> Result<AccessToken> {
        if code == "bad" {
            return Err(anyhow!("invalid_grant"));
        }
        Ok(AccessToken {
            access_token: format!("access-{code}"),
            expires_at: None,
        })
    }

    async fn fetch_member_id(&self, access_token: &str) -> Result<String> {
        Ok(format!("sub-{access_token}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MailCall {
    pub to_email: String,
    pub to_name: String,
    pub template_id: i64,
    pub params: Value,
}

#[derive(Clone, Default)]
pub struct RecordingMailer {
    calls: Arc<Mutex<Vec<MailCall>>>,
    failures_left: Arc<AtomicUsize>,
}

impl RecordingMailer {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: Arc::new(AtomicUsize::new(times)),
            ..Default::default()
        }
    }

    pub async fn calls(&self) -> Vec<MailCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        template_id: i64,
        params: &Value,
    ) -> Result<()> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(anyhow!("mail service unavailable"));
        }
        self.calls.lock().await.push(MailCall {
            to_email: to_email.to_string(),
            to_name: to_name.to_string(),
            template_id,
            params: params.clone(),
        });
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingGateway {
    orders: Arc<Mutex<Vec<(i64, String, String)>>>,
}

impl RecordingGateway {
    pub async fn orders(&self) -> Vec<(i64, String, String)> {
        self.orders.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<String> {
        let mut orders = self.orders.lock().await;
        orders.push((amount_minor, currency.to_string(), receipt.to_string()));
        Ok(format!("order_{}", orders.len()))
    }
}
