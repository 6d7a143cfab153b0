use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config;
use crate::model::LinkedAccount;

const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";
const EMBED_URL_PREFIX: &str = "https://www.linkedin.com/embed/feed/update/";

/// Kind of media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Document,
}

impl MediaKind {
    pub fn recipe(&self) -> &'static str {
        match self {
            MediaKind::Image => "urn:li:digitalmediaRecipe:feedshare-image",
            MediaKind::Video => "urn:li:digitalmediaRecipe:feedshare-video",
            MediaKind::Document => "urn:li:digitalmediaRecipe:feedshare-document",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
            MediaKind::Document => "application/pdf",
        }
    }

    pub fn share_category(&self) -> &'static str {
        match self {
            MediaKind::Image => "IMAGE",
            MediaKind::Video => "VIDEO",
            MediaKind::Document => "DOCUMENT",
        }
    }

    /// Guess the media kind from a file extension. Unknown extensions are
    /// treated as images.
    pub fn for_file(file: &str) -> Self {
        match Path::new(file)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_ascii_lowercase())
        {
            Some(ext) if ext == "mp4" || ext == "mov" || ext == "avi" => MediaKind::Video,
            Some(ext) if ext == "pdf" => MediaKind::Document,
            _ => MediaKind::Image,
        }
    }
}

/// Where to PUT the bytes of a registered upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub upload_url: String,
    pub asset: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A post as published on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PublishingService: Send + Sync {
    async fn register_upload(
        &self,
        access_token: &str,
        owner_urn: &str,
        media: MediaKind,
    ) -> Result<UploadTarget>;

    /// Upload the bytes and return the asset URN to reference in a post.
    async fn put_media(
        &self,
        access_token: &str,
        target: &UploadTarget,
        bytes: Vec<u8>,
        media: MediaKind,
    ) -> Result<String>;

    /// Create a public post and return its id.
    async fn create_post(
        &self,
        access_token: &str,
        author_urn: &str,
        text: &str,
        media: &[String],
        media_kind: MediaKind,
    ) -> Result<String>;

    async fn get_reactions(&self, access_token: &str, post_id: &str) -> Result<Value>;

    /// Exchange an OAuth authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<AccessToken>;

    async fn fetch_member_id(&self, access_token: &str) -> Result<String>;
}

pub fn canonical_post_url(post_id: &str) -> String {
    format!("{EMBED_URL_PREFIX}{post_id}")
}

/// Resolve a stored file reference against the upload directory. References
/// may carry a leading `/uploads/` prefix. `None` when the reference is empty
/// or would leave the upload directory.
pub fn resolve_media_path(media_root: &Path, file: &str) -> Option<PathBuf> {
    let trimmed = file
        .strip_prefix("/uploads/")
        .unwrap_or(file)
        .trim_start_matches('/');
    let relative = Path::new(trimmed);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    let names_file = relative
        .components()
        .any(|c| matches!(c, Component::Normal(_)));
    (contained && names_file).then(|| media_root.join(relative))
}

/// Upload every file (skipping the ones that fail) and create the post.
/// Fails if files were given but none could be uploaded.
pub async fn publish(
    svc: &dyn PublishingService,
    media_root: &Path,
    account: &LinkedAccount,
    text: &str,
    files: &[String],
) -> Result<PublishedPost> {
    let owner = account.author_urn();
    let mut assets = Vec::with_capacity(files.len());
    let mut kind = MediaKind::Image;
    for file in files {
        let media = MediaKind::for_file(file);
        let Some(path) = resolve_media_path(media_root, file) else {
            warn!(file = %file, "media reference outside the upload directory; skipping");
            continue;
        };
        let bytes = match fs::read(&path).await {
            Ok(b) => b,
            Err(err) => {
                warn!(?err, path = %path.display(), "failed to read media file; skipping");
                continue;
            }
        };
        let uploaded = match svc
            .register_upload(&account.access_token, &owner, media)
            .await
        {
            Ok(target) => {
                svc.put_media(&account.access_token, &target, bytes, media)
                    .await
            }
            Err(err) => Err(err),
        };
        match uploaded {
            Ok(asset) => {
                kind = media;
                assets.push(asset);
            }
            Err(err) => warn!(?err, file = %file, "media upload failed; skipping"),
        }
    }
    if !files.is_empty() && assets.is_empty() {
        return Err(anyhow!("Failed to upload media files"));
    }

    let id = svc
        .create_post(&account.access_token, &owner, text, &assets, kind)
        .await?;
    info!(post_id = %id, media = assets.len(), "post published");
    Ok(PublishedPost {
        url: canonical_post_url(&id),
        id,
    })
}

#[derive(Clone)]
pub struct LinkedInClient {
    http: Client,
    api_base: Url,
    oauth_base: Url,
    version: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl fmt::Debug for LinkedInClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedInClient")
            .field("api_base", &self.api_base)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl LinkedInClient {
    pub fn from_config(cfg: &config::LinkedIn) -> Result<Self> {
        let http = Client::builder()
            .user_agent("brandcast/0.1")
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            api_base: Url::parse(&cfg.api_base).context("invalid linkedin.api_base")?,
            oauth_base: Url::parse(&cfg.oauth_base).context("invalid linkedin.oauth_base")?,
            version: cfg.version.clone(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            redirect_uri: cfg.redirect_uri.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_base
            .join(path)
            .with_context(|| format!("invalid LinkedIn endpoint {path}"))
    }

    fn authed(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        builder
            .bearer_auth(access_token)
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
            .header("LinkedIn-Version", &self.version)
    }

    /// Build the `POST v2/ugcPosts` request without sending it.
    pub fn build_post_request(&self, access_token: &str, body: &Value) -> Result<reqwest::Request> {
        let endpoint = self.endpoint("v2/ugcPosts")?;
        self.authed(self.http.post(endpoint), access_token)
            .header("Content-Type", "application/json")
            .json(body)
            .build()
            .context("failed to build LinkedIn request")
    }

    async fn send(&self, request: reqwest::Request) -> Result<Response> {
        debug!(url = %request.url(), method = %request.method(), "sending linkedin request");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach LinkedIn")?;
        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!("rate limited by LinkedIn: {}", body);
            return Err(anyhow!("received 429 from LinkedIn: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "LinkedIn API error: {}", body);
            return Err(anyhow!("linkedin error {}: {}", status, body));
        }
        Ok(res)
    }
}

#[async_trait]
impl PublishingService for LinkedInClient {
    async fn register_upload(
        &self,
        access_token: &str,
        owner_urn: &str,
        media: MediaKind,
    ) -> Result<UploadTarget> {
        let endpoint = self.endpoint("v2/assets?action=registerUpload")?;
        let body = build_register_upload_request(owner_urn, media);
        let request = self
            .authed(self.http.post(endpoint), access_token)
            .json(&body)
            .build()
            .context("failed to build register upload request")?;
        let res = self.send(request).await?;
        let payload: RegisterUploadResponse = res
            .json()
            .await
            .context("invalid register upload response")?;
        Ok(UploadTarget {
            upload_url: payload
                .value
                .upload_mechanism
                .http_request
                .upload_url,
            asset: payload.value.asset,
        })
    }

    async fn put_media(
        &self,
        access_token: &str,
        target: &UploadTarget,
        bytes: Vec<u8>,
        media: MediaKind,
    ) -> Result<String> {
        let request = self
            .http
            .put(&target.upload_url)
            .bearer_auth(access_token)
            .header("Content-Type", media.content_type())
            .body(bytes)
            .build()
            .context("failed to build media upload request")?;
        self.send(request).await?;
        Ok(target.asset.clone())
    }

    async fn create_post(
        &self,
        access_token: &str,
        author_urn: &str,
        text: &str,
        media: &[String],
        media_kind: MediaKind,
    ) -> Result<String> {
        let body = build_share_request(author_urn, text, media, media_kind);
        let request = self.build_post_request(access_token, &body)?;
        let res = self.send(request).await?;
        let header_id = res
            .headers()
            .get("x-restli-id")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let payload: Value = res.json().await.unwrap_or(Value::Null);
        payload
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(header_id)
            .ok_or_else(|| anyhow!("LinkedIn response did not include a post id"))
    }

    async fn get_reactions(&self, access_token: &str, post_id: &str) -> Result<Value> {
        let endpoint = self.endpoint(&format!("rest/reactions/{post_id}"))?;
        let request = self
            .authed(self.http.get(endpoint), access_token)
            .build()
            .context("failed to build reactions request")?;
        let res = self.send(request).await?;
        res.json().await.context("invalid reactions response")
    }

    async fn exchange_code(&self, code: &str) -> Result<AccessToken> {
        let endpoint = self
            .oauth_base
            .join("oauth/v2/accessToken")
            .context("invalid LinkedIn OAuth endpoint")?;
        let request = self
            .http
            .post(endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .build()
            .context("failed to build token request")?;
        let res = self.send(request).await?;
        let payload: TokenResponse = res.json().await.context("invalid token response")?;
        Ok(AccessToken {
            access_token: payload.access_token,
            expires_at: payload
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }

    async fn fetch_member_id(&self, access_token: &str) -> Result<String> {
        let endpoint = self.endpoint("v2/userinfo")?;
        let request = self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .build()
            .context("failed to build userinfo request")?;
        let res = self.send(request).await?;
        let payload: UserInfoResponse = res.json().await.context("invalid userinfo response")?;
        Ok(payload.sub)
    }
}

pub fn build_register_upload_request(owner_urn: &str, media: MediaKind) -> Value {
    json!({
        "registerUploadRequest": {
            "recipes": [media.recipe()],
            "owner": owner_urn,
            "serviceRelationships": [
                {
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent",
                }
            ],
        }
    })
}

pub fn build_share_request(
    author_urn: &str,
    text: &str,
    media: &[String],
    media_kind: MediaKind,
) -> Value {
    let media_json: Vec<Value> = media
        .iter()
        .map(|asset| json!({ "status": "READY", "media": asset }))
        .collect();
    let category = if media_json.is_empty() {
        "NONE"
    } else {
        media_kind.share_category()
    };
    json!({
        "author": author_urn,
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": {
                "shareCommentary": { "text": text },
                "shareMediaCategory": category,
                "media": media_json,
            }
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC",
        },
    })
}

#[derive(Deserialize)]
struct RegisterUploadResponse {
    value: RegisterUploadValue,
}

#[derive(Deserialize)]
struct RegisterUploadValue {
    #[serde(rename = "uploadMechanism")]
    upload_mechanism: UploadMechanism,
    asset: String,
}

#[derive(Deserialize)]
struct UploadMechanism {
    #[serde(rename = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest")]
    http_request: MediaUploadHttpRequest,
}

#[derive(Deserialize)]
struct MediaUploadHttpRequest {
    #[serde(rename = "uploadUrl")]
    upload_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    sub: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> config::LinkedIn {
        config::LinkedIn {
            api_base: "https://api.linkedin.com/".into(),
            oauth_base: "https://www.linkedin.com/".into(),
            version: "202503".into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost/cb".into(),
        }
    }

    #[test]
    fn share_request_without_media() {
        let body = build_share_request("urn:li:person:abc", "hello", &[], MediaKind::Image);
        assert_eq!(body["author"], "urn:li:person:abc");
        let share = &body["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(share["shareCommentary"]["text"], "hello");
        assert_eq!(share["shareMediaCategory"], "NONE");
        assert_eq!(share["media"].as_array().unwrap().len(), 0);
        assert_eq!(
            body["visibility"]["com.linkedin.ugc.MemberNetworkVisibility"],
            "PUBLIC"
        );
    }

    #[test]
    fn share_request_with_media() {
        let assets = vec!["urn:li:digitalmediaAsset:1".to_string()];
        let body = build_share_request("urn:li:person:abc", "hi", &assets, MediaKind::Video);
        let share = &body["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(share["shareMediaCategory"], "VIDEO");
        assert_eq!(share["media"][0]["status"], "READY");
        assert_eq!(share["media"][0]["media"], "urn:li:digitalmediaAsset:1");
    }

    #[test]
    fn register_upload_uses_recipe_for_kind() {
        let body = build_register_upload_request("urn:li:person:abc", MediaKind::Document);
        assert_eq!(
            body["registerUploadRequest"]["recipes"][0],
            "urn:li:digitalmediaRecipe:feedshare-document"
        );
        assert_eq!(body["registerUploadRequest"]["owner"], "urn:li:person:abc");
    }

    #[test]
    fn media_kind_from_extension() {
        assert_eq!(MediaKind::for_file("a.MP4"), MediaKind::Video);
        assert_eq!(MediaKind::for_file("deck.pdf"), MediaKind::Document);
        assert_eq!(MediaKind::for_file("photo.jpeg"), MediaKind::Image);
        assert_eq!(MediaKind::for_file("noext"), MediaKind::Image);
    }

    #[test]
    fn media_paths_strip_upload_prefix() {
        let root = Path::new("/srv/uploads");
        assert_eq!(
            resolve_media_path(root, "/uploads/a.jpg"),
            Some(PathBuf::from("/srv/uploads/a.jpg"))
        );
        assert_eq!(
            resolve_media_path(root, "b.jpg"),
            Some(PathBuf::from("/srv/uploads/b.jpg"))
        );
        assert_eq!(
            resolve_media_path(root, "/etc/hosts"),
            Some(PathBuf::from("/srv/uploads/etc/hosts"))
        );
    }

    #[test]
    fn media_paths_cannot_escape_upload_dir() {
        let root = Path::new("/srv/uploads");
        assert_eq!(resolve_media_path(root, "../../etc/passwd"), None);
        assert_eq!(resolve_media_path(root, "/uploads/../secrets.env"), None);
        assert_eq!(resolve_media_path(root, "a/../../b.jpg"), None);
        assert_eq!(resolve_media_path(root, ""), None);
        assert_eq!(resolve_media_path(root, "/uploads/"), None);
    }

    #[test]
    fn canonical_url() {
        assert_eq!(
            canonical_post_url("urn:li:share:42"),
            "https://www.linkedin.com/embed/feed/update/urn:li:share:42"
        );
    }

    #[test]
    fn build_post_request_sets_headers() {
        let client = LinkedInClient::from_config(&sample_config()).unwrap();
        let request = client
            .build_post_request("token", &json!({ "sample": true }))
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/v2/ugcPosts");
        let headers = request.headers();
        assert_eq!(
            headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer token"
        );
        assert_eq!(
            headers
                .get("X-Restli-Protocol-Version")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "2.0.0"
        );
        assert_eq!(
            headers
                .get("LinkedIn-Version")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "202503"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut cfg = sample_config();
        cfg.api_base = "not a url".into();
        assert!(LinkedInClient::from_config(&cfg).is_err());
    }
}
