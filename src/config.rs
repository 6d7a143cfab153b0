//! Configuration loader and validator for the campaign lifecycle service.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub scheduler: Scheduler,
    pub linkedin: LinkedIn,
    pub payments: Payments,
    pub mailer: Mailer,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Directory holding uploaded media referenced by content items.
    pub upload_dir: String,
    pub poll_interval_ms: u64,
    pub max_backoff_seconds: u64,
    pub max_outbox_attempts: i32,
}

/// Scheduled publication loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scheduler {
    pub sweep_interval_seconds: u64,
    pub claim_lease_seconds: i64,
    pub invoice_overdue_days: i64,
}

/// External publishing platform settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedIn {
    pub api_base: String,
    pub oauth_base: String,
    pub version: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Payment gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payments {
    pub api_base: String,
    pub key_id: String,
    pub key_secret: String,
    pub currency: String,
}

/// Transactional email settings. Template ids are keyed by event name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mailer {
    pub url: String,
    pub api_key: String,
    #[serde(default)]
    pub templates: BTreeMap<String, i64>,
}

impl Mailer {
    pub fn template(&self, name: &str) -> Option<i64> {
        self.templates.get(name).copied()
    }
}

impl App {
    /// Expand a leading `~/` in `data_dir`.
    pub fn resolved_data_dir(&self) -> String {
        expand_home(&self.data_dir)
    }

    pub fn resolved_upload_dir(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.upload_dir))
    }
}

fn expand_home(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => match std::env::var("HOME") {
            Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
            Err(_) => path.to_string(),
        },
        None => path.to_string(),
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` and
    /// `app.upload_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if !self.app.data_dir.trim().is_empty() {
            fs::create_dir_all(self.app.resolved_data_dir())?;
        }
        if !self.app.upload_dir.trim().is_empty() {
            fs::create_dir_all(self.app.resolved_upload_dir())?;
        }
        Ok(())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.upload_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.upload_dir must be non-empty"));
    }
    if cfg.app.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("app.poll_interval_ms must be > 0"));
    }
    if cfg.app.max_outbox_attempts <= 0 {
        return Err(ConfigError::Invalid("app.max_outbox_attempts must be > 0"));
    }

    if cfg.scheduler.sweep_interval_seconds == 0 {
        return Err(ConfigError::Invalid(
            "scheduler.sweep_interval_seconds must be > 0",
        ));
    }
    if cfg.scheduler.claim_lease_seconds <= 0 {
        return Err(ConfigError::Invalid(
            "scheduler.claim_lease_seconds must be > 0",
        ));
    }
    if cfg.scheduler.invoice_overdue_days <= 0 {
        return Err(ConfigError::Invalid(
            "scheduler.invoice_overdue_days must be > 0",
        ));
    }

    let li = &cfg.linkedin;
    if li.api_base.trim().is_empty() || li.oauth_base.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "linkedin.api_base and linkedin.oauth_base must be non-empty",
        ));
    }
    if li.version.trim().is_empty() {
        return Err(ConfigError::Invalid("linkedin.version must be non-empty"));
    }
    if li.client_id.trim().is_empty() || li.client_secret.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "linkedin.client_id and linkedin.client_secret must be non-empty",
        ));
    }

    if cfg.payments.key_secret.trim().is_empty() {
        return Err(ConfigError::Invalid("payments.key_secret must be non-empty"));
    }
    if cfg.payments.currency.trim().len() != 3 {
        return Err(ConfigError::Invalid(
            "payments.currency must be a 3-letter code",
        ));
    }

    if cfg.mailer.url.trim().is_empty() {
        return Err(ConfigError::Invalid("mailer.url must be non-empty"));
    }

    Ok(())
}

/// Returns the canonical example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  upload_dir: "./data/uploads"
  poll_interval_ms: 500
  max_backoff_seconds: 300
  max_outbox_attempts: 8

scheduler:
  sweep_interval_seconds: 60
  claim_lease_seconds: 600
  invoice_overdue_days: 30

linkedin:
  api_base: "https://api.linkedin.com/"
  oauth_base: "https://www.linkedin.com/"
  version: "202503"
  client_id: "YOUR_LINKEDIN_CLIENT_ID"
  client_secret: "YOUR_LINKEDIN_CLIENT_SECRET"
  redirect_uri: "http://localhost:3000/auth/linkedin/access_token_callback"

payments:
  api_base: "https://api.razorpay.com/"
  key_id: "rzp_test_key"
  key_secret: "YOUR_PAYMENT_KEY_SECRET"
  currency: "INR"

mailer:
  url: "https://api.brevo.com/v3/smtp/email"
  api_key: "YOUR_MAILER_API_KEY"
  templates:
    work_accepted: 12
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.mailer.template("work_accepted"), Some(12));
        assert_eq!(cfg.mailer.template("missing"), None);
    }

    #[test]
    fn invalid_payment_secret() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.payments.key_secret = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("payments.key_secret")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_scheduler_values() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.scheduler.sweep_interval_seconds = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("sweep_interval_seconds")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.scheduler.claim_lease_seconds = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.scheduler.invoice_overdue_days = -1;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_app_and_integrations() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.poll_interval_ms = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.max_outbox_attempts = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.linkedin.client_secret = " ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.payments.currency = "RUPEE".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.mailer.url = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_data_and_upload_dirs() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let upload_path = td.path().join("data").join("uploads");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.app.upload_dir = upload_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
        assert!(upload_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.payments.currency, "INR");
        assert_eq!(cfg.linkedin.version, "202503");
    }
}
