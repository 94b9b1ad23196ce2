//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
///
/// Keys are flat so that a `settings.json` written for the earlier
/// deployment can be loaded unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listing page to poll
    pub sales_url: String,

    /// User-Agent header for HTTP requests
    pub user_agent: String,

    /// Prefix prepended to relative thread links in notifications
    pub base_url: String,

    /// Path to the persisted thread-id → post-count mapping
    #[serde(rename = "pickledb_file", alias = "state_file")]
    pub state_file: PathBuf,

    /// Sender address and SMTP login
    #[serde(default)]
    pub email_from: Option<String>,

    /// SMTP password for `email_from`
    #[serde(default)]
    pub email_pwd: Option<String>,

    /// Recipient of new-thread emails
    #[serde(default)]
    pub email_to: Option<String>,

    /// Optional file that receives a copy of every log line
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Default log filter when `RUST_LOG` is not set
    #[serde(default = "defaults::log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Lower bound of the delay between cycles
    #[serde(default = "defaults::min_delay")]
    pub min_delay_secs: u64,

    /// Upper bound of the delay between cycles
    #[serde(default = "defaults::max_delay")]
    pub max_delay_secs: u64,

    /// SMTP relay host (STARTTLS)
    #[serde(default = "defaults::smtp_host")]
    pub smtp_host: String,

    /// SMTP relay port
    #[serde(default = "defaults::smtp_port")]
    pub smtp_port: u16,
}

/// Where notifications go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyChannel {
    /// Log lines only
    LogOnly,
    /// Log lines, plus an email for every new thread
    LogAndEmail(EmailConfig),
}

/// SMTP credentials and recipient, present only when all keys are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub from: String,
    pub password: String,
    pub to: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl Config {
    /// Load configuration from a TOML file, or JSON when the extension is `.json`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read settings {}: {e}", path.display()))
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.sales_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::validation(format!(
                "sales_url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(AppError::validation("user_agent is empty"));
        }
        if self.state_file.as_os_str().is_empty() {
            return Err(AppError::validation("pickledb_file is empty"));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::validation("timeout_secs must be > 0"));
        }
        if self.min_delay_secs > self.max_delay_secs {
            return Err(AppError::validation(format!(
                "min_delay_secs ({}) exceeds max_delay_secs ({})",
                self.min_delay_secs, self.max_delay_secs
            )));
        }

        let email_keys = [&self.email_from, &self.email_pwd, &self.email_to];
        let present = email_keys.iter().filter(|k| k.is_some()).count();
        if present != 0 && present != email_keys.len() {
            return Err(AppError::validation(
                "email_from, email_pwd and email_to must be set together",
            ));
        }
        Ok(())
    }

    /// Notification channel implied by the email keys.
    pub fn channel(&self) -> NotifyChannel {
        match (&self.email_from, &self.email_pwd, &self.email_to) {
            (Some(from), Some(password), Some(to)) => NotifyChannel::LogAndEmail(EmailConfig {
                from: from.clone(),
                password: password.clone(),
                to: to.clone(),
                smtp_host: self.smtp_host.clone(),
                smtp_port: self.smtp_port,
            }),
            _ => NotifyChannel::LogOnly,
        }
    }
}

mod defaults {
    pub fn log_level() -> String {
        "info".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn min_delay() -> u64 {
        60
    }
    pub fn max_delay() -> u64 {
        600
    }
    pub fn smtp_host() -> String {
        "smtp.gmail.com".into()
    }
    pub fn smtp_port() -> u16 {
        587
    }
}
