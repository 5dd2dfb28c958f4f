//! Command-line and environment configuration

use clap::builder::BoolishValueParser;
use clap::Parser;
use mailsort_auth::microsoft;
use mailsort_core::{SortMode, SortOptions, DEFAULT_MODEL, DEFAULT_OLLAMA_HOST};
use std::time::Duration;
use thiserror::Error;

/// Crates whose log level `--log-level` controls
const LOG_TARGETS: &[&str] = &["mailsort", "mailsort_core", "mailsort_auth", "mailsort_graph"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MICROSOFT_CLIENT_ID is not set")]
    MissingClientId,
}

#[derive(Debug, Parser)]
#[command(
    name = "mailsort",
    version,
    about = "Sort an Outlook inbox into folders with a local language model"
)]
pub struct Cli {
    /// Application (client) ID of the Azure app registration
    #[arg(long, env = "MICROSOFT_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long, env = "MICROSOFT_TENANT_ID", default_value = microsoft::DEFAULT_TENANT)]
    pub tenant_id: String,

    #[arg(long, env = "MICROSOFT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    #[arg(long, env = "MICROSOFT_REDIRECT_URI", default_value = microsoft::DEFAULT_REDIRECT_URI)]
    pub redirect_uri: String,

    /// Maximum number of emails fetched per run
    #[arg(
        long,
        env = "EMAIL_LIMIT",
        default_value_t = mailsort_core::DEFAULT_EMAIL_LIMIT,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub email_limit: u32,

    /// Classify and log, but leave the mailbox untouched
    #[arg(long, env = "DRY_RUN", value_parser = BoolishValueParser::new())]
    pub dry_run: bool,

    /// Process every inbox email instead of only unread ones
    #[arg(long, env = "SORT_MODE", value_parser = BoolishValueParser::new())]
    pub sort_mode: bool,

    #[arg(
        long,
        env = "LOG_LEVEL",
        default_value = "info",
        ignore_case = true,
        value_parser = ["error", "warn", "warning", "info", "debug"]
    )]
    pub log_level: String,

    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_OLLAMA_HOST)]
    pub ollama_host: String,

    #[arg(long, env = "MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// How long to wait for the browser sign-in to complete
    #[arg(long, env = "AUTH_TIMEOUT_SECS", default_value_t = 120)]
    pub auth_timeout_secs: u64,
}

impl Cli {
    pub fn client_id(&self) -> Result<&str, ConfigError> {
        self.client_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingClientId)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn sort_options(&self) -> SortOptions {
        SortOptions {
            email_limit: self.email_limit,
            dry_run: self.dry_run,
            mode: if self.sort_mode {
                SortMode::AllInbox
            } else {
                SortMode::Unread
            },
        }
    }

    /// `EnvFilter` directives for the configured level
    pub fn log_filter(&self) -> String {
        let level = match self.log_level.to_ascii_lowercase().as_str() {
            "warning" => "warn".to_string(),
            other => other.to_string(),
        };
        std::iter::once("warn".to_string())
            .chain(LOG_TARGETS.iter().map(|t| format!("{}={}", t, level)))
            .collect::<Vec<_>>()
            .join(",")
    }
}
