//! Bot configuration, loaded from environment variables (after `.env` via dotenvy).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};
use escrow_telegram::TelegramConfig;
use storage::StoreOptions;

use crate::backoff::BackoffPolicy;

#[cfg(test)]
mod tests;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://escrow_bot.db?mode=rwc";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_LOG_FILE: &str = "logs/escrow-bot.log";

#[derive(Debug, Clone)]
pub struct BotConfig {
    /// TELEGRAM_API_KEY or BOT_TOKEN
    pub bot_token: String,
    /// PostgreSQL (`postgres://`) or SQLite (`sqlite://`) URL
    pub database_url: String,
    /// TELEGRAM_API_URL or TELOXIDE_API_URL
    pub telegram_api_url: String,
    pub log_file: String,
    /// Liveness port; no listener when unset
    pub port: Option<u16>,
    pub poll_timeout_secs: u64,
    /// Per-request HTTP budget, added on top of the long-poll timeout
    pub http_timeout_secs: u64,
    pub db_timeout_secs: u64,
    pub db_max_connections: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_secs: u64,
}

impl BotConfig {
    /// Load from environment variables. `token` overrides TELEGRAM_API_KEY if provided.
    pub fn load(token: Option<String>) -> Result<Self> {
        let bot_token = token
            .or_else(|| env::var("TELEGRAM_API_KEY").ok())
            .or_else(|| env::var("BOT_TOKEN").ok())
            .filter(|t| !t.trim().is_empty());
        let Some(bot_token) = bot_token else {
            bail!("TELEGRAM_API_KEY (or BOT_TOKEN) not set");
        };
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let telegram_api_url = env::var("TELEGRAM_API_URL")
            .or_else(|_| env::var("TELOXIDE_API_URL"))
            .unwrap_or_else(|_| DEFAULT_TELEGRAM_API_URL.to_string());
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
        let port = match env::var("PORT") {
            Ok(value) if !value.trim().is_empty() => Some(parse_var("PORT", &value)?),
            _ => None,
        };

        Ok(Self {
            bot_token,
            database_url,
            telegram_api_url,
            log_file,
            port,
            poll_timeout_secs: env_or("POLL_TIMEOUT_SECS", 30)?,
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", 10)?,
            db_timeout_secs: env_or("DB_TIMEOUT_SECS", 10)?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 5)?,
            backoff_initial_ms: env_or("BACKOFF_INITIAL_MS", 500)?,
            backoff_max_secs: env_or("BACKOFF_MAX_SECS", 60)?,
        })
    }

    /// Rejects values that would make the service misbehave instead of failing fast.
    pub fn validate(&self) -> Result<()> {
        if reqwest::Url::parse(&self.telegram_api_url).is_err() {
            bail!(
                "TELEGRAM_API_URL (or TELOXIDE_API_URL) is set but not a valid URL: {}",
                self.telegram_api_url
            );
        }
        for (name, value) in [
            ("POLL_TIMEOUT_SECS", self.poll_timeout_secs),
            ("HTTP_TIMEOUT_SECS", self.http_timeout_secs),
            ("DB_TIMEOUT_SECS", self.db_timeout_secs),
            ("BACKOFF_INITIAL_MS", self.backoff_initial_ms),
            ("BACKOFF_MAX_SECS", self.backoff_max_secs),
        ] {
            if value == 0 {
                bail!("{} must be greater than zero", name);
            }
        }
        if self.db_max_connections == 0 {
            bail!("DB_MAX_CONNECTIONS must be greater than zero");
        }
        if Duration::from_millis(self.backoff_initial_ms) > Duration::from_secs(self.backoff_max_secs) {
            bail!(
                "BACKOFF_INITIAL_MS ({}) exceeds BACKOFF_MAX_SECS ({})",
                self.backoff_initial_ms,
                self.backoff_max_secs
            );
        }
        Ok(())
    }

    pub fn telegram_config(&self) -> TelegramConfig {
        TelegramConfig::with_token(self.bot_token.clone())
            .with_api_url(self.telegram_api_url.clone())
            .with_poll_timeout(Duration::from_secs(self.poll_timeout_secs))
            .with_http_timeout(Duration::from_secs(self.http_timeout_secs))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_connections: self.db_max_connections,
            acquire_timeout: Duration::from_secs(self.db_timeout_secs),
            op_timeout: Duration::from_secs(self.db_timeout_secs),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_secs(self.backoff_max_secs),
        )
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => parse_var(name, &value),
        _ => Ok(default),
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    match value.trim().parse() {
        Ok(parsed) => Ok(parsed),
        Err(_) => bail!("{} is not a valid number: {}", name, value),
    }
}
