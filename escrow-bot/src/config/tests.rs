//! Config tests.

use super::*;
use serial_test::serial;
use std::env;

const VARS: &[&str] = &[
    "TELEGRAM_API_KEY",
    "BOT_TOKEN",
    "DATABASE_URL",
    "TELEGRAM_API_URL",
    "TELOXIDE_API_URL",
    "LOG_FILE",
    "PORT",
    "POLL_TIMEOUT_SECS",
    "HTTP_TIMEOUT_SECS",
    "DB_TIMEOUT_SECS",
    "DB_MAX_CONNECTIONS",
    "BACKOFF_INITIAL_MS",
    "BACKOFF_MAX_SECS",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_load_config_with_defaults() {
    clear_env();
    env::set_var("TELEGRAM_API_KEY", "test_token");

    let config = BotConfig::load(None).unwrap();

    assert_eq!(config.bot_token, "test_token");
    assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    assert_eq!(config.telegram_api_url, DEFAULT_TELEGRAM_API_URL);
    assert_eq!(config.log_file, "logs/escrow-bot.log");
    assert_eq!(config.port, None);
    assert_eq!(config.poll_timeout_secs, 30);
    assert_eq!(config.http_timeout_secs, 10);
    assert_eq!(config.db_timeout_secs, 10);
    assert_eq!(config.db_max_connections, 5);
    assert_eq!(config.backoff_initial_ms, 500);
    assert_eq!(config.backoff_max_secs, 60);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_load_config_with_custom_values() {
    clear_env();
    env::set_var("BOT_TOKEN", "fallback_token");
    env::set_var("DATABASE_URL", "postgres://bot:pw@localhost/escrow");
    env::set_var("TELOXIDE_API_URL", "http://127.0.0.1:8081");
    env::set_var("PORT", "8080");
    env::set_var("POLL_TIMEOUT_SECS", "25");
    env::set_var("DB_MAX_CONNECTIONS", "12");

    let config = BotConfig::load(None).unwrap();

    assert_eq!(config.bot_token, "fallback_token");
    assert_eq!(config.database_url, "postgres://bot:pw@localhost/escrow");
    assert_eq!(config.telegram_api_url, "http://127.0.0.1:8081");
    assert_eq!(config.port, Some(8080));
    assert_eq!(config.poll_timeout_secs, 25);
    assert_eq!(config.db_max_connections, 12);
    assert_eq!(config.store_options().max_connections, 12);
    assert_eq!(config.telegram_config().poll_timeout, Duration::from_secs(25));
    clear_env();
}

#[test]
#[serial]
fn test_token_argument_overrides_env() {
    clear_env();
    env::set_var("TELEGRAM_API_KEY", "env_token");

    let config = BotConfig::load(Some("cli_token".to_string())).unwrap();

    assert_eq!(config.bot_token, "cli_token");
    clear_env();
}

#[test]
#[serial]
fn test_missing_token_fails() {
    clear_env();

    let err = BotConfig::load(None).unwrap_err();

    assert!(err.to_string().contains("TELEGRAM_API_KEY"));
}

#[test]
#[serial]
fn test_invalid_number_fails() {
    clear_env();
    env::set_var("TELEGRAM_API_KEY", "test_token");
    env::set_var("BACKOFF_MAX_SECS", "soon");

    let err = BotConfig::load(None).unwrap_err();

    assert!(err.to_string().contains("BACKOFF_MAX_SECS"));
    clear_env();
}

#[test]
#[serial]
fn test_validate_telegram_api_url_invalid() {
    clear_env();
    env::set_var("TELEGRAM_API_KEY", "test_token");
    env::set_var("TELEGRAM_API_URL", "not a url");

    let config = BotConfig::load(None).unwrap();

    assert!(config.validate().is_err());
    clear_env();
}

#[test]
#[serial]
fn test_validate_rejects_zero_timeout_and_inverted_backoff() {
    clear_env();
    env::set_var("TELEGRAM_API_KEY", "test_token");
    let config = BotConfig::load(None).unwrap();

    let zero = BotConfig {
        db_timeout_secs: 0,
        ..config.clone()
    };
    assert!(zero.validate().is_err());

    let inverted = BotConfig {
        backoff_initial_ms: 5_000,
        backoff_max_secs: 2,
        ..config
    };
    assert!(inverted.validate().is_err());
    clear_env();
}
