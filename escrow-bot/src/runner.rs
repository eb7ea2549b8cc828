//! Wires config, store, Telegram transport, dispatcher and service, then runs until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dispatcher::Dispatcher;
use escrow_core::init_tracing;
use escrow_telegram::{TelegramBotAdapter, TelegramLongPoll};
use storage::{redact_url, SqlStore};
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use crate::config::BotConfig;
use crate::health::serve_health;
use crate::lifecycle::Lifecycle;
use crate::service::EscrowService;
use crate::shutdown::{listen_for_signals, shutdown_channel};

/// Load config from environment. `token` overrides TELEGRAM_API_KEY if provided.
pub fn load_config(token: Option<String>) -> Result<BotConfig> {
    BotConfig::load(token)
}

/// Main entry: validate config, init logging, connect the store, then run the service loop.
///
/// Returns `Ok` on graceful shutdown. Startup failures (bad config, unreachable store, busy
/// liveness port) and fatal transport errors are returned as `Err`.
#[instrument(skip(config))]
pub async fn run_bot(config: BotConfig) -> Result<()> {
    config.validate()?;
    init_tracing(&config.log_file)?;

    info!(
        database_url = %redact_url(&config.database_url),
        telegram_api_url = %config.telegram_api_url,
        port = ?config.port,
        "Initializing bot"
    );

    let store = Arc::new(
        SqlStore::connect(&config.database_url, config.store_options())
            .await
            .with_context(|| {
                format!("Failed to open store at {}", redact_url(&config.database_url))
            })?,
    );
    let telegram = config.telegram_config();
    let source = Arc::new(
        TelegramLongPoll::new(&telegram).context("Failed to build Telegram HTTP client")?,
    );
    let bot = Arc::new(TelegramBotAdapter::from_config(&telegram));

    let lifecycle = Lifecycle::new();
    let (trigger, shutdown) = shutdown_channel();
    let signals = tokio::spawn(listen_for_signals(trigger.clone()));

    let health = match config.port {
        Some(port) => {
            let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port)))
                .await
                .with_context(|| format!("Failed to bind liveness port {}", port))?;
            Some(tokio::spawn(serve_health(
                listener,
                lifecycle.clone(),
                shutdown.clone(),
            )))
        }
        None => None,
    };

    let service = EscrowService::new(
        source,
        bot,
        store.clone(),
        store,
        Dispatcher::with_default_commands(),
        lifecycle,
        config.backoff_policy(),
    );

    info!("Bot started successfully");
    let result = service.run(shutdown).await;

    // Stop the liveness server and signal listener even when the service failed.
    trigger.trigger();
    if let Some(health) = health {
        match health.await {
            Ok(Err(e)) => error!(error = %e, "Liveness endpoint failed"),
            Err(e) => error!(error = %e, "Liveness endpoint task panicked"),
            Ok(Ok(())) => {}
        }
    }
    signals.abort();

    result.context("Service stopped with a fatal error")
}
