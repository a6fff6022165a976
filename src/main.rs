use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use tokio::sync::mpsc;

use filedrop::cli::{Cli, Commands};
use filedrop::conversation::Engine;
use filedrop::core::config::{self, Bootstrap, Config};
use filedrop::core::logging::{init_logger, install_panic_hook};
use filedrop::payments::PaymentGateway;
use filedrop::server::{self, ServerState};
use filedrop::storage::{create_log_pool, create_pool};
use filedrop::telegram::{
    create_bot, run_download_notifications, schema, setup_bot_commands, HandlerDeps, TelegramDocumentSource,
};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the subcommand; `run` is the default.
#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse_args().command() {
        Commands::Run { config } => run_bot(&config).await,
        Commands::InitConfig { config } => {
            config::write_default(&config)?;
            println!("Default configuration written to {config}");
            Ok(())
        }
        Commands::CheckProviders { config } => check_providers(&config).await,
    }
}

/// Loads the config or, on first start, writes the default one and stops.
fn load_config(path: &str) -> Result<Option<Config>> {
    match config::bootstrap(path)? {
        Bootstrap::Loaded(config) => Ok(Some(*config)),
        Bootstrap::Generated(path) => {
            println!("No configuration found. A default one was written to {path}; fill in telegram_token and start again.");
            Ok(None)
        }
    }
}

async fn check_providers(path: &str) -> Result<()> {
    let Some(config) = load_config(path)? else {
        return Ok(());
    };
    let gateway = PaymentGateway::from_config(&config)?;
    if gateway.configured().is_empty() {
        println!("No payment provider is configured.");
        return Ok(());
    }
    for (tag, result) in gateway.self_check_all().await {
        match result {
            Ok(info) => println!("✅ {}: {}", tag.display_name(), info),
            Err(e) => println!("❌ {}: {}", tag.display_name(), e),
        }
    }
    Ok(())
}

async fn run_bot(path: &str) -> Result<()> {
    let Some(config) = load_config(path)? else {
        return Ok(());
    };

    init_logger(&config.log_file_path)?;
    install_panic_hook();

    log::info!("================================================");
    log::info!("📦 filedrop v{}", env!("CARGO_PKG_VERSION"));
    log::info!("================================================");
    config.log_summary();
    config.validate()?;

    let config = Arc::new(config);
    let db_pool = Arc::new(create_pool(&config.database_path)?);
    let log_pool = Arc::new(create_log_pool(&config.logs_database_path)?);
    log::info!("🗄  Databases ready: {}, {}", config.database_path, config.logs_database_path);

    let payments = PaymentGateway::from_config(&config)?;
    {
        let payments = payments.clone();
        tokio::spawn(async move {
            payments.self_check_all().await;
        });
    }

    let bot = create_bot(&config)?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("⚠️ Failed to register the command menu: {}", e);
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_download_notifications(bot.clone(), Arc::clone(&db_pool), events_rx));

    let state = ServerState::new(
        Arc::clone(&config),
        Arc::clone(&db_pool),
        Arc::clone(&log_pool),
        Some(events_tx),
    )?;
    tokio::spawn(async move {
        if let Err(e) = server::serve(state).await {
            log::error!("❌ Delivery server stopped: {:#}", e);
        }
    });

    let documents = Arc::new(TelegramDocumentSource::new(bot.clone())?);
    let engine = Arc::new(Engine::new(config, db_pool, log_pool, payments, documents));
    let handler = schema(HandlerDeps::new(engine));

    log::info!("📡 Ready to receive updates!");
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();
    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
