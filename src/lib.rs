pub mod analysis;
pub mod api;
pub mod config;
pub mod core;
pub mod llm;
pub mod market;
pub mod storage;
pub mod tools;

pub use config::Config;
pub use core::{ChatService, Dispatcher};
pub use storage::Storage;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Wire providers, tools and storage into a chat service.
pub fn build_service<S: Storage>(config: &Config, storage: S) -> Result<ChatService<S>> {
    let router = llm::ModelRouter::new(&config.llm).context("Invalid model routing config")?;
    let anthropic = llm::AnthropicClient::new(&config.llm.anthropic);
    let openrouter = llm::OpenRouterClient::new(&config.llm.openrouter)?;

    let market = if config.tools.stock_price {
        Some(market::MarketClient::new(&config.market)?)
    } else {
        None
    };
    let toolbox = tools::Toolbox::new(market);

    if config.llm.anthropic.api_key.is_none() {
        tracing::warn!("Anthropic API key is not set; Claude models will fail");
    }
    if config.llm.openrouter.api_key.is_none() {
        tracing::warn!("OpenRouter API key is not set; OpenRouter models will fail");
    }

    let dispatcher = Dispatcher::new(
        router,
        Arc::new(anthropic),
        Arc::new(openrouter),
        Arc::new(toolbox),
        Duration::from_millis(config.llm.openrouter.stats_delay_ms),
    );

    Ok(ChatService::new(storage, dispatcher))
}

pub async fn run(config: Config) -> Result<()> {
    tracing::info!("Starting chatrelay...");

    // Initialize storage
    let storage = storage::sqlite::SqliteStorage::new(&config.storage.path).await?;
    tracing::info!("Storage initialized: {}", config.storage.path);

    let chat = build_service(&config, storage)?;
    tracing::info!(
        "Chat service initialized (default model: {}, {} allowed)",
        config.llm.default_model,
        config.llm.allowed_models.len()
    );

    let analyzer = analysis::PriceAnalyzer::new(
        market::MarketClient::new(&config.market)?,
        config.analysis.clone(),
    );

    let state = Arc::new(api::AppState { chat, analyzer });
    let server = api::ApiServer::new(state, config.server.host.clone(), config.server.port)
        .with_cors(config.server.cors);

    server.start().await
}

/// Remove every conversation and message.
pub async fn reset(config: Config) -> Result<()> {
    let storage = storage::sqlite::SqliteStorage::new(&config.storage.path).await?;
    storage.clear().await?;
    tracing::info!("Cleared all conversations in {}", config.storage.path);
    Ok(())
}
