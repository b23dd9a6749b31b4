//! # LLM Request Gateway
//!
//! Multi-provider gateway for Large Language Models: one request surface over
//! OpenRouter, DeepSeek and Anthropic with rate limiting, response caching
//! and retries.
//!
//! ## Usage
//!
//! ```bash
//! # Report provider health
//! llm-gateway
//!
//! # One-shot prompt, streamed
//! DEEPSEEK_API_KEY=... llm-gateway chat "Explain backpressure" --stream
//!
//! # Custom config file
//! llm-gateway --config /path/to/gateway.yaml models openrouter
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::StreamExt;
use gateway_config::{apply_env_overrides, load_config, load_from_file, GatewayConfig};
use gateway_core::{ChatMessage, RequestOptions, StreamEvent};
use gateway_providers::ProviderRegistry;
use gateway_resilience::{KeyValueStore, MemoryStore};
use gateway_service::{Gateway, GatewayBuilder};
use gateway_telemetry::{init_logging, CompositeObserver, GatewayMetrics, LogObserver, LoggingConfig};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

mod cli;

use cli::{ChatArgs, Cli, Commands};

/// Application entry point
#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "Application failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<()> {
    let config = load(cli.config.as_deref())?;

    if let Err(e) = init_logging(&LoggingConfig::from(&config.logging)) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        default_provider = %config.default_provider,
        "Starting LLM Request Gateway"
    );

    if matches!(cli.command, Some(Commands::Validate)) {
        println!("Configuration is valid");
        for provider in config.enabled_providers() {
            let credentials = if provider.resolved_api_key().is_some() { "configured" } else { "missing" };
            println!("  {:<12} api key {credentials}", provider.name);
        }
        return Ok(());
    }

    let metrics = GatewayMetrics::new().context("failed to create metrics")?;
    let gateway = build_gateway(&config, &metrics).await?;

    match cli.command.unwrap_or(Commands::Health) {
        Commands::Health => report_health(&gateway).await,
        Commands::Models { provider } => {
            for model in gateway.list_models(&provider)? {
                println!("{model}");
            }
        }
        Commands::Chat(args) => chat(&gateway, args).await?,
        Commands::Validate => {}
    }

    if cli.metrics {
        print!("{}", metrics.render()?);
    }
    Ok(())
}

fn load(path: Option<&Path>) -> Result<GatewayConfig> {
    let Some(path) = path else {
        return load_config().context("failed to load configuration");
    };

    let mut config = load_from_file(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Build the store, registry and gateway from configuration
async fn build_gateway(config: &GatewayConfig, metrics: &GatewayMetrics) -> Result<Gateway> {
    let store = create_store(config).await?;

    let registry = ProviderRegistry::from_config(config)
        .await
        .context("failed to create provider registry")?;
    if registry.is_empty() {
        bail!("no providers configured; set OPENROUTER_API_KEY, DEEPSEEK_API_KEY or ANTHROPIC_API_KEY");
    }
    info!(providers = ?registry.list_providers(), "Provider registry initialized");

    let observer = CompositeObserver::new()
        .with(Arc::new(LogObserver))
        .with(Arc::new(metrics.clone()));

    Ok(GatewayBuilder::from_config(config, Arc::new(registry), store)
        .observer(Arc::new(observer))
        .build())
}

#[cfg(feature = "redis")]
async fn create_store(config: &GatewayConfig) -> Result<Arc<dyn KeyValueStore>> {
    match &config.store.redis_url {
        Some(url) => {
            let store = gateway_resilience::RedisStore::connect(url)
                .await
                .context("failed to connect to Redis")?;
            info!("Using Redis store");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

#[cfg(not(feature = "redis"))]
async fn create_store(config: &GatewayConfig) -> Result<Arc<dyn KeyValueStore>> {
    if config.store.redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but the redis feature is disabled; using in-memory store");
    }
    Ok(Arc::new(MemoryStore::new()))
}

async fn report_health(gateway: &Gateway) {
    for (provider, healthy) in gateway.health_check().await {
        let status = if healthy { "healthy" } else { "unhealthy" };
        println!("{provider:<12} {status}");
    }
}

async fn chat(gateway: &Gateway, args: ChatArgs) -> Result<()> {
    let mut messages = Vec::new();
    if let Some(system) = args.system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(args.message));

    let mut options = RequestOptions::new();
    options.model = args.model;
    options.temperature = args.temperature;
    options.max_tokens = args.max_tokens;

    if args.stream {
        let mut stream = gateway
            .complete_stream(&args.subject, &messages, &options)
            .await?;
        let mut stdout = std::io::stdout();
        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Chunk(chunk) => {
                    write!(stdout, "{}", chunk.text)?;
                    stdout.flush()?;
                }
                StreamEvent::Done(summary) => {
                    writeln!(stdout)?;
                    info!(chunks = summary.chunks, latency_ms = summary.latency_ms, "Stream finished");
                }
            }
        }
        return Ok(());
    }

    let result = gateway.complete(&args.subject, &messages, &options).await?;
    println!("{}", result.text);
    if args.show_usage {
        println!();
        println!("Provider:   {}", result.metadata.provider);
        println!("Model:      {}", result.metadata.model);
        println!("Prompt:     {}", result.usage.prompt_tokens);
        println!("Completion: {}", result.usage.completion_tokens);
        println!("Total:      {}", result.usage.total_tokens);
    }
    Ok(())
}
