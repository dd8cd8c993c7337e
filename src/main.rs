use anyhow::{Context, Result};
use clap::Parser;
use sitrep::llm::{AnthropicProvider, LlmClient};
use sitrep::processor::{CallProcessor, SummaryCoordinator};
use sitrep::registry::{spawn_sweep, ConnectionRegistry};
use sitrep::store::{MemoryPersonStore, MemorySummaryStore, PersonStore, SummaryStore};
use sitrep::{create_router, AppState, Config};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sitrep", about = "Real-time emergency call intake and situation summary")]
struct Args {
    /// Path to the configuration file (extension optional)
    #[arg(short, long, default_value = "config/sitrep")]
    config: String,

    /// Override the configured HTTP port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;
    let port = args.port.unwrap_or(cfg.service.http.port);

    info!("{} starting", cfg.service.name);

    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .context("ANTHROPIC_API_KEY must be set")?;

    let provider = Arc::new(AnthropicProvider::new(
        &cfg.llm.base_url,
        &api_key,
        &cfg.llm.model,
        cfg.llm.max_tokens,
    ));
    let llm = Arc::new(LlmClient::new(
        provider,
        cfg.llm.rate_limit_rpm,
        cfg.llm.max_retries,
    ));

    let registry = Arc::new(ConnectionRegistry::new());
    let person_store: Arc<dyn PersonStore> = Arc::new(MemoryPersonStore::new());
    let summary_store: Arc<dyn SummaryStore> = Arc::new(MemorySummaryStore::new());

    let coordinator = Arc::new(SummaryCoordinator::new(
        Arc::clone(&registry),
        Arc::clone(&person_store),
        Arc::clone(&summary_store),
        Arc::clone(&llm),
        Duration::from_secs(cfg.processing.summary_update_interval_secs),
        cfg.processing.summary_cas_retries,
    ));

    let processor = Arc::new(CallProcessor::new(
        Arc::clone(&registry),
        person_store,
        llm,
        Arc::clone(&coordinator),
        cfg.processing.chunk_buffer_size,
    ));

    let sweep = spawn_sweep(
        Arc::clone(&registry),
        Duration::from_secs(cfg.websocket.heartbeat_interval_secs),
        Duration::from_secs(cfg.websocket.connection_timeout_secs),
    );

    let app = create_router(AppState::new(registry, processor));

    let addr = format!("{}:{}", cfg.service.http.bind, port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweep.abort();
    coordinator.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
    }
}
