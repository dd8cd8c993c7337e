use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub llm: LlmConfig,
    pub websocket: WebSocketConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    /// Provider API base URL
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Token-bucket capacity and refill, in requests per minute
    pub rate_limit_rpm: u32,
    /// Attempts per provider call before giving up
    pub max_retries: u32,
}

#[derive(Debug, Deserialize)]
pub struct WebSocketConfig {
    /// How often the stale-connection sweep runs
    pub heartbeat_interval_secs: u64,
    /// Silence threshold after which a connection is closed
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct ProcessingConfig {
    /// Buffered chunks that trigger extraction
    pub chunk_buffer_size: usize,
    /// Debounce window for summary recomputation, in seconds
    pub summary_update_interval_secs: u64,
    /// Compare-and-swap attempts per recompute cycle
    pub summary_cas_retries: u32,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
