pub mod config;
pub mod http;
pub mod llm;
pub mod model;
pub mod processor;
pub mod protocol;
pub mod registry;
pub mod store;

pub use config::Config;
pub use http::{create_router, AppState};
pub use llm::{AnthropicProvider, CompletionProvider, ExtractError, LlmClient, ProviderError, RateLimiter};
pub use model::{
    AffectedArea, CallTotals, DisasterSummary, DisasterType, ExtractedInfo, PersonRecord,
    SeverityLevel, TranscriptChunk,
};
pub use processor::{CallProcessor, SummaryCoordinator};
pub use protocol::{ClientMessage, Envelope, ServerMessage};
pub use registry::{spawn_sweep, ConnectionRegistry, Outbound};
pub use store::{MemoryPersonStore, MemorySummaryStore, PersonStore, SummaryStore, SummaryStoreError};
