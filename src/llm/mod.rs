//! Extraction and summarization gateway
//!
//! Wraps the external text-analysis provider with:
//! - A token-bucket rate limiter shared by all callers
//! - Retry with exponential backoff for transient provider failures
//! - Tolerant parsing of fenced / malformed JSON responses

mod client;
mod provider;
mod rate_limit;

pub mod prompts;

pub use client::{ExtractError, LlmClient};
pub use provider::{AnthropicProvider, CompletionProvider, ProviderError};
pub use rate_limit::RateLimiter;
