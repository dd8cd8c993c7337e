use crate::processor::CallProcessor;
use crate::registry::ConnectionRegistry;
use std::sync::Arc;

/// Shared application state for HTTP and WebSocket handlers
#[derive(Clone)]
pub struct AppState {
    /// Live caller connections
    pub registry: Arc<ConnectionRegistry>,

    /// Message pipeline driven by each connection's receive loop
    pub processor: Arc<CallProcessor>,
}

impl AppState {
    pub fn new(registry: Arc<ConnectionRegistry>, processor: Arc<CallProcessor>) -> Self {
        Self {
            registry,
            processor,
        }
    }
}
