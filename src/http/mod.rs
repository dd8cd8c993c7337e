//! HTTP and WebSocket server surface
//!
//! - GET /ws/call/:person_id - caller WebSocket session
//! - GET /health - liveness check with the active connection count

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
