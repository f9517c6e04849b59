//! HTTP surface: SSE connect, start, disconnect, and health endpoints over a
//! shared [`relay_engine::PollOrchestrator`].

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
