pub mod chain;
pub mod channel;
pub mod client;
pub mod error;
pub mod mock;
pub mod orchestrator;
pub mod registry;

pub use channel::{ChannelId, EventChannel, EventStream};
pub use client::{HttpClientConfig, HttpInquiryClient, InquiryClient};
pub use error::EngineError;
pub use orchestrator::{ChainProgress, PollOrchestrator};
pub use registry::SessionRegistry;
