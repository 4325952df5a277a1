pub mod config;
pub mod llm;
pub mod service;

pub use config::{ConfigError, Settings};
pub use llm::LlmSlotExtractor;
pub use service::{AppState, build_router, cors_layer};
