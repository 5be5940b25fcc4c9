pub mod config;
pub mod service;

pub use config::{BotBackend, ServiceConfig};
pub use service::{AppState, CORRELATION_HEADER, build_router};
