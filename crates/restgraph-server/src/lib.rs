pub mod config;
pub mod demo;
pub mod observability;
pub mod server;

pub use config::{AppConfig, LoggingConfig, ServerConfig};
pub use observability::init_tracing;
pub use server::{AppState, RestgraphServer, ServerBuilder, ServerError, build_app};
