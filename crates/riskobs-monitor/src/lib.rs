//! Observatory stream monitor.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, TelemetryConfig, WsConfig};
pub use error::{AppError, AppResult};
