// Devnote moderation core - admin console data and moderation engine

// Core types and store layout
pub mod core;

// Store adapter, subscriptions, caching and authorization
pub mod infrastructure;

// Canonical records
pub mod models;

// Normalizer, tree builder, engines and aggregation
pub mod services;

// Console wiring and live views
pub mod console;

// Common utilities
pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::Config;
pub use console::AdminConsole;
pub use error::{AppError, AppResult};
