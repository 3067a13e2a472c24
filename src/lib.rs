pub mod auth;
pub mod config;
pub mod engagement;
pub mod error;
pub mod models;
pub mod oauth;
pub mod openapi;
pub mod policy;
pub mod rate_limit; // in-memory rate limiting
pub mod repo;
pub mod routes;

// Re-export commonly used items for tests / external users
pub use config::AppConfig;
pub use routes::{config, AppState};
