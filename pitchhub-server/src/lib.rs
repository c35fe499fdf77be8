//! pitchhub-server: backend for an investment and founder network
//!
//! Users publish projects under sectors, investors make offers on them,
//! and everyone can connect, post, comment, like and message. Uploaded
//! post media and project files live on disk under one uploads root.

pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod models;
pub mod storage;
pub mod sweep;

pub use config::{AppConfig, ConfigError};
pub use http::{run_server, ServerConfig};
