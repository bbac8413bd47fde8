//! Lotus Server Library
//!
//! This library provides the core functionality for the Lotus game backend,
//! an emulation of a legacy online-game login and shard service.
//!
//! ## Modules
//!
//! - `config` - Server configuration management
//! - `crypto` - Service key material (RSA-OAEP login decryption)
//! - `db` - SQLite-backed credential store
//! - `error` - Error types and result definitions
//! - `http` - Web login, shard directory, health probe
//! - `net` - Multi-port dispatch and connection/session state
//! - `protocol` - Custom1 frame codec and login handshake

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod http;
pub mod net;
pub mod protocol;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use state::AppState;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
