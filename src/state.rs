//! Application state module
//!
//! Contains the shared state used across all server connections. Everything a
//! connection task needs hangs off one `Arc<AppState>`; no component reaches
//! for globals.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::crypto::keys::ServiceKeys;
use crate::db::CredentialStore;
use crate::http::shards::ShardDirectory;
use crate::net::session::{ConnectionTable, SessionTable};
use crate::protocol::handshake::LoginHandshake;

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,

    /// HTTP-issued session tickets
    pub sessions: Arc<SessionTable>,

    /// Live Custom1 connections
    pub connections: Arc<ConnectionTable>,

    /// Service RSA key material
    pub keys: Arc<ServiceKeys>,

    /// User credentials
    pub credentials: CredentialStore,

    /// Shard directory served over HTTP
    pub shards: ShardDirectory,

    /// Shutdown broadcast channel
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Assemble state from already-constructed components (tests inject
    /// in-memory stores and generated keys here)
    pub fn new(
        config: ServerConfig,
        keys: ServiceKeys,
        credentials: CredentialStore,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let shards = ShardDirectory::with_default_shard(
            &config.public_ip,
            config.custom1_ports.first().copied().unwrap_or(8226),
            *config.custom1_ports.get(2).unwrap_or(&7003),
        );
        Self {
            config,
            sessions: Arc::new(SessionTable::new()),
            connections: Arc::new(ConnectionTable::new()),
            keys: Arc::new(keys),
            credentials,
            shards,
            shutdown_tx,
        }
    }

    /// Load key material and open the credential store, then assemble state.
    ///
    /// Either failure aborts startup; a server that cannot decrypt logins or
    /// look up users has nothing to serve.
    pub async fn init(config: ServerConfig, shutdown_tx: broadcast::Sender<()>) -> Result<Self> {
        let keys = ServiceKeys::load(&config.private_key_path)?;
        let credentials = CredentialStore::connect(&config.database_path).await?;
        Ok(Self::new(config, keys, credentials, shutdown_tx))
    }

    /// Login handshake over this state's tables and keys
    pub fn handshake(&self) -> LoginHandshake {
        LoginHandshake::new(
            self.sessions.clone(),
            self.connections.clone(),
            self.keys.clone(),
        )
    }
}
