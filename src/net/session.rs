//! Session and connection state
//!
//! Two concurrent tables bridge the HTTP login to the binary-protocol login:
//!
//! - [`SessionTable`]: ticket -> customer id, written by `/AuthLogin` and read
//!   by the Custom1 handshake.
//! - [`ConnectionTable`]: connection id -> per-connection auth state, created
//!   empty at accept, populated by a successful handshake, removed at close.
//!
//! Both are DashMap-backed and safe under concurrent access from any number
//! of connection tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

/// Identifies one accepted Custom1 connection for its lifetime
pub type ConnectionId = u64;

/// Maps HTTP-issued session tickets to customer ids
#[derive(Debug, Default)]
pub struct SessionTable {
    tickets: DashMap<String, String>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a ticket
    pub fn set(&self, ticket: impl Into<String>, customer_id: impl Into<String>) {
        let ticket = ticket.into();
        let customer_id = customer_id.into();
        debug!(customer_id = %customer_id, "Session ticket issued");
        self.tickets.insert(ticket, customer_id);
    }

    /// Look up the customer id for a ticket (snapshot copy)
    pub fn get(&self, ticket: &str) -> Option<String> {
        self.tickets.get(ticket).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, ticket: &str) -> Option<String> {
        self.tickets.remove(ticket).map(|(_, customer_id)| customer_id)
    }

    pub fn clear(&self) {
        self.tickets.clear();
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

/// Per-connection authentication state
///
/// Both fields start empty and are written together by the handshake;
/// `session_key` is lowercase hex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub session_key: String,
    pub customer_id: String,
}

impl ConnectionRecord {
    pub fn is_authenticated(&self) -> bool {
        !self.session_key.is_empty()
    }
}

/// Tracks live Custom1 connections and their auth state
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: DashMap<ConnectionId, ConnectionRecord>,
    next_id: AtomicU64,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh connection id with an empty record
    pub fn register(&self) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.insert(id, ConnectionRecord::default());
        id
    }

    /// Snapshot copy of a connection's record
    pub fn get(&self, id: ConnectionId) -> Option<ConnectionRecord> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    /// Mutate a record in place, atomically with respect to concurrent reads.
    ///
    /// Returns false when the connection is no longer tracked.
    pub fn update<F>(&self, id: ConnectionId, mutator: F) -> bool
    where
        F: FnOnce(&mut ConnectionRecord),
    {
        match self.connections.get_mut(&id) {
            Some(mut entry) => {
                mutator(entry.value_mut());
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: ConnectionId) -> Option<ConnectionRecord> {
        self.connections.remove(&id).map(|(_, record)| record)
    }

    pub fn clear(&self) {
        self.connections.clear();
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Find the session key a customer authenticated with.
    ///
    /// Linear scan over live connections; the table is small (one entry per
    /// in-flight Custom1 connection) so this is not worth an index.
    pub fn session_key_for_customer(&self, customer_id: &str) -> Option<String> {
        self.connections.iter().find_map(|entry| {
            let record = entry.value();
            if record.customer_id == customer_id && record.is_authenticated() {
                Some(record.session_key.clone())
            } else {
                None
            }
        })
    }
}
