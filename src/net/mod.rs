//! Networking module
//!
//! This module handles all network-related functionality for the Lotus server:
//! - Multi-port TCP dispatch (HTTP, Custom1, Custom2)
//! - Connection lifecycle
//! - Session and connection state tables

pub mod dispatcher;
pub mod session;
