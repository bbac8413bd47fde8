//! Error handling module
//!
//! Defines the error types for the Lotus server. Frame and handshake errors
//! come from untrusted network input and are always recoverable: the offending
//! connection is dropped, the process keeps running.

use std::io;

use thiserror::Error;

/// Main error type for the Lotus server
#[derive(Error, Debug)]
pub enum ServerError {
    /// Custom1 wire-format errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Custom1 login handshake errors
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Custom1 frame decoding errors
///
/// Decoding never reads out of bounds: any field that would run past the end
/// of the received buffer yields `Truncated` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated at offset {offset}: {needed} more bytes required")]
    Truncated { offset: usize, needed: usize },

    #[error("field lengths leave {leftover} trailing bytes unaccounted for")]
    FieldLengthMismatch { leftover: usize },
}

/// Custom1 login handshake errors
///
/// Every variant is reachable from attacker-controlled input. A failed
/// handshake leaves the connection unauthenticated; it never terminates the
/// process and is never retried server-side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("login frame carries no session ticket")]
    MissingTicket,

    #[error("session ticket not present in the session table")]
    UnknownSession,

    #[error("ciphertext field is {0} bytes, expected 256 hex characters")]
    BadCiphertextLength(usize),

    #[error("hex string has odd length {0}")]
    OddHexLength(usize),

    #[error("non-hex byte 0x{byte:02x} at position {position}")]
    InvalidHexDigit { byte: u8, position: usize },

    #[error("RSA-OAEP decryption failed")]
    DecryptionFailed,

    #[error("decrypted session record is malformed ({0} bytes)")]
    MalformedSessionRecord(usize),
}

/// Result type alias for Lotus server operations
pub type Result<T> = std::result::Result<T, ServerError>;
