//! Protocol module
//!
//! This module contains the binary protocol implementations for the Lotus
//! server:
//! - Custom1 frame codec (big-endian framed messages)
//! - Custom1 login handshake (RSA-OAEP session key exchange)
//!
//! The Custom2 protocol has no frame format; the dispatcher answers it with a
//! static acknowledgement directly.

pub mod handshake;
pub mod packet;

// Re-export commonly used types
pub use handshake::LoginHandshake;
pub use packet::Custom1Frame;
