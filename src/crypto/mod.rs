//! Cryptography module
//!
//! RSA-OAEP decryption of the Custom1 login ciphertext. Password hashing for
//! the HTTP login lives with the auth flow; this module only owns the service
//! key material.

pub mod keys;

// Re-export commonly used types
pub use keys::ServiceKeys;
