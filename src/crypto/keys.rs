//! Service key material
//!
//! The login ciphertext is produced by legacy clients with OpenSSL's
//! `RSA_PKCS1_OAEP_PADDING`, which pads with OAEP over SHA-1. The matching
//! private key is loaded from a PEM file once at startup; a missing or
//! unparsable key aborts startup rather than failing every login at runtime.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey};
use sha1::Sha1;
use tracing::info;

/// Holds the RSA private key used to decrypt login ciphertexts
pub struct ServiceKeys {
    private_key: RsaPrivateKey,
}

impl ServiceKeys {
    /// Load the private key from a PEM file.
    ///
    /// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) with a PKCS#1
    /// (`BEGIN RSA PRIVATE KEY`) fallback, matching what OpenSSL emits
    /// depending on version.
    pub fn load(path: &Path) -> Result<Self> {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read private key file: {}", path.display()))?;

        let private_key = match RsaPrivateKey::from_pkcs8_pem(&pem) {
            Ok(key) => key,
            Err(_) => RsaPrivateKey::from_pkcs1_pem(&pem)
                .with_context(|| format!("Failed to parse private key: {}", path.display()))?,
        };

        let keys = Self { private_key };
        info!(
            "Loaded service private key ({}-bit) from {}",
            keys.key_size_bytes() * 8,
            path.display()
        );
        Ok(keys)
    }

    /// Wrap an already-constructed key (tests, key rotation tooling)
    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }

    /// Decrypt an OAEP-SHA1 ciphertext.
    ///
    /// The ciphertext must be exactly the modulus size; anything else, or a
    /// padding check failure, is reported as an opaque decryption error.
    pub fn decrypt_oaep(&self, ciphertext: &[u8]) -> rsa::Result<Vec<u8>> {
        self.private_key.decrypt(Oaep::new::<Sha1>(), ciphertext)
    }

    /// Modulus size in bytes (128 for the legacy 1024-bit key)
    pub fn key_size_bytes(&self) -> usize {
        self.private_key.size()
    }
}

// Keep key material out of logs.
impl fmt::Debug for ServiceKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceKeys")
            .field("key_size_bytes", &self.key_size_bytes())
            .finish()
    }
}
