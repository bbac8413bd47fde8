//! Custom1 login handshake
//!
//! A login frame (message id 0x0501) carries the HTTP-issued session ticket in
//! field1 and an RSA-OAEP ciphertext, hex-encoded to 256 ASCII characters, in
//! field2. The handshake resolves the ticket against the session table,
//! decrypts the ciphertext with the service private key, parses the session
//! record out of the plaintext and publishes the session key on the
//! connection's record.
//!
//! Failure at any step leaves the connection unauthenticated. Nothing in here
//! writes to the socket; the dispatcher owns the reply.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::crypto::keys::ServiceKeys;
use crate::error::HandshakeError;
use crate::net::session::{ConnectionId, ConnectionTable, SessionTable};
use crate::protocol::packet::Custom1Frame;

/// Exact size of the hex-encoded ciphertext in field2: 128 bytes of RSA-1024
/// output as ASCII hex.
pub const CIPHERTEXT_HEX_LEN: usize = 256;

/// Decode an ASCII hex string into bytes.
///
/// Rejects odd-length input and reports the position and value of the first
/// byte that is not a hex digit. Accepts both cases.
pub fn hex_to_bin(input: &[u8]) -> Result<Vec<u8>, HandshakeError> {
    if input.len() % 2 != 0 {
        return Err(HandshakeError::OddHexLength(input.len()));
    }

    let mut out = Vec::with_capacity(input.len() / 2);
    let mut acc = 0u8;
    for (position, &byte) in input.iter().enumerate() {
        let nibble = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => return Err(HandshakeError::InvalidHexDigit { byte, position }),
        };
        if position % 2 == 0 {
            acc = nibble << 4;
        } else {
            out.push(acc | nibble);
        }
    }
    Ok(out)
}

/// Encode bytes as lowercase ASCII hex
pub fn bin_to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        out.push(char::from_digit((byte >> 4) as u32, 16).unwrap_or('0'));
        out.push(char::from_digit((byte & 0x0f) as u32, 16).unwrap_or('0'));
    }
    out
}

/// Plaintext layout inside the RSA-OAEP ciphertext:
/// `key_length: u16 (BE) | session_key: [u8; key_length] | expires: u32 (BE)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedSessionRecord {
    pub session_key: Vec<u8>,
    pub expires: u32,
}

impl DecryptedSessionRecord {
    /// Parse the record out of decrypted plaintext.
    ///
    /// Anything shorter than `2 + key_length + 4` bytes is malformed.
    /// Trailing padding past the expiry word is tolerated.
    pub fn parse(plaintext: &[u8]) -> Result<Self, HandshakeError> {
        if plaintext.len() < 2 {
            return Err(HandshakeError::MalformedSessionRecord(plaintext.len()));
        }
        let key_length = u16::from_be_bytes([plaintext[0], plaintext[1]]) as usize;
        if plaintext.len() < 2 + key_length + 4 {
            return Err(HandshakeError::MalformedSessionRecord(plaintext.len()));
        }
        let session_key = plaintext[2..2 + key_length].to_vec();
        let expires = u32::from_be_bytes([
            plaintext[2 + key_length],
            plaintext[2 + key_length + 1],
            plaintext[2 + key_length + 2],
            plaintext[2 + key_length + 3],
        ]);
        Ok(Self {
            session_key,
            expires,
        })
    }

    /// Session key as lowercase hex, the form it is stored and compared in
    pub fn session_key_hex(&self) -> String {
        bin_to_hex(&self.session_key)
    }
}

/// Outcome of a successful login handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedLogin {
    pub customer_id: String,
    pub session_key: String,
    pub expires: u32,
}

/// The Custom1 login handshake over shared server state
pub struct LoginHandshake {
    sessions: Arc<SessionTable>,
    connections: Arc<ConnectionTable>,
    keys: Arc<ServiceKeys>,
}

impl LoginHandshake {
    pub fn new(
        sessions: Arc<SessionTable>,
        connections: Arc<ConnectionTable>,
        keys: Arc<ServiceKeys>,
    ) -> Self {
        Self {
            sessions,
            connections,
            keys,
        }
    }

    /// Run the handshake for a decoded login frame.
    ///
    /// On success the connection's record holds the session key (lowercase
    /// hex) and customer id as a single atomic update. On error nothing is
    /// published.
    pub fn authenticate(
        &self,
        frame: &Custom1Frame,
        connection_id: ConnectionId,
    ) -> Result<AuthenticatedLogin, HandshakeError> {
        if frame.field1.is_empty() {
            return Err(HandshakeError::MissingTicket);
        }
        let ticket = String::from_utf8_lossy(&frame.field1).into_owned();

        let customer_id = self
            .sessions
            .get(&ticket)
            .ok_or(HandshakeError::UnknownSession)?;

        if frame.field2.len() != CIPHERTEXT_HEX_LEN {
            return Err(HandshakeError::BadCiphertextLength(frame.field2.len()));
        }
        let ciphertext = hex_to_bin(&frame.field2)?;

        let plaintext = self.keys.decrypt_oaep(&ciphertext).map_err(|e| {
            debug!("OAEP decryption rejected ciphertext: {}", e);
            HandshakeError::DecryptionFailed
        })?;

        let record = DecryptedSessionRecord::parse(&plaintext)?;
        let session_key = record.session_key_hex();

        let updated = self.connections.update(connection_id, |conn| {
            conn.session_key = session_key.clone();
            conn.customer_id = customer_id.clone();
        });
        if !updated {
            warn!(
                connection_id,
                "login succeeded but the connection record is gone"
            );
        }

        Ok(AuthenticatedLogin {
            customer_id,
            session_key,
            expires: record.expires,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use pretty_assertions::assert_eq;
    use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
    use sha1::Sha1;

    use super::*;
    use crate::protocol::packet::LOGIN_MESSAGE_ID;

    const RECORD_HEX: &str =
        "002012b88837609be6fece4967fc8eea92a285ab21b96953de991e90ad2a4917108d00000000";
    const SESSION_KEY_HEX: &str =
        "12b88837609be6fece4967fc8eea92a285ab21b96953de991e90ad2a4917108d";

    fn test_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| {
            RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap()
        })
    }

    fn encrypt_record(plaintext: &[u8]) -> Vec<u8> {
        let public = RsaPublicKey::from(test_key());
        public
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha1>(), plaintext)
            .unwrap()
    }

    fn handshake_fixture() -> (LoginHandshake, Arc<SessionTable>, Arc<ConnectionTable>) {
        let sessions = Arc::new(SessionTable::new());
        let connections = Arc::new(ConnectionTable::new());
        let keys = Arc::new(ServiceKeys::from_private_key(test_key().clone()));
        let handshake = LoginHandshake::new(sessions.clone(), connections.clone(), keys);
        (handshake, sessions, connections)
    }

    fn login_frame(ticket: &[u8], field2: Vec<u8>) -> Custom1Frame {
        Custom1Frame {
            message_id: LOGIN_MESSAGE_ID,
            field1: ticket.to_vec(),
            field2,
            ..Default::default()
        }
    }

    #[test]
    fn test_hex_to_bin() {
        assert_eq!(hex_to_bin(b"4f2a").unwrap(), vec![0x4f, 0x2a]);
        assert_eq!(hex_to_bin(b"4F2A").unwrap(), vec![0x4f, 0x2a]);
        assert_eq!(hex_to_bin(b"").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_hex_to_bin_odd_length() {
        assert_eq!(
            hex_to_bin(b"4f2").unwrap_err(),
            HandshakeError::OddHexLength(3)
        );
    }

    #[test]
    fn test_hex_to_bin_invalid_digit() {
        assert_eq!(
            hex_to_bin(b"4g2a").unwrap_err(),
            HandshakeError::InvalidHexDigit {
                byte: b'g',
                position: 1
            }
        );
    }

    #[test]
    fn test_bin_to_hex_round_trip() {
        let data = vec![0x00, 0x7f, 0xff, 0x12];
        assert_eq!(bin_to_hex(&data), "007fff12");
        assert_eq!(hex_to_bin(bin_to_hex(&data).as_bytes()).unwrap(), data);
    }

    #[test]
    fn test_session_record_known_answer() {
        let plaintext = hex_to_bin(RECORD_HEX.as_bytes()).unwrap();
        let record = DecryptedSessionRecord::parse(&plaintext).unwrap();
        assert_eq!(record.session_key.len(), 32);
        assert_eq!(record.session_key_hex(), SESSION_KEY_HEX);
        assert_eq!(record.expires, 0);
    }

    #[test]
    fn test_session_record_malformed() {
        assert_eq!(
            DecryptedSessionRecord::parse(&[]).unwrap_err(),
            HandshakeError::MalformedSessionRecord(0)
        );
        // Declares a 32-byte key but supplies only 4 bytes after the prefix.
        let short = [0x00, 0x20, 0xaa, 0xbb, 0xcc, 0xdd];
        assert_eq!(
            DecryptedSessionRecord::parse(&short).unwrap_err(),
            HandshakeError::MalformedSessionRecord(6)
        );
    }

    #[test]
    fn test_authenticate_success() {
        let (handshake, sessions, connections) = handshake_fixture();
        sessions.set("testsession", "customer1");
        let conn_id = connections.register();

        let plaintext = hex_to_bin(RECORD_HEX.as_bytes()).unwrap();
        let ciphertext = encrypt_record(&plaintext);
        assert_eq!(ciphertext.len(), 128);

        let frame = login_frame(b"testsession", bin_to_hex(&ciphertext).into_bytes());
        let login = handshake.authenticate(&frame, conn_id).unwrap();

        assert_eq!(login.customer_id, "customer1");
        assert_eq!(login.session_key, SESSION_KEY_HEX);
        assert_eq!(login.expires, 0);

        let record = connections.get(conn_id).unwrap();
        assert_eq!(record.session_key, SESSION_KEY_HEX);
        assert_eq!(record.customer_id, "customer1");
    }

    #[tokio::test]
    async fn test_concurrent_authenticates_do_not_mix() {
        let (handshake, sessions, connections) = handshake_fixture();
        let handshake = Arc::new(handshake);

        // One ticket, customer, session key, and connection per task.
        let mut jobs = Vec::new();
        for i in 0..8u8 {
            let ticket = format!("ticket{}", i);
            let customer_id = format!("customer{}", i);
            sessions.set(ticket.clone(), customer_id.clone());

            let mut record = vec![0x00, 0x20];
            record.extend(std::iter::repeat(i).take(32));
            record.extend_from_slice(&[0, 0, 0, 0]);
            let key_hex = bin_to_hex(&record[2..34]);
            let ciphertext = encrypt_record(&record);

            let conn_id = connections.register();
            jobs.push((conn_id, ticket, customer_id, key_hex, ciphertext));
        }

        let mut handles = Vec::new();
        for (conn_id, ticket, customer_id, key_hex, ciphertext) in jobs {
            let handshake = handshake.clone();
            handles.push(tokio::spawn(async move {
                let frame =
                    login_frame(ticket.as_bytes(), bin_to_hex(&ciphertext).into_bytes());
                let login = handshake.authenticate(&frame, conn_id).unwrap();
                (conn_id, customer_id, key_hex, login)
            }));
        }

        // Every connection ends up with its own customer and key; nothing
        // leaks across connections.
        for handle in handles {
            let (conn_id, customer_id, key_hex, login) = handle.await.unwrap();
            assert_eq!(login.customer_id, customer_id);
            assert_eq!(login.session_key, key_hex);

            let record = connections.get(conn_id).unwrap();
            assert_eq!(record.customer_id, customer_id);
            assert_eq!(record.session_key, key_hex);
        }
    }

    #[test]
    fn test_authenticate_missing_ticket() {
        let (handshake, _sessions, connections) = handshake_fixture();
        let conn_id = connections.register();
        let frame = login_frame(b"", vec![b'a'; CIPHERTEXT_HEX_LEN]);
        assert_eq!(
            handshake.authenticate(&frame, conn_id).unwrap_err(),
            HandshakeError::MissingTicket
        );
    }

    #[test]
    fn test_authenticate_unknown_session() {
        let (handshake, _sessions, connections) = handshake_fixture();
        let conn_id = connections.register();
        let frame = login_frame(b"nosuchticket", vec![b'a'; CIPHERTEXT_HEX_LEN]);
        assert_eq!(
            handshake.authenticate(&frame, conn_id).unwrap_err(),
            HandshakeError::UnknownSession
        );
    }

    #[test]
    fn test_authenticate_bad_ciphertext_length() {
        let (handshake, sessions, connections) = handshake_fixture();
        sessions.set("testsession", "customer1");
        let conn_id = connections.register();
        let frame = login_frame(b"testsession", vec![b'a'; 17]);
        assert_eq!(
            handshake.authenticate(&frame, conn_id).unwrap_err(),
            HandshakeError::BadCiphertextLength(17)
        );
    }

    #[test]
    fn test_authenticate_garbage_ciphertext() {
        let (handshake, sessions, connections) = handshake_fixture();
        sessions.set("testsession", "customer1");
        let conn_id = connections.register();

        // Valid hex, correct length, but not a ciphertext under our key.
        let frame = login_frame(b"testsession", vec![b'a'; CIPHERTEXT_HEX_LEN]);
        assert_eq!(
            handshake.authenticate(&frame, conn_id).unwrap_err(),
            HandshakeError::DecryptionFailed
        );

        // Failure publishes nothing on the connection record.
        let record = connections.get(conn_id).unwrap();
        assert!(record.session_key.is_empty());
    }

    #[test]
    fn test_authenticate_non_hex_ciphertext() {
        let (handshake, sessions, connections) = handshake_fixture();
        sessions.set("testsession", "customer1");
        let conn_id = connections.register();

        let mut field2 = vec![b'a'; CIPHERTEXT_HEX_LEN];
        field2[10] = b'z';
        let frame = login_frame(b"testsession", field2);
        assert_eq!(
            handshake.authenticate(&frame, conn_id).unwrap_err(),
            HandshakeError::InvalidHexDigit {
                byte: b'z',
                position: 10
            }
        );
    }
}
