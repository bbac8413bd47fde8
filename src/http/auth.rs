//! Web login flow
//!
//! `/AuthLogin?username=...&password=...` verifies the password against the
//! bcrypt hash stored for the user, then issues a 64-hex-char session ticket
//! and records it in the session table for the Custom1 handshake to find.
//!
//! Response bodies are the legacy launcher format, newline-terminated
//! key=value lines.

use rand::RngCore;
use tracing::{info, warn};

use crate::db::CredentialStore;
use crate::net::session::SessionTable;
use crate::protocol::handshake::bin_to_hex;

/// Number of random bytes behind a ticket (64 hex chars on the wire)
const TICKET_BYTES: usize = 32;

/// Outcome of an `/AuthLogin` attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginReply {
    Granted {
        ticket: String,
    },
    Denied {
        code: &'static str,
        text: String,
    },
}

impl LoginReply {
    fn denied(code: &'static str, text: impl Into<String>) -> Self {
        Self::Denied {
            code,
            text: text.into(),
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    /// Legacy launcher response body
    pub fn body(&self) -> String {
        match self {
            Self::Granted { ticket } => format!("Valid=TRUE\nTicket={}\n", ticket),
            Self::Denied { code, text } => {
                format!("reasoncode={}\nreasontext={}\nreasonurl=\n", code, text)
            }
        }
    }
}

/// Handle one `/AuthLogin` request.
///
/// Database errors deny the login with an internal-error reason instead of
/// leaking details to the client.
pub async fn handle_auth_login(
    params: &std::collections::HashMap<String, String>,
    credentials: &CredentialStore,
    sessions: &SessionTable,
) -> LoginReply {
    let (username, password) = match (params.get("username"), params.get("password")) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            (username, password)
        }
        _ => return LoginReply::denied("MISSING_PARAMS", "Missing username or password"),
    };

    let stored_hash = match credentials.password_hash_for(username).await {
        Ok(Some(hash)) => hash,
        Ok(None) => {
            info!(username = %username, "Login attempt for unknown user");
            return LoginReply::denied("INVALID_LOGIN", "Invalid username or password");
        }
        Err(e) => {
            warn!("Credential lookup failed: {}", e);
            return LoginReply::denied("INTERNAL_ERROR", "Internal error");
        }
    };

    // Anything that is not a bcrypt hash in storage is an operator mistake,
    // not a client error; refuse to compare against it.
    if !stored_hash.starts_with("$2") {
        warn!(username = %username, "Stored password hash is not bcrypt");
        return LoginReply::denied("INVALID_LOGIN", "Invalid password hash");
    }

    match bcrypt::verify(password, &stored_hash) {
        Ok(true) => {}
        Ok(false) => {
            info!(username = %username, "Password rejected");
            return LoginReply::denied("INVALID_LOGIN", "Invalid username or password");
        }
        Err(e) => {
            warn!("bcrypt verification error: {}", e);
            return LoginReply::denied("INTERNAL_ERROR", "Internal error");
        }
    }

    let customer_id = match credentials.customer_id_for(username).await {
        Ok(Some(customer_id)) => customer_id,
        Ok(None) => {
            warn!(username = %username, "User has no customer id");
            return LoginReply::denied("INTERNAL_ERROR", "Internal error");
        }
        Err(e) => {
            warn!("Customer id lookup failed: {}", e);
            return LoginReply::denied("INTERNAL_ERROR", "Internal error");
        }
    };

    let ticket = generate_ticket();
    sessions.set(ticket.clone(), customer_id.clone());
    info!(username = %username, customer_id = %customer_id, "Web login succeeded");

    LoginReply::Granted { ticket }
}

/// 32 bytes from the OS CSPRNG, hex-encoded
fn generate_ticket() -> String {
    let mut bytes = [0u8; TICKET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bin_to_hex(&bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::CredentialStore;

    // Low cost keeps the hash fast; strength is irrelevant here.
    const TEST_BCRYPT_COST: u32 = 4;

    async fn store_with_user(username: &str, password: &str, customer_id: &str) -> CredentialStore {
        let store = CredentialStore::in_memory().await.unwrap();
        let hash = bcrypt::hash(password, TEST_BCRYPT_COST).unwrap();
        store.insert_user(username, &hash, customer_id).await.unwrap();
        store
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_login_success_issues_ticket() {
        let store = store_with_user("molly", "secret", "customer1").await;
        let sessions = SessionTable::new();

        let reply = handle_auth_login(
            &params(&[("username", "molly"), ("password", "secret")]),
            &store,
            &sessions,
        )
        .await;

        let ticket = match &reply {
            LoginReply::Granted { ticket } => ticket.clone(),
            other => panic!("expected granted login, got {:?}", other),
        };
        assert_eq!(ticket.len(), 64);
        assert!(ticket.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(reply.body(), format!("Valid=TRUE\nTicket={}\n", ticket));

        // The ticket is immediately visible to the Custom1 handshake.
        assert_eq!(sessions.get(&ticket), Some("customer1".to_string()));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let store = store_with_user("molly", "secret", "customer1").await;
        let sessions = SessionTable::new();

        let reply = handle_auth_login(
            &params(&[("username", "molly"), ("password", "wrong")]),
            &store,
            &sessions,
        )
        .await;

        assert!(!reply.is_granted());
        assert_eq!(
            reply.body(),
            "reasoncode=INVALID_LOGIN\nreasontext=Invalid username or password\nreasonurl=\n"
        );
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let store = CredentialStore::in_memory().await.unwrap();
        let sessions = SessionTable::new();

        let reply = handle_auth_login(
            &params(&[("username", "ghost"), ("password", "x")]),
            &store,
            &sessions,
        )
        .await;
        assert!(!reply.is_granted());
    }

    #[tokio::test]
    async fn test_login_missing_params() {
        let store = CredentialStore::in_memory().await.unwrap();
        let sessions = SessionTable::new();

        for p in [
            params(&[]),
            params(&[("username", "molly")]),
            params(&[("username", ""), ("password", "x")]),
        ] {
            let reply = handle_auth_login(&p, &store, &sessions).await;
            assert_eq!(
                reply,
                LoginReply::denied("MISSING_PARAMS", "Missing username or password")
            );
        }
    }

    #[tokio::test]
    async fn test_login_non_bcrypt_hash_rejected() {
        let store = CredentialStore::in_memory().await.unwrap();
        store
            .insert_user("legacy", "plaintext-password", "customer9")
            .await
            .unwrap();
        let sessions = SessionTable::new();

        let reply = handle_auth_login(
            &params(&[("username", "legacy"), ("password", "plaintext-password")]),
            &store,
            &sessions,
        )
        .await;
        assert_eq!(
            reply,
            LoginReply::denied("INVALID_LOGIN", "Invalid password hash")
        );
    }

    #[test]
    fn test_generate_ticket_unique() {
        let a = generate_ticket();
        let b = generate_ticket();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
