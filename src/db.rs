//! Credential store
//!
//! SQLite-backed user credentials, opened once at startup. The schema is a
//! single `users` table (username, bcrypt password hash, customer id); it is
//! created on first run so a fresh deployment comes up without manual steps.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;

/// User credentials backed by a SQLite pool
#[derive(Debug, Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    /// Open (or create) the database file and ensure the schema exists
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!("Credential store opened at {}", path.display());
        Ok(store)
    }

    /// In-memory database, used by tests
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                customer_id TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace a user row
    pub async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        customer_id: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (username, password_hash, customer_id)
             VALUES (?, ?, ?)
             ON CONFLICT(username) DO UPDATE
             SET password_hash = excluded.password_hash,
                 customer_id = excluded.customer_id",
        )
        .bind(username)
        .bind(password_hash)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stored bcrypt hash for a username, if the user exists
    pub async fn password_hash_for(&self, username: &str) -> Result<Option<String>> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hash)
    }

    /// Customer id for a username, if the user exists
    pub async fn customer_id_for(&self, username: &str) -> Result<Option<String>> {
        let customer_id = sqlx::query_scalar::<_, String>(
            "SELECT customer_id FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(customer_id)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_lookup_existing_user() {
        let store = CredentialStore::in_memory().await.unwrap();
        store
            .insert_user("molly", "$2b$04$hash", "customer1")
            .await
            .unwrap();

        assert_eq!(
            store.password_hash_for("molly").await.unwrap(),
            Some("$2b$04$hash".to_string())
        );
        assert_eq!(
            store.customer_id_for("molly").await.unwrap(),
            Some("customer1".to_string())
        );
    }

    #[tokio::test]
    async fn test_lookup_missing_user() {
        let store = CredentialStore::in_memory().await.unwrap();
        assert_eq!(store.password_hash_for("ghost").await.unwrap(), None);
        assert_eq!(store.customer_id_for("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_user_upserts() {
        let store = CredentialStore::in_memory().await.unwrap();
        store.insert_user("molly", "$2b$04$a", "customer1").await.unwrap();
        store.insert_user("molly", "$2b$04$b", "customer2").await.unwrap();

        assert_eq!(
            store.password_hash_for("molly").await.unwrap(),
            Some("$2b$04$b".to_string())
        );
        assert_eq!(
            store.customer_id_for("molly").await.unwrap(),
            Some("customer2".to_string())
        );
    }
}
