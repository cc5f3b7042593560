// Persistence contracts. Two interchangeable backends sit behind these
// traits: a SQLite store for multi-user deployments and an in-memory store
// for local single-player mode. The battle orchestrator never knows which
// one is active.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::creature::Creature;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    /// Unique across accounts, case-insensitively.
    pub email: String,
    pub username: String,
    /// Gates access to the main application.
    pub is_verified: bool,
    pub password_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Email already registered.")]
    DuplicateEmail,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
pub trait CreatureStore: Send + Sync {
    /// Read the full collection. Callers re-fetch before opponent selection
    /// to reduce staleness; there is no transactional guard.
    async fn list_creatures(&self) -> Result<Vec<Creature>, StoreError>;

    async fn get_creature(&self, id: &str) -> Result<Option<Creature>, StoreError>;

    /// Insert a record with a caller-generated identifier.
    async fn create_creature(&self, creature: &Creature) -> Result<(), StoreError>;

    /// Update by identifier, last-write-wins. Backends may replace the
    /// whole record or merge known fields; callers tolerate either.
    async fn update_creature(&self, creature: &Creature) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create an account. Rejects a duplicate email case-insensitively.
    /// The new account becomes the current session.
    async fn register(&self, account: Account) -> Result<Account, StoreError>;

    /// Authenticate by email and password. On success the account becomes
    /// the current session.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Account, StoreError>;

    async fn get_account(&self, id: &str) -> Result<Option<Account>, StoreError>;

    /// Merge profile changes (verification, display name) into the account
    /// record and refresh the session slot.
    async fn update_session(&self, account: Account) -> Result<(), StoreError>;

    async fn current_session(&self) -> Result<Option<Account>, StoreError>;

    /// Clear the current session.
    async fn logout(&self) -> Result<(), StoreError>;

    /// Subscribe to session changes. The receiver replays the current
    /// session on subscription (the watch channel's initial value), then
    /// observes every subsequent transition in order.
    fn observe_session(&self) -> watch::Receiver<Option<Account>>;
}

/// The full persistence surface the application wires at startup.
pub trait Store: CreatureStore + AccountStore {}

impl<T: CreatureStore + AccountStore> Store for T {}
