// SQLite-backed store (via sqlx): the multi-user backend.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::sync::watch;

use super::{Account, AccountStore, CreatureStore, StoreError};
use crate::auth;
use crate::creature::{Creature, StatBlock};

pub struct SqliteStore {
    pool: SqlitePool,
    session: watch::Sender<Option<Account>>,
}

/// Flat row shape; the nested stat block is reassembled on read.
#[derive(sqlx::FromRow)]
struct CreatureRow {
    id: String,
    owner_id: String,
    owner_name: String,
    species: String,
    nickname: Option<String>,
    description: String,
    image_url: String,
    strength: i64,
    attack: i64,
    size: i64,
    willingness_to_live: i64,
    stamina: i64,
    agility: i64,
    quantity: i64,
    max_hp: f64,
    current_hp: f64,
    wins: i64,
    losses: i64,
    created_at: i64,
}

impl From<CreatureRow> for Creature {
    fn from(row: CreatureRow) -> Self {
        Creature {
            id: row.id,
            owner_id: row.owner_id,
            owner_name: row.owner_name,
            species: row.species,
            nickname: row.nickname,
            description: row.description,
            image_url: row.image_url,
            stats: StatBlock {
                strength: row.strength,
                attack: row.attack,
                size: row.size,
                willingness_to_live: row.willingness_to_live,
                stamina: row.stamina,
                agility: row.agility,
                quantity: row.quantity,
            },
            max_hp: row.max_hp,
            current_hp: row.current_hp,
            wins: row.wins,
            losses: row.losses,
            created_at: row.created_at,
        }
    }
}

const CREATURE_COLUMNS: &str = "id, owner_id, owner_name, species, nickname, description, \
     image_url, strength, attack, size, willingness_to_live, stamina, agility, quantity, \
     max_hp, current_hp, wins, losses, created_at";

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let (session, _) = watch::channel(None);
        let store = SqliteStore { pool, session };
        store.run_migrations().await?;

        // Replay a persisted session into the watch slot so subscribers see
        // it immediately after a restart.
        let persisted = store.load_persisted_session().await?;
        store.session.send_replace(persisted);
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                username TEXT NOT NULL,
                is_verified INTEGER NOT NULL DEFAULT 0,
                password_hash TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS creatures (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES accounts(id),
                owner_name TEXT NOT NULL,
                species TEXT NOT NULL,
                nickname TEXT,
                description TEXT NOT NULL,
                image_url TEXT NOT NULL,
                strength INTEGER NOT NULL,
                attack INTEGER NOT NULL,
                size INTEGER NOT NULL,
                willingness_to_live INTEGER NOT NULL,
                stamina INTEGER NOT NULL,
                agility INTEGER NOT NULL,
                quantity INTEGER NOT NULL,
                max_hp REAL NOT NULL,
                current_hp REAL NOT NULL,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                account_id TEXT NOT NULL REFERENCES accounts(id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_persisted_session(&self) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT a.id, a.email, a.username, a.is_verified, a.password_hash \
             FROM accounts a JOIN session s ON s.account_id = a.id",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn persist_session(&self, account_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO session (slot, account_id) VALUES (0, ?) \
             ON CONFLICT(slot) DO UPDATE SET account_id = excluded.account_id",
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CreatureStore for SqliteStore {
    async fn list_creatures(&self) -> Result<Vec<Creature>, StoreError> {
        let rows = sqlx::query_as::<_, CreatureRow>(&format!(
            "SELECT {CREATURE_COLUMNS} FROM creatures ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Creature::from).collect())
    }

    async fn get_creature(&self, id: &str) -> Result<Option<Creature>, StoreError> {
        let row = sqlx::query_as::<_, CreatureRow>(&format!(
            "SELECT {CREATURE_COLUMNS} FROM creatures WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Creature::from))
    }

    async fn create_creature(&self, creature: &Creature) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO creatures (id, owner_id, owner_name, species, nickname, description, \
             image_url, strength, attack, size, willingness_to_live, stamina, agility, quantity, \
             max_hp, current_hp, wins, losses, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&creature.id)
        .bind(&creature.owner_id)
        .bind(&creature.owner_name)
        .bind(&creature.species)
        .bind(&creature.nickname)
        .bind(&creature.description)
        .bind(&creature.image_url)
        .bind(creature.stats.strength)
        .bind(creature.stats.attack)
        .bind(creature.stats.size)
        .bind(creature.stats.willingness_to_live)
        .bind(creature.stats.stamina)
        .bind(creature.stats.agility)
        .bind(creature.stats.quantity)
        .bind(creature.max_hp)
        .bind(creature.current_hp)
        .bind(creature.wins)
        .bind(creature.losses)
        .bind(creature.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_creature(&self, creature: &Creature) -> Result<(), StoreError> {
        // Merge of the known mutable fields; last write wins.
        sqlx::query(
            "UPDATE creatures SET nickname = ?, current_hp = ?, wins = ?, losses = ? \
             WHERE id = ?",
        )
        .bind(&creature.nickname)
        .bind(creature.current_hp)
        .bind(creature.wins)
        .bind(creature.losses)
        .bind(&creature.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn register(&self, account: Account) -> Result<Account, StoreError> {
        let result = sqlx::query(
            "INSERT INTO accounts (id, email, username, is_verified, password_hash) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&account.id)
        .bind(&account.email)
        .bind(&account.username)
        .bind(account.is_verified)
        .bind(&account.password_hash)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if e.to_string().contains("UNIQUE") => {
                return Err(StoreError::DuplicateEmail);
            }
            Err(e) => return Err(e.into()),
        }

        self.persist_session(&account.id).await?;
        self.session.send_replace(Some(account.clone()));
        Ok(account)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, email, username, is_verified, password_hash FROM accounts \
             WHERE email = ? COLLATE NOCASE",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::InvalidCredentials)?;

        match auth::verify_password(password, &account.password_hash) {
            Ok(true) => {}
            Ok(false) => return Err(StoreError::InvalidCredentials),
            Err(e) => return Err(StoreError::Backend(e)),
        }

        self.persist_session(&account.id).await?;
        self.session.send_replace(Some(account.clone()));
        Ok(account)
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, email, username, is_verified, password_hash FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn update_session(&self, account: Account) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET username = ?, is_verified = ? WHERE id = ?")
            .bind(&account.username)
            .bind(account.is_verified)
            .bind(&account.id)
            .execute(&self.pool)
            .await?;
        self.persist_session(&account.id).await?;
        self.session.send_replace(Some(account));
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Account>, StoreError> {
        Ok(self.session.borrow().clone())
    }

    async fn logout(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session").execute(&self.pool).await?;
        self.session.send_replace(None);
        Ok(())
    }

    fn observe_session(&self) -> watch::Receiver<Option<Account>> {
        self.session.subscribe()
    }
}
