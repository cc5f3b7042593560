// In-memory store used in local mode: single player, nothing survives a
// restart. Mirrors the SQLite backend's semantics behind the same traits.

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};

use super::{Account, AccountStore, CreatureStore, StoreError};
use crate::auth;
use crate::creature::Creature;

pub struct MemoryStore {
    creatures: RwLock<Vec<Creature>>,
    accounts: RwLock<Vec<Account>>,
    session: watch::Sender<Option<Account>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        MemoryStore {
            creatures: RwLock::new(Vec::new()),
            accounts: RwLock::new(Vec::new()),
            session,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CreatureStore for MemoryStore {
    async fn list_creatures(&self) -> Result<Vec<Creature>, StoreError> {
        let creatures = self.creatures.read().await;
        Ok(creatures.clone())
    }

    async fn get_creature(&self, id: &str) -> Result<Option<Creature>, StoreError> {
        let creatures = self.creatures.read().await;
        Ok(creatures.iter().find(|c| c.id == id).cloned())
    }

    async fn create_creature(&self, creature: &Creature) -> Result<(), StoreError> {
        let mut creatures = self.creatures.write().await;
        creatures.push(creature.clone());
        Ok(())
    }

    async fn update_creature(&self, creature: &Creature) -> Result<(), StoreError> {
        let mut creatures = self.creatures.write().await;
        if let Some(slot) = creatures.iter_mut().find(|c| c.id == creature.id) {
            *slot = creature.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn register(&self, account: Account) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .iter()
            .any(|a| a.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(StoreError::DuplicateEmail);
        }
        accounts.push(account.clone());
        self.session.send_replace(Some(account.clone()));
        Ok(account)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Account, StoreError> {
        let accounts = self.accounts.read().await;
        let account = accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .ok_or(StoreError::InvalidCredentials)?;

        match auth::verify_password(password, &account.password_hash) {
            Ok(true) => {}
            Ok(false) => return Err(StoreError::InvalidCredentials),
            Err(e) => return Err(StoreError::Backend(e)),
        }

        self.session.send_replace(Some(account.clone()));
        Ok(account.clone())
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn update_session(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        if let Some(slot) = accounts.iter_mut().find(|a| a.id == account.id) {
            *slot = account.clone();
        }
        self.session.send_replace(Some(account));
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Account>, StoreError> {
        Ok(self.session.borrow().clone())
    }

    async fn logout(&self) -> Result<(), StoreError> {
        self.session.send_replace(None);
        Ok(())
    }

    fn observe_session(&self) -> watch::Receiver<Option<Account>> {
        self.session.subscribe()
    }
}
