use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{AccountStore, StoreError};
use crate::account::{Account, NewAccount};
use crate::types::{AccountId, TelegramId};

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    by_telegram_id: HashMap<TelegramId, AccountId>,
}

/// In-process [`AccountStore`] for tests and single-node development.
///
/// The Telegram id index is checked and updated under one write lock, so
/// concurrent creators for the same id see exactly one success.
#[derive(Default)]
pub struct MemoryAccountStore {
    tables: RwLock<Tables>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.tables.read().await.accounts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Set or clear the ban flag. Returns `false` if no account has this Telegram id.
    ///
    /// # Errors
    ///
    /// Never fails. The `Result` matches the Postgres store's signature.
    pub async fn set_banned(
        &self,
        telegram_id: TelegramId,
        banned: bool,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(id) = tables.by_telegram_id.get(&telegram_id).copied() else {
            return Ok(false);
        };
        Ok(tables
            .accounts
            .get_mut(&id)
            .map(|account| account.is_banned = banned)
            .is_some())
    }
}

impl AccountStore for MemoryAccountStore {
    async fn find_by_telegram_id(
        &self,
        telegram_id: TelegramId,
    ) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_telegram_id
            .get(&telegram_id)
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.by_telegram_id.contains_key(&account.telegram_id) {
            return Err(StoreError::Conflict);
        }

        let account = account.into_account(AccountId::generate());
        tables.by_telegram_id.insert(account.telegram_id, account.id);
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn save(&self, account: &Account) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .accounts
            .get_mut(&account.id)
            .ok_or(StoreError::Missing(account.id))?;
        if stored.telegram_id != account.telegram_id {
            return Err(StoreError::TelegramIdChanged(account.id));
        }
        *stored = Account {
            is_active: stored.is_active,
            is_banned: stored.is_banned,
            is_verified_seller: stored.is_verified_seller,
            rating: stored.rating,
            total_ratings: stored.total_ratings,
            total_sales: stored.total_sales,
            total_listings: stored.total_listings,
            ..account.clone()
        };
        Ok(())
    }
}
