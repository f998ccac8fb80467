//! Account persistence boundary.
//!
//! The identity resolver only talks to [`AccountStore`]. Each call is
//! expected to be transactional on its own; no call spans another.

use std::future::Future;

use crate::account::{Account, NewAccount};
use crate::types::{AccountId, TelegramId};

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryAccountStore;
#[cfg(feature = "postgres")]
pub use postgres::PgAccountStore;

/// Errors returned by an [`AccountStore`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Uniqueness violation on `telegram_id`. Another request created the
    /// account first; resolve it by lookup.
    #[error("Account for this Telegram id already exists")]
    Conflict,

    /// `save` was called for an account that is not stored.
    #[error("Account {0} does not exist")]
    Missing(AccountId),

    /// `save` tried to change the Telegram id of a stored account.
    #[error("Telegram id of account {0} cannot change")]
    TelegramIdChanged(AccountId),

    /// Backend failure (connection, decoding, ...).
    #[error("Backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Consumer-provided account persistence.
///
/// # Example
///
/// ```rust,ignore
/// impl AccountStore for MyDb {
///     async fn find_by_telegram_id(&self, id: TelegramId) -> Result<Option<Account>, StoreError> {
///         self.accounts.get(id).await.map_err(|e| StoreError::Backend(e.into()))
///     }
///     // ...
/// }
/// ```
pub trait AccountStore: Send + Sync + 'static {
    /// Look up an account by its Telegram id.
    fn find_by_telegram_id(
        &self,
        telegram_id: TelegramId,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    /// Insert a new account.
    ///
    /// Must fail with [`StoreError::Conflict`] when an account with the same
    /// Telegram id already exists.
    fn create(
        &self,
        account: NewAccount,
    ) -> impl Future<Output = Result<Account, StoreError>> + Send;

    /// Persist the profile fields of an existing account.
    ///
    /// Moderation flags (`is_active`, `is_banned`, `is_verified_seller`) and
    /// seller statistics are not written; they belong to moderation and
    /// listing workflows, and a stale snapshot must not revert them.
    fn save(&self, account: &Account) -> impl Future<Output = Result<(), StoreError>> + Send;
}
