use std::sync::Arc;

use time::OffsetDateTime;

use crate::account::{Account, NewAccount, TelegramUser};
use crate::error::Error;
use crate::store::{AccountStore, StoreError};
use crate::types::TelegramId;

/// Maps verified Telegram identities to stored accounts.
///
/// Banned accounts are returned like any other; rejecting them is up to the caller.
pub struct IdentityResolver<S> {
    store: Arc<S>,
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for IdentityResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: AccountStore> IdentityResolver<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lookup only. Never creates or refreshes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] when no account exists, or
    /// [`Error::Store`] on backend failure.
    pub async fn find(&self, telegram_id: TelegramId) -> Result<Account, Error> {
        self.store
            .find_by_telegram_id(telegram_id)
            .await?
            .ok_or(Error::AccountNotFound)
    }

    /// Return the account for `telegram_id`, creating it from `fresh` if absent.
    ///
    /// When `fresh` is given and the account already exists, its Telegram
    /// profile fields are overwritten and `last_seen_at` is stamped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] when the account is absent and no
    /// user data was supplied, or [`Error::Store`] on backend failure.
    pub async fn resolve(
        &self,
        telegram_id: TelegramId,
        fresh: Option<&TelegramUser>,
        now: OffsetDateTime,
    ) -> Result<Account, Error> {
        let existing = match self.store.find_by_telegram_id(telegram_id).await? {
            Some(account) => account,
            None => {
                let user = fresh.ok_or(Error::AccountNotFound)?;
                match self.store.create(NewAccount::from_telegram(user, now)).await {
                    Ok(account) => {
                        tracing::info!(
                            account_id = %account.id,
                            telegram_id = %telegram_id,
                            "Account created"
                        );
                        return Ok(account);
                    }
                    Err(StoreError::Conflict) => {
                        // Lost a creation race; the winner's row is authoritative.
                        tracing::debug!(telegram_id = %telegram_id, "Account creation raced, resolving by lookup");
                        self.find(telegram_id).await?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let Some(user) = fresh else {
            return Ok(existing);
        };

        let refreshed = existing.refreshed_from(user, now);
        self.store.save(&refreshed).await?;
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::store::MemoryAccountStore;
    use crate::types::AccountId;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_760_000_000).unwrap()
    }

    fn resolver() -> IdentityResolver<MemoryAccountStore> {
        IdentityResolver::new(Arc::new(MemoryAccountStore::new()))
    }

    fn user(id: i64) -> TelegramUser {
        TelegramUser::new(TelegramId(id))
            .with_username("selam")
            .with_first_name("Selam")
            .with_language_code("am")
    }

    #[tokio::test]
    async fn first_sight_creates_account() {
        let resolver = resolver();
        let account = resolver
            .resolve(TelegramId(11), Some(&user(11)), now())
            .await
            .unwrap();

        assert_eq!(account.telegram_id, TelegramId(11));
        assert_eq!(account.first_name, "Selam");
        assert_eq!(account.created_at, now());
        assert_eq!(resolver.store().len().await, 1);
    }

    #[tokio::test]
    async fn first_sight_without_user_data_is_not_found() {
        let resolver = resolver();
        let err = resolver.resolve(TelegramId(11), None, now()).await.unwrap_err();
        assert!(matches!(err, Error::AccountNotFound));
        assert!(resolver.store().is_empty().await);
    }

    #[tokio::test]
    async fn second_sight_refreshes_profile() {
        let resolver = resolver();
        let created = resolver
            .resolve(TelegramId(11), Some(&user(11)), now())
            .await
            .unwrap();

        let later = now() + Duration::hours(2);
        let changed = TelegramUser::new(TelegramId(11))
            .with_first_name("Selamawit")
            .with_photo_url("https://t.me/i/userpic/new.jpg");
        let refreshed = resolver
            .resolve(TelegramId(11), Some(&changed), later)
            .await
            .unwrap();

        assert_eq!(refreshed.id, created.id);
        assert_eq!(refreshed.first_name, "Selamawit");
        assert_eq!(refreshed.username, None);
        assert_eq!(refreshed.last_seen_at, Some(later));

        let stored = resolver.find(TelegramId(11)).await.unwrap();
        assert_eq!(stored, refreshed);
        assert_eq!(resolver.store().len().await, 1);
    }

    #[tokio::test]
    async fn lookup_without_user_data_does_not_refresh() {
        let resolver = resolver();
        let created = resolver
            .resolve(TelegramId(11), Some(&user(11)), now())
            .await
            .unwrap();

        let found = resolver
            .resolve(TelegramId(11), None, now() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn find_misses_are_not_found() {
        let err = resolver().find(TelegramId(404)).await.unwrap_err();
        assert!(matches!(err, Error::AccountNotFound));
    }

    #[tokio::test]
    async fn banned_accounts_are_still_resolved() {
        let resolver = resolver();
        resolver
            .resolve(TelegramId(11), Some(&user(11)), now())
            .await
            .unwrap();
        resolver
            .store()
            .set_banned(TelegramId(11), true)
            .await
            .unwrap();

        let resolved = resolver
            .resolve(TelegramId(11), Some(&user(11)), now())
            .await
            .unwrap();
        assert!(resolved.is_banned);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_sight_creates_one_account() {
        let resolver = resolver();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move {
                    resolver
                        .resolve(TelegramId(77), Some(&user(77)), now())
                        .await
                })
            })
            .collect();

        let mut ids: Vec<AccountId> = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap().id);
        }

        assert_eq!(resolver.store().len().await, 1);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    /// Store whose lookups always miss, so every create races an existing row.
    struct RacingStore {
        inner: MemoryAccountStore,
    }

    impl AccountStore for RacingStore {
        async fn find_by_telegram_id(
            &self,
            telegram_id: TelegramId,
        ) -> Result<Option<Account>, StoreError> {
            // First lookup misses; the retry after Conflict sees the row.
            if self.inner.is_empty().await {
                return Ok(None);
            }
            self.inner.find_by_telegram_id(telegram_id).await
        }

        async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
            // Simulate another request winning the insert.
            let winner = NewAccount {
                first_name: "Winner".into(),
                ..account
            };
            self.inner.create(winner).await?;
            Err(StoreError::Conflict)
        }

        async fn save(&self, account: &Account) -> Result<(), StoreError> {
            self.inner.save(account).await
        }
    }

    #[tokio::test]
    async fn conflict_on_create_resolves_by_lookup() {
        let resolver = IdentityResolver::new(Arc::new(RacingStore {
            inner: MemoryAccountStore::new(),
        }));

        let account = resolver
            .resolve(TelegramId(5), Some(&user(5)), now())
            .await
            .unwrap();

        // The winner's row is refreshed with this request's payload.
        assert_eq!(account.first_name, "Selam");
        assert_eq!(account.last_seen_at, Some(now()));
        assert_eq!(resolver.store().inner.len().await, 1);
    }

    #[tokio::test]
    async fn backend_failures_propagate() {
        struct FailingStore;

        impl AccountStore for FailingStore {
            async fn find_by_telegram_id(
                &self,
                _telegram_id: TelegramId,
            ) -> Result<Option<Account>, StoreError> {
                Err(StoreError::Backend("connection refused".into()))
            }

            async fn create(&self, _account: NewAccount) -> Result<Account, StoreError> {
                Err(StoreError::Backend("connection refused".into()))
            }

            async fn save(&self, _account: &Account) -> Result<(), StoreError> {
                Err(StoreError::Backend("connection refused".into()))
            }
        }

        let resolver = IdentityResolver::new(Arc::new(FailingStore));
        let err = resolver
            .resolve(TelegramId(5), Some(&user(5)), now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Backend(_))));
    }
}
