use sqlx::PgPool;
use sqlx::types::Json;
use time::OffsetDateTime;
use ulid::Ulid;

use super::{AccountStore, StoreError};
use crate::account::{Account, JsonMap, NewAccount};
use crate::types::{AccountId, TelegramId};

const ACCOUNT_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, language_code, \
     photo_url, is_premium, phone, is_phone_verified, phone_verified_at, city, area, \
     is_verified_seller, rating, total_ratings, total_sales, total_listings, settings, metadata, \
     is_active, is_banned, created_at, updated_at, last_seen_at";

/// Postgres-backed [`AccountStore`] over the `users` table.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Set or clear the ban flag. Returns `false` if no account has this Telegram id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on query failure.
    pub async fn set_banned(
        &self,
        telegram_id: TelegramId,
        banned: bool,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET is_banned = $2, updated_at = now() WHERE telegram_id = $1",
        )
        .bind(telegram_id.get())
        .bind(banned)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(Box::new(e)))
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    telegram_id: i64,
    username: Option<String>,
    first_name: String,
    last_name: Option<String>,
    language_code: Option<String>,
    photo_url: Option<String>,
    is_premium: bool,
    phone: Option<String>,
    is_phone_verified: bool,
    phone_verified_at: Option<OffsetDateTime>,
    city: String,
    area: Option<String>,
    is_verified_seller: bool,
    rating: f64,
    total_ratings: i32,
    total_sales: i32,
    total_listings: i32,
    settings: Json<JsonMap>,
    metadata: Json<JsonMap>,
    is_active: bool,
    is_banned: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    last_seen_at: Option<OffsetDateTime>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let id = Ulid::from_string(&row.id).map_err(|e| StoreError::Backend(Box::new(e)))?;
        Ok(Self {
            id: AccountId(id),
            telegram_id: TelegramId(row.telegram_id),
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            language_code: row.language_code,
            photo_url: row.photo_url,
            is_premium: row.is_premium,
            phone: row.phone,
            is_phone_verified: row.is_phone_verified,
            phone_verified_at: row.phone_verified_at,
            city: row.city,
            area: row.area,
            is_verified_seller: row.is_verified_seller,
            rating: row.rating,
            total_ratings: row.total_ratings,
            total_sales: row.total_sales,
            total_listings: row.total_listings,
            settings: row.settings.0,
            metadata: row.metadata.0,
            is_active: row.is_active,
            is_banned: row.is_banned,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_seen_at: row.last_seen_at,
        })
    }
}

fn backend_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict;
        }
    }
    StoreError::Backend(Box::new(e))
}

impl AccountStore for PgAccountStore {
    async fn find_by_telegram_id(
        &self,
        telegram_id: TelegramId,
    ) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE telegram_id = $1");
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(telegram_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)?
            .map(Account::try_from)
            .transpose()
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let id = AccountId::generate();
        let template = account.into_account(id);
        let sql = format!(
            "INSERT INTO users (id, telegram_id, username, first_name, last_name, language_code, \
             photo_url, is_premium, city, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10) \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id.to_string())
            .bind(template.telegram_id.get())
            .bind(&template.username)
            .bind(&template.first_name)
            .bind(&template.last_name)
            .bind(&template.language_code)
            .bind(&template.photo_url)
            .bind(template.is_premium)
            .bind(&template.city)
            .bind(template.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(backend_error)?;
        Account::try_from(row)
    }

    async fn save(&self, account: &Account) -> Result<(), StoreError> {
        // Moderation flags and seller stats are owned elsewhere and left as stored.
        let result = sqlx::query(
            "UPDATE users SET username = $3, first_name = $4, last_name = $5, \
             language_code = $6, photo_url = $7, is_premium = $8, phone = $9, \
             is_phone_verified = $10, phone_verified_at = $11, city = $12, area = $13, \
             settings = $14, metadata = $15, updated_at = $16, last_seen_at = $17 \
             WHERE id = $1 AND telegram_id = $2",
        )
        .bind(account.id.to_string())
        .bind(account.telegram_id.get())
        .bind(&account.username)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.language_code)
        .bind(&account.photo_url)
        .bind(account.is_premium)
        .bind(&account.phone)
        .bind(account.is_phone_verified)
        .bind(account.phone_verified_at)
        .bind(&account.city)
        .bind(&account.area)
        .bind(Json(&account.settings))
        .bind(Json(&account.metadata))
        .bind(account.updated_at)
        .bind(account.last_seen_at)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        if result.rows_affected() == 0 {
            // Either the id is unknown or the Telegram id differs from the stored one.
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT telegram_id FROM users WHERE id = $1")
                    .bind(account.id.to_string())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(backend_error)?;
            return Err(match exists {
                Some(_) => StoreError::TelegramIdChanged(account.id),
                None => StoreError::Missing(account.id),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::TelegramUser;

    fn new_account(id: i64) -> NewAccount {
        NewAccount::from_telegram(
            &TelegramUser::new(TelegramId(id)).with_first_name("Meron"),
            OffsetDateTime::from_unix_timestamp(1_760_000_000).unwrap(),
        )
    }

    #[sqlx::test]
    async fn duplicate_telegram_id_is_conflict(pool: PgPool) {
        let store = PgAccountStore::new(pool);
        store.create(new_account(7)).await.unwrap();

        let err = store.create(new_account(7)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[sqlx::test]
    async fn create_applies_column_defaults(pool: PgPool) {
        let store = PgAccountStore::new(pool);
        let created = store.create(new_account(8)).await.unwrap();

        assert_eq!(created.city, crate::account::DEFAULT_CITY);
        assert_eq!(created.rating, 0.0);
        assert_eq!(created.total_listings, 0);
        assert!(created.is_active);

        let found = store.find_by_telegram_id(TelegramId(8)).await.unwrap();
        assert_eq!(found, Some(created));
    }

    #[sqlx::test]
    async fn save_does_not_revert_ban(pool: PgPool) {
        let store = PgAccountStore::new(pool);
        let snapshot = store.create(new_account(9)).await.unwrap();
        assert!(store.set_banned(TelegramId(9), true).await.unwrap());

        let mut stale = snapshot.clone();
        stale.city = "Bahir Dar".into();
        store.save(&stale).await.unwrap();

        let found = store.find_by_telegram_id(TelegramId(9)).await.unwrap().unwrap();
        assert_eq!(found.city, "Bahir Dar");
        assert!(found.is_banned);
    }

    #[sqlx::test]
    async fn save_errors(pool: PgPool) {
        let store = PgAccountStore::new(pool);
        let unknown = new_account(10).into_account(AccountId::generate());
        assert!(matches!(store.save(&unknown).await, Err(StoreError::Missing(_))));

        let mut moved = store.create(new_account(11)).await.unwrap();
        moved.telegram_id = TelegramId(12);
        assert!(matches!(
            store.save(&moved).await,
            Err(StoreError::TelegramIdChanged(_))
        ));
    }
}
