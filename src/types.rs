use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Telegram user identifier (numeric, assigned by Telegram).
///
/// Unique per account and immutable once the account exists.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    FromStr,
    From,
    Into,
)]
#[serde(transparent)]
pub struct TelegramId(pub i64);

impl TelegramId {
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

/// Internal account identifier (ULID format).
///
/// Opaque to clients. Carried as the `sub` claim of session tokens.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct AccountId(pub Ulid);

impl AccountId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}
