//! Marketplace account record and the pure transformations applied to it.
//!
//! Every mutation returns a new snapshot; persisting it is the caller's job
//! via [`AccountStore::save`](crate::store::AccountStore::save).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use time::OffsetDateTime;

use crate::types::{AccountId, TelegramId};

/// First name used when Telegram omits one at account creation.
pub const DEFAULT_FIRST_NAME: &str = "User";

/// City assigned to new accounts.
pub const DEFAULT_CITY: &str = "Addis Ababa";

/// Country calling code applied to local phone numbers.
const DEFAULT_COUNTRY_CODE: &str = "251";

/// Free-form JSON object stored on an account (`settings`, `metadata`).
pub type JsonMap = Map<String, JsonValue>;

/// User record embedded in a Telegram launch payload (`user` field).
///
/// Unknown fields (`allows_write_to_pm`, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TelegramUser {
    pub id: TelegramId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub is_premium: Option<bool>,
}

impl TelegramUser {
    /// Create a user with only the required `id`.
    #[must_use]
    pub fn new(id: TelegramId) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
            language_code: None,
            photo_url: None,
            is_premium: None,
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    #[must_use]
    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    #[must_use]
    pub fn with_language_code(mut self, code: impl Into<String>) -> Self {
        self.language_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_premium(mut self, premium: bool) -> Self {
        self.is_premium = Some(premium);
        self
    }
}

/// Fields for creating an account on first sight of a Telegram identity.
///
/// Passed to [`AccountStore::create`](crate::store::AccountStore::create).
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub telegram_id: TelegramId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub photo_url: Option<String>,
    pub is_premium: bool,
    pub created_at: OffsetDateTime,
}

impl NewAccount {
    /// Build creation fields from a verified launch-payload user.
    #[must_use]
    pub fn from_telegram(user: &TelegramUser, now: OffsetDateTime) -> Self {
        Self {
            telegram_id: user.id,
            username: user.username.clone(),
            first_name: user
                .first_name
                .clone()
                .unwrap_or_else(|| DEFAULT_FIRST_NAME.to_string()),
            last_name: user.last_name.clone(),
            language_code: user.language_code.clone(),
            photo_url: user.photo_url.clone(),
            is_premium: user.is_premium.unwrap_or(false),
            created_at: now,
        }
    }

    /// Materialize the account under the given id with column defaults.
    #[must_use]
    pub fn into_account(self, id: AccountId) -> Account {
        Account {
            id,
            telegram_id: self.telegram_id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            language_code: self.language_code,
            photo_url: self.photo_url,
            is_premium: self.is_premium,
            phone: None,
            is_phone_verified: false,
            phone_verified_at: None,
            city: DEFAULT_CITY.to_string(),
            area: None,
            is_verified_seller: false,
            rating: 0.0,
            total_ratings: 0,
            total_sales: 0,
            total_listings: 0,
            settings: JsonMap::new(),
            metadata: JsonMap::new(),
            is_active: true,
            is_banned: false,
            created_at: self.created_at,
            updated_at: self.created_at,
            last_seen_at: None,
        }
    }
}

/// A marketplace participant.
///
/// Moderation flags (`is_active`, `is_banned`, `is_verified_seller`) and
/// seller statistics are maintained outside the auth flow. Stores leave them
/// untouched on [`save`](crate::store::AccountStore::save).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub telegram_id: TelegramId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub photo_url: Option<String>,
    pub is_premium: bool,
    pub phone: Option<String>,
    pub is_phone_verified: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub phone_verified_at: Option<OffsetDateTime>,
    pub city: String,
    pub area: Option<String>,
    pub is_verified_seller: bool,
    /// Average seller rating, `0.0` until rated.
    pub rating: f64,
    pub total_ratings: i32,
    pub total_sales: i32,
    pub total_listings: i32,
    pub settings: JsonMap,
    pub metadata: JsonMap,
    pub is_active: bool,
    pub is_banned: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen_at: Option<OffsetDateTime>,
}

impl Account {
    /// First name, else username, else [`DEFAULT_FIRST_NAME`].
    #[must_use]
    pub fn short_name(&self) -> &str {
        if !self.first_name.is_empty() {
            return &self.first_name;
        }
        self.username.as_deref().unwrap_or(DEFAULT_FIRST_NAME)
    }

    /// Name shown to other users: "First Last" when both parts are known,
    /// otherwise [`short_name`](Self::short_name).
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !self.first_name.is_empty() && !last.is_empty() => {
                format!("{} {last}", self.first_name)
            }
            _ => self.short_name().to_string(),
        }
    }

    /// Overwrite Telegram-owned profile fields and stamp `last_seen_at`.
    ///
    /// Absent optional fields clear the stored value; an absent first name
    /// keeps the stored one.
    #[must_use]
    pub fn refreshed_from(&self, user: &TelegramUser, now: OffsetDateTime) -> Self {
        Self {
            username: user.username.clone(),
            first_name: user
                .first_name
                .clone()
                .unwrap_or_else(|| self.first_name.clone()),
            last_name: user.last_name.clone(),
            language_code: user.language_code.clone(),
            photo_url: user.photo_url.clone(),
            is_premium: user.is_premium.unwrap_or(false),
            last_seen_at: Some(now),
            updated_at: now,
            ..self.clone()
        }
    }

    /// Merge `incoming` into the stored settings.
    #[must_use]
    pub fn with_settings_merged(&self, incoming: &JsonMap, now: OffsetDateTime) -> Self {
        Self {
            settings: merge_settings(&self.settings, incoming),
            updated_at: now,
            ..self.clone()
        }
    }

    /// Update marketplace location. Empty or absent values leave the field as is.
    #[must_use]
    pub fn with_location(
        &self,
        city: Option<&str>,
        area: Option<&str>,
        now: OffsetDateTime,
    ) -> Self {
        let mut next = self.clone();
        if let Some(city) = city.filter(|c| !c.is_empty()) {
            next.city = city.to_string();
        }
        if let Some(area) = area.filter(|a| !a.is_empty()) {
            next.area = Some(area.to_string());
        }
        next.updated_at = now;
        next
    }

    /// Record a phone number shared through Telegram as verified.
    #[must_use]
    pub fn with_verified_phone(&self, raw_phone: &str, now: OffsetDateTime) -> Self {
        Self {
            phone: Some(normalize_phone(raw_phone)),
            is_phone_verified: true,
            phone_verified_at: Some(now),
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Shallow merge of two settings objects. Keys in `incoming` win.
#[must_use]
pub fn merge_settings(current: &JsonMap, incoming: &JsonMap) -> JsonMap {
    let mut merged = current.clone();
    for (key, value) in incoming {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Normalize a phone number to international form, assuming Ethiopia for
/// local numbers.
///
/// - `"0911 234-567"` → `"+251911234567"`
/// - `"251911234567"` → `"+251911234567"`
/// - `"911234567"` → `"+251911234567"`
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    let phone: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();

    if phone.starts_with('+') {
        phone
    } else if let Some(local) = phone.strip_prefix('0') {
        format!("+{DEFAULT_COUNTRY_CODE}{local}")
    } else if phone.starts_with(DEFAULT_COUNTRY_CODE) {
        format!("+{phone}")
    } else {
        format!("+{DEFAULT_COUNTRY_CODE}{phone}")
    }
}
