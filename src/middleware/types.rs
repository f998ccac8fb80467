use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::account::{Account, JsonMap};
use crate::config::AuthConfig;
use crate::types::{AccountId, TelegramId};

/// Body of `POST {prefix}/auth/telegram`.
#[derive(Debug, Deserialize)]
pub struct TelegramAuthRequest {
    pub init_data: String,
}

/// Successful login: session token plus the account profile.
#[derive(Debug, Serialize, Deserialize)]
pub struct TelegramAuthResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub user: AccountResponse,
}

/// Account profile as returned to the owning user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: AccountId,
    pub telegram_id: TelegramId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub is_premium: bool,
    pub language_code: Option<String>,
    pub phone: Option<String>,
    pub is_phone_verified: bool,
    pub city: String,
    pub area: Option<String>,
    pub is_verified_seller: bool,
    pub rating: f64,
    pub total_sales: i32,
    pub total_listings: i32,
    pub settings: JsonMap,
    pub is_admin: bool,
}

impl AccountResponse {
    #[must_use]
    pub fn new(account: &Account, config: &AuthConfig) -> Self {
        Self {
            id: account.id,
            telegram_id: account.telegram_id,
            username: account.username.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            display_name: account.display_name(),
            photo_url: account.photo_url.clone(),
            is_premium: account.is_premium,
            language_code: account.language_code.clone(),
            phone: account.phone.clone(),
            is_phone_verified: account.is_phone_verified,
            city: account.city.clone(),
            area: account.area.clone(),
            is_verified_seller: account.is_verified_seller,
            rating: account.rating,
            total_sales: account.total_sales,
            total_listings: account.total_listings,
            settings: account.settings.clone(),
            is_admin: config.is_admin(account.telegram_id),
        }
    }
}

/// Body of `PATCH {prefix}/users/me`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
}

/// Body of `PATCH {prefix}/users/me/settings`.
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: JsonMap,
}

/// Body of `POST {prefix}/users/me/verify-phone`.
#[derive(Debug, Deserialize)]
pub struct VerifyPhoneRequest {
    pub phone_number: String,
}
