//! Telegram Mini App launch payload (`initData`) verification.
//!
//! See <https://core.telegram.org/bots/webapps#validating-data-received-via-the-mini-app>.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::{Duration, OffsetDateTime};

use crate::account::TelegramUser;
use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

/// Key of the HMAC that derives the secret key from the bot token.
const WEB_APP_DATA: &[u8] = b"WebAppData";

/// Default maximum age of `auth_date`.
pub const DEFAULT_MAX_AGE: Duration = Duration::days(1);

const HASH_FIELD: &str = "hash";
const AUTH_DATE_FIELD: &str = "auth_date";
const USER_FIELD: &str = "user";

/// A verified launch payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct InitData {
    /// Every field except `hash`, as sent (the `user` field in its raw JSON form).
    pub fields: BTreeMap<String, String>,
    /// Parsed `user` field, if present.
    pub user: Option<TelegramUser>,
    /// `auth_date` in unix seconds, if present.
    pub auth_date: Option<i64>,
}

impl InitData {
    /// Gets a raw field value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Verifies a URL-encoded launch payload against the bot token.
///
/// # Errors
///
/// - [`Error::MissingSecret`] if `bot_token` is empty
/// - [`Error::Malformed`] if the payload is empty, has no `hash`, or carries
///   an unparsable `hash`, `auth_date` or `user`
/// - [`Error::SignatureMismatch`] if the hash does not match
/// - [`Error::Stale`] if `auth_date` is older than `max_age`
pub fn verify_init_data(
    raw: &str,
    bot_token: &str,
    max_age: Duration,
    now: OffsetDateTime,
) -> Result<InitData, Error> {
    if bot_token.is_empty() {
        return Err(Error::MissingSecret("bot token"));
    }
    if raw.is_empty() {
        return Err(Error::Malformed("empty launch payload".into()));
    }

    // Last occurrence wins for repeated keys.
    let mut fields: BTreeMap<String, String> = url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect();

    let received_hash = fields
        .remove(HASH_FIELD)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::Malformed("missing field: hash".into()))?;
    let received_hash =
        hex::decode(&received_hash).map_err(|e| Error::Malformed(format!("hash: {e}")))?;

    payload_mac(&fields, bot_token)?
        .verify_slice(&received_hash)
        .map_err(|_| Error::SignatureMismatch)?;

    let auth_date = fields
        .get(AUTH_DATE_FIELD)
        .map(|v| {
            v.parse::<i64>()
                .map_err(|e| Error::Malformed(format!("auth_date: {e}")))
        })
        .transpose()?;

    if let Some(auth_date) = auth_date.filter(|d| *d > 0) {
        let age_secs = now.unix_timestamp() - auth_date;
        if age_secs > max_age.whole_seconds() {
            return Err(Error::Stale { age_secs });
        }
    }

    let user = fields
        .get(USER_FIELD)
        .map(|v| {
            serde_json::from_str::<TelegramUser>(v)
                .map_err(|e| Error::Malformed(format!("user: {e}")))
        })
        .transpose()?;

    Ok(InitData {
        fields,
        user,
        auth_date,
    })
}

/// Computes the hex `hash` Telegram would attach to `fields`.
///
/// Any `hash` entry in `fields` is ignored.
///
/// # Errors
///
/// Returns [`Error::MissingSecret`] if `bot_token` is empty.
pub fn sign_init_data(fields: &BTreeMap<String, String>, bot_token: &str) -> Result<String, Error> {
    if bot_token.is_empty() {
        return Err(Error::MissingSecret("bot token"));
    }
    let mut fields = fields.clone();
    fields.remove(HASH_FIELD);
    let mac = payload_mac(&fields, bot_token)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// `key=value` lines sorted by key, joined with `\n`.
fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// HMAC over the data check string, keyed with the bot-token derived secret.
fn payload_mac(fields: &BTreeMap<String, String>, bot_token: &str) -> Result<HmacSha256, Error> {
    let mut secret = HmacSha256::new_from_slice(WEB_APP_DATA)
        .map_err(|e| Error::Malformed(e.to_string()))?;
    secret.update(bot_token.as_bytes());
    let secret_key = secret.finalize().into_bytes();

    let mut mac =
        HmacSha256::new_from_slice(&secret_key).map_err(|e| Error::Malformed(e.to_string()))?;
    mac.update(data_check_string(fields).as_bytes());
    Ok(mac)
}
