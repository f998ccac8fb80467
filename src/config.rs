use rand::Rng;
use time::Duration;

use crate::error::Error;
use crate::init_data::DEFAULT_MAX_AGE;
use crate::token::TokenAlgorithm;
use crate::types::TelegramId;

/// Default session token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::days(7);

/// Authentication configuration.
///
/// Required fields (`bot_token`, `signing_secret`) are constructor
/// parameters. Everything else has a default and a `with_*` override.
/// The value is immutable once handed to [`AuthGate`](crate::AuthGate).
#[derive(Clone)]
pub struct AuthConfig {
    pub(crate) bot_token: String,
    pub(crate) signing_secret: Vec<u8>,
    pub(crate) algorithm: TokenAlgorithm,
    pub(crate) token_ttl: Duration,
    pub(crate) init_data_max_age: Duration,
    pub(crate) admin_ids: Vec<TelegramId>,
    pub(crate) api_prefix: String,
}

impl AuthConfig {
    /// Create config with the Telegram bot token and the session signing secret.
    #[must_use]
    pub fn new(bot_token: impl Into<String>, signing_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            bot_token: bot_token.into(),
            signing_secret: signing_secret.into(),
            algorithm: TokenAlgorithm::default(),
            token_ttl: DEFAULT_TOKEN_TTL,
            init_data_max_age: DEFAULT_MAX_AGE,
            admin_ids: Vec::new(),
            api_prefix: "/api/v1".into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `TELEGRAM_BOT_TOKEN`: bot token issued by @BotFather
    ///
    /// # Optional env vars
    /// - `SESSION_SECRET`: session signing secret. When unset an ephemeral
    ///   random secret is used and tokens do not survive a restart.
    /// - `SESSION_ALGORITHM`: `HS256` (default) or `v4.local`
    /// - `SESSION_TTL_MINUTES`: token lifetime (default 7 days)
    /// - `INIT_DATA_MAX_AGE_SECS`: maximum `auth_date` age (default 86400)
    /// - `ADMIN_TELEGRAM_IDS`: comma-separated Telegram ids
    /// - `API_PREFIX`: route prefix (default `/api/v1`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required vars are missing or values do not parse.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required vars are missing or values do not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Config("TELEGRAM_BOT_TOKEN is required".into()))?;

        let signing_secret = match lookup("SESSION_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret.into_bytes(),
            None => {
                tracing::warn!("SESSION_SECRET is not set, using an ephemeral signing secret");
                let bytes: [u8; 32] = rand::rng().random();
                bytes.to_vec()
            }
        };

        let mut config = Self::new(bot_token, signing_secret);

        if let Some(alg) = lookup("SESSION_ALGORITHM") {
            let alg: TokenAlgorithm = alg
                .parse()
                .map_err(|e| Error::Config(format!("SESSION_ALGORITHM: {e}")))?;
            config = config.with_algorithm(alg);
        }
        if let Some(minutes) = lookup("SESSION_TTL_MINUTES") {
            let seconds = minutes
                .trim()
                .parse::<i64>()
                .map_err(|e| Error::Config(format!("SESSION_TTL_MINUTES: {e}")))?
                .checked_mul(60)
                .ok_or_else(|| Error::Config("SESSION_TTL_MINUTES: out of range".into()))?;
            config = config.with_token_ttl(Duration::seconds(seconds));
        }
        if let Some(secs) = lookup("INIT_DATA_MAX_AGE_SECS") {
            let secs: i64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("INIT_DATA_MAX_AGE_SECS: {e}")))?;
            config = config.with_init_data_max_age(Duration::seconds(secs));
        }
        if let Some(ids) = lookup("ADMIN_TELEGRAM_IDS") {
            let ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<TelegramId>()
                        .map_err(|e| Error::Config(format!("ADMIN_TELEGRAM_IDS: {s}: {e}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            config = config.with_admin_ids(ids);
        }
        if let Some(prefix) = lookup("API_PREFIX") {
            config = config.with_api_prefix(prefix);
        }

        if config.token_ttl <= Duration::ZERO {
            return Err(Error::Config("SESSION_TTL_MINUTES must be positive".into()));
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: TokenAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_init_data_max_age(mut self, max_age: Duration) -> Self {
        self.init_data_max_age = max_age;
        self
    }

    #[must_use]
    pub fn with_admin_ids(mut self, ids: Vec<TelegramId>) -> Self {
        self.admin_ids = ids;
        self
    }

    #[must_use]
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn algorithm(&self) -> TokenAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    #[must_use]
    pub fn init_data_max_age(&self) -> Duration {
        self.init_data_max_age
    }

    #[must_use]
    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// Whether the Telegram id is a configured administrator.
    #[must_use]
    pub fn is_admin(&self, telegram_id: TelegramId) -> bool {
        self.admin_ids.contains(&telegram_id)
    }
}
