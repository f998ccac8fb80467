use std::sync::Arc;

use time::OffsetDateTime;

use crate::account::Account;
use crate::config::AuthConfig;
use crate::error::{AuthError, Error};
use crate::init_data::verify_init_data;
use crate::resolver::IdentityResolver;
use crate::store::AccountStore;
use crate::token::{IssuedToken, SessionIssuer, SessionSubject};

/// Credentials presented by one request.
///
/// `bearer` is the token from `Authorization: Bearer <token>`, `init_data`
/// the raw `X-Init-Data` header value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    pub bearer: Option<&'a str>,
    pub init_data: Option<&'a str>,
}

/// Request-time authentication.
///
/// A bearer token takes priority over a launch payload. A present but
/// invalid token does not fall back to the payload.
pub struct AuthGate<S> {
    config: AuthConfig,
    issuer: SessionIssuer,
    resolver: IdentityResolver<S>,
}

impl<S: AccountStore> AuthGate<S> {
    /// # Errors
    ///
    /// Returns [`Error::MissingSecret`] or [`Error::Config`] if the signing
    /// settings are unusable, or [`Error::MissingSecret`] if the bot token is empty.
    pub fn new(config: AuthConfig, store: Arc<S>) -> Result<Self, Error> {
        if config.bot_token.is_empty() {
            return Err(Error::MissingSecret("bot token"));
        }
        let issuer = SessionIssuer::new(&config)?;
        Ok(Self {
            config,
            issuer,
            resolver: IdentityResolver::new(store),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn issuer(&self) -> &SessionIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn resolver(&self) -> &IdentityResolver<S> {
        &self.resolver
    }

    #[must_use]
    pub fn store(&self) -> &S {
        self.resolver.store()
    }

    /// Authorize a request and return the acting account.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Unauthenticated`] if no credential is present or it fails verification
    /// - [`AuthError::Forbidden`] if the account is banned
    /// - [`AuthError::Store`] on account store failure
    pub async fn authenticate(
        &self,
        credentials: Credentials<'_>,
        now: OffsetDateTime,
    ) -> Result<Account, AuthError> {
        let account = if let Some(token) = credentials.bearer {
            self.authenticate_token(token, now).await?
        } else if let Some(raw) = credentials.init_data {
            self.authenticate_init_data(raw, now).await?
        } else {
            tracing::debug!("No credentials supplied");
            return Err(AuthError::Unauthenticated);
        };
        ensure_not_banned(account)
    }

    /// Exchange a launch payload for a session token.
    ///
    /// # Errors
    ///
    /// Same as [`authenticate`](Self::authenticate), plus
    /// [`AuthError::Internal`] if the token cannot be issued.
    pub async fn login(
        &self,
        init_data: &str,
        now: OffsetDateTime,
    ) -> Result<(Account, IssuedToken), AuthError> {
        let account = ensure_not_banned(self.authenticate_init_data(init_data, now).await?)?;

        let subject = SessionSubject {
            account_id: account.id,
            telegram_id: account.telegram_id,
        };
        let token = self.issuer.issue(&subject, now).map_err(|e| {
            tracing::error!(error = %e, "Session token issuance failed");
            AuthError::Internal("token issuance failed".into())
        })?;

        tracing::info!(
            account_id = %account.id,
            telegram_id = %account.telegram_id,
            "Telegram login successful"
        );
        Ok((account, token))
    }

    async fn authenticate_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Account, AuthError> {
        let claims = self.issuer.verify(token, now).map_err(|e| {
            tracing::debug!(reason = %e, "Session token rejected");
            AuthError::Unauthenticated
        })?;

        self.resolver
            .find(claims.telegram_id)
            .await
            .map_err(resolution_error)
    }

    async fn authenticate_init_data(
        &self,
        raw: &str,
        now: OffsetDateTime,
    ) -> Result<Account, AuthError> {
        let data = verify_init_data(
            raw,
            &self.config.bot_token,
            self.config.init_data_max_age,
            now,
        )
        .map_err(|e| {
            tracing::warn!(reason = %e, "Launch payload rejected");
            AuthError::Unauthenticated
        })?;

        let Some(user) = data.user else {
            tracing::warn!("Launch payload has no user");
            return Err(AuthError::Unauthenticated);
        };

        self.resolver
            .resolve(user.id, Some(&user), now)
            .await
            .map_err(resolution_error)
    }
}

fn ensure_not_banned(account: Account) -> Result<Account, AuthError> {
    if account.is_banned {
        tracing::warn!(account_id = %account.id, "Banned account rejected");
        return Err(AuthError::Forbidden);
    }
    Ok(account)
}

fn resolution_error(e: Error) -> AuthError {
    match e {
        Error::Store(e) => {
            tracing::error!(error = %e, "Account resolution failed");
            AuthError::Store(e)
        }
        other => {
            tracing::debug!(reason = %other, "Account resolution rejected");
            AuthError::Unauthenticated
        }
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::account::TelegramUser;
    use crate::init_data::tests::{BOT_TOKEN, signed_payload};
    use crate::store::MemoryAccountStore;
    use crate::token::TokenAlgorithm;
    use crate::types::TelegramId;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(OffsetDateTime::now_utc().unix_timestamp()).unwrap()
    }

    fn gate() -> AuthGate<MemoryAccountStore> {
        gate_with(TokenAlgorithm::Hs256)
    }

    fn gate_with(algorithm: TokenAlgorithm) -> AuthGate<MemoryAccountStore> {
        let config = AuthConfig::new(BOT_TOKEN, "gate-secret").with_algorithm(algorithm);
        AuthGate::new(config, Arc::new(MemoryAccountStore::new())).unwrap()
    }

    fn user_json(id: i64, first_name: &str, photo: &str) -> String {
        serde_json::json!({
            "id": id,
            "first_name": first_name,
            "username": "tigist",
            "language_code": "am",
            "photo_url": photo,
        })
        .to_string()
    }

    fn payload(id: i64, first_name: &str, photo: &str, now: OffsetDateTime) -> String {
        let auth_date = now.unix_timestamp().to_string();
        let user = user_json(id, first_name, photo);
        signed_payload(
            &[("auth_date", &auth_date), ("query_id", "AAH"), ("user", &user)],
            BOT_TOKEN,
        )
    }

    fn bearer(token: &str) -> Credentials<'_> {
        Credentials {
            bearer: Some(token),
            init_data: None,
        }
    }

    fn init_data(raw: &str) -> Credentials<'_> {
        Credentials {
            bearer: None,
            init_data: Some(raw),
        }
    }

    async fn ban(gate: &AuthGate<MemoryAccountStore>, id: i64) {
        gate.store().set_banned(TelegramId(id), true).await.unwrap();
    }

    #[tokio::test]
    async fn no_credentials_is_unauthenticated() {
        let err = gate()
            .authenticate(Credentials::default(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn payload_path_creates_account() {
        let gate = gate();
        let raw = payload(501, "Tigist", "https://t.me/a.jpg", now());

        let account = gate.authenticate(init_data(&raw), now()).await.unwrap();

        assert_eq!(account.telegram_id, TelegramId(501));
        assert_eq!(account.first_name, "Tigist");
        assert_eq!(gate.store().len().await, 1);
    }

    #[tokio::test]
    async fn invalid_payload_is_unauthenticated() {
        let gate = gate();
        let raw = payload(501, "Tigist", "https://t.me/a.jpg", now()).replace("AAH", "AAX");

        let err = gate.authenticate(init_data(&raw), now()).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
        assert!(gate.store().is_empty().await);
    }

    #[tokio::test]
    async fn payload_without_user_is_unauthenticated() {
        let auth_date = now().unix_timestamp().to_string();
        let raw = signed_payload(&[("auth_date", &auth_date)], BOT_TOKEN);

        let err = gate().authenticate(init_data(&raw), now()).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn stale_payload_is_unauthenticated() {
        let issued = now() - Duration::days(2);
        let raw = payload(501, "Tigist", "https://t.me/a.jpg", issued);

        let err = gate().authenticate(init_data(&raw), now()).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn token_path_resolves_without_refresh() {
        for alg in [TokenAlgorithm::Hs256, TokenAlgorithm::PasetoV4Local] {
            let gate = gate_with(alg);
            let now = now();
            let raw = payload(502, "Tigist", "https://t.me/a.jpg", now);
            let (created, issued) = gate.login(&raw, now).await.unwrap();

            let account = gate
                .authenticate(bearer(&issued.token), now + Duration::minutes(5))
                .await
                .unwrap();

            assert_eq!(account, created);
        }
    }

    #[tokio::test]
    async fn token_path_never_mutates_profile() {
        let gate = gate();
        let now = now();
        let (_, issued) = gate
            .login(&payload(503, "Tigist", "https://t.me/a.jpg", now), now)
            .await
            .unwrap();

        // Profile changed on Telegram's side, but only a token is presented.
        let mut stored = gate.resolver().find(TelegramId(503)).await.unwrap();
        stored.photo_url = Some("https://t.me/old.jpg".into());
        gate.store().save(&stored).await.unwrap();

        let account = gate.authenticate(bearer(&issued.token), now).await.unwrap();
        assert_eq!(account.photo_url.as_deref(), Some("https://t.me/old.jpg"));
        assert_eq!(account, stored);
    }

    #[tokio::test]
    async fn payload_path_always_refreshes_profile() {
        let gate = gate();
        let now = now();
        gate.authenticate(init_data(&payload(504, "Tigist", "https://t.me/a.jpg", now)), now)
            .await
            .unwrap();

        let later = now + Duration::minutes(1);
        let account = gate
            .authenticate(
                init_data(&payload(504, "Tigi", "https://t.me/b.jpg", later)),
                later,
            )
            .await
            .unwrap();

        assert_eq!(account.first_name, "Tigi");
        assert_eq!(account.photo_url.as_deref(), Some("https://t.me/b.jpg"));
        assert_eq!(account.last_seen_at, Some(later));
        assert_eq!(gate.store().len().await, 1);
    }

    #[tokio::test]
    async fn token_for_missing_account_is_unauthenticated() {
        let gate = gate();
        let subject = SessionSubject {
            account_id: crate::types::AccountId::generate(),
            telegram_id: TelegramId(999),
        };
        let issued = gate.issuer().issue(&subject, now()).unwrap();

        let err = gate
            .authenticate(bearer(&issued.token), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
        assert!(gate.store().is_empty().await);
    }

    #[tokio::test]
    async fn invalid_token_does_not_fall_back_to_payload() {
        let gate = gate();
        let raw = payload(505, "Tigist", "https://t.me/a.jpg", now());
        let credentials = Credentials {
            bearer: Some("garbage"),
            init_data: Some(&raw),
        };

        let err = gate.authenticate(credentials, now()).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
        assert!(gate.store().is_empty().await);
    }

    #[tokio::test]
    async fn expired_token_is_unauthenticated() {
        let gate = gate();
        let now = now();
        let (_, issued) = gate
            .login(&payload(506, "Tigist", "https://t.me/a.jpg", now), now)
            .await
            .unwrap();

        let err = gate
            .authenticate(bearer(&issued.token), now + Duration::days(8))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn banned_account_is_forbidden_on_both_paths() {
        let gate = gate();
        let now = now();
        let raw = payload(507, "Tigist", "https://t.me/a.jpg", now);
        let (_, issued) = gate.login(&raw, now).await.unwrap();
        ban(&gate, 507).await;

        let by_token = gate.authenticate(bearer(&issued.token), now).await.unwrap_err();
        let by_payload = gate.authenticate(init_data(&raw), now).await.unwrap_err();
        let by_login = gate.login(&raw, now).await.unwrap_err();

        assert!(matches!(by_token, AuthError::Forbidden));
        assert!(matches!(by_payload, AuthError::Forbidden));
        assert!(matches!(by_login, AuthError::Forbidden));
    }

    #[tokio::test]
    async fn login_token_carries_account_claims() {
        let gate = gate();
        let now = now();
        let (account, issued) = gate
            .login(&payload(508, "Tigist", "https://t.me/a.jpg", now), now)
            .await
            .unwrap();

        let claims = gate.issuer().verify(&issued.token, now).unwrap();
        assert_eq!(claims.sub, account.id);
        assert_eq!(claims.telegram_id, account.telegram_id);
        assert_eq!(issued.expires_at, now + Duration::days(7));
    }

    #[tokio::test]
    async fn telegram_user_fields_reach_account() {
        let gate = gate();
        let now = now();
        let user = TelegramUser::new(TelegramId(509)).with_premium(true);
        let user = serde_json::to_string(&user).unwrap();
        let auth_date = now.unix_timestamp().to_string();
        let raw = signed_payload(&[("auth_date", &auth_date), ("user", &user)], BOT_TOKEN);

        let account = gate.authenticate(init_data(&raw), now).await.unwrap();
        assert!(account.is_premium);
        assert_eq!(account.first_name, crate::account::DEFAULT_FIRST_NAME);
    }

    #[test]
    fn empty_bot_token_is_rejected() {
        let result = AuthGate::new(
            AuthConfig::new("", "secret"),
            Arc::new(MemoryAccountStore::new()),
        );
        assert!(matches!(result, Err(Error::MissingSecret(_))));
    }
}
