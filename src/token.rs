//! Session token issuance and verification.
//!
//! Tokens are self-contained: claims, expiry and signature travel together
//! and no server-side state is consulted on verification.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use pasetors::Local;
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::{LocalToken, V4};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

use crate::config::AuthConfig;
use crate::error::Error;
use crate::types::{AccountId, TelegramId};

type HmacSha256 = Hmac<Sha256>;

const JWT_HS256_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Token format and signing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum TokenAlgorithm {
    /// Compact JWT signed with HMAC-SHA256.
    #[default]
    Hs256,
    /// PASETO `v4.local` (XChaCha20 + BLAKE2b), key derived from the signing secret.
    PasetoV4Local,
}

impl fmt::Display for TokenAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hs256 => f.write_str("HS256"),
            Self::PasetoV4Local => f.write_str("v4.local"),
        }
    }
}

impl FromStr for TokenAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "HS256" | "hs256" => Ok(Self::Hs256),
            "v4.local" | "V4.LOCAL" => Ok(Self::PasetoV4Local),
            other => Err(format!("unsupported algorithm '{other}'")),
        }
    }
}

/// Identity a session token is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSubject {
    pub account_id: AccountId,
    pub telegram_id: TelegramId,
}

/// Verified session token claims. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: AccountId,
    pub telegram_id: TelegramId,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    #[must_use]
    pub fn subject(&self) -> SessionSubject {
        SessionSubject {
            account_id: self.sub,
            telegram_id: self.telegram_id,
        }
    }
}

/// A freshly minted token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Deserialize)]
struct JwtHeader {
    alg: String,
}

/// `v4.local` payload. Registered time claims use RFC 3339 strings.
#[derive(Serialize, Deserialize)]
struct PasetoPayload {
    sub: AccountId,
    telegram_id: TelegramId,
    #[serde(with = "time::serde::rfc3339")]
    iat: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    exp: OffsetDateTime,
}

/// Mints and verifies session tokens with a server-held symmetric secret.
pub struct SessionIssuer {
    algorithm: TokenAlgorithm,
    ttl: Duration,
    secret: Vec<u8>,
    paseto_key: SymmetricKey<V4>,
}

impl SessionIssuer {
    /// Build an issuer from the signing settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSecret`] if the signing secret is empty, or
    /// [`Error::Config`] if the TTL is not positive.
    pub fn new(config: &AuthConfig) -> Result<Self, Error> {
        if config.signing_secret.is_empty() {
            return Err(Error::MissingSecret("signing secret"));
        }
        if config.token_ttl <= Duration::ZERO {
            return Err(Error::Config("token TTL must be positive".into()));
        }
        let digest = Sha256::digest(&config.signing_secret);
        let paseto_key =
            SymmetricKey::<V4>::from(digest.as_slice()).map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            algorithm: config.algorithm,
            ttl: config.token_ttl,
            secret: config.signing_secret.clone(),
            paseto_key,
        })
    }

    #[must_use]
    pub fn algorithm(&self) -> TokenAlgorithm {
        self.algorithm
    }

    /// Issue a token valid from `now` (second precision) until `now + ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the claims cannot be encoded.
    pub fn issue(&self, subject: &SessionSubject, now: OffsetDateTime) -> Result<IssuedToken, Error> {
        let issued_at = whole_seconds(now)?;
        let expires_at = issued_at
            .checked_add(self.ttl)
            .ok_or_else(|| Error::Token("expiry out of range".into()))?;
        let claims = SessionClaims {
            sub: subject.account_id,
            telegram_id: subject.telegram_id,
            iat: issued_at.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
        };

        let token = match self.algorithm {
            TokenAlgorithm::Hs256 => self.encode_jwt(&claims)?,
            TokenAlgorithm::PasetoV4Local => self.encrypt_paseto(&claims, issued_at, expires_at)?,
        };

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token and return its claims.
    ///
    /// Expiry is judged against `now` for both algorithms.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] on malformed input, a foreign algorithm, or a
    /// bad signature, and [`Error::TokenExpired`] once `now >= exp`.
    pub fn verify(&self, token: &str, now: OffsetDateTime) -> Result<SessionClaims, Error> {
        let claims = match self.algorithm {
            TokenAlgorithm::Hs256 => self.decode_jwt(token)?,
            TokenAlgorithm::PasetoV4Local => self.decrypt_paseto(token)?,
        };
        if now.unix_timestamp() >= claims.exp {
            return Err(Error::TokenExpired);
        }
        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, Error> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| Error::Token(e.to_string()))
    }

    fn encode_jwt(&self, claims: &SessionClaims) -> Result<String, Error> {
        let payload = serde_json::to_vec(claims).map_err(|e| Error::Token(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(JWT_HS256_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    fn decode_jwt(&self, token: &str) -> Result<SessionClaims, Error> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = parts[..] else {
            return Err(Error::Token("invalid token format".into()));
        };

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| Error::Token("invalid header".into()))?;
        let header: JwtHeader = serde_json::from_slice(&header_bytes)
            .map_err(|_| Error::Token("invalid header".into()))?;
        if header.alg != TokenAlgorithm::Hs256.to_string() {
            return Err(Error::Token(format!("alg: expected 'HS256', got '{}'", header.alg)));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| Error::Token("invalid signature encoding".into()))?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| Error::Token("signature mismatch".into()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| Error::Token("invalid payload".into()))?;
        serde_json::from_slice(&payload).map_err(|e| Error::Token(format!("claims: {e}")))
    }

    fn encrypt_paseto(
        &self,
        claims: &SessionClaims,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<String, Error> {
        let payload = PasetoPayload {
            sub: claims.sub,
            telegram_id: claims.telegram_id,
            iat: issued_at,
            exp: expires_at,
        };
        let message = serde_json::to_vec(&payload).map_err(|e| Error::Token(e.to_string()))?;
        LocalToken::encrypt(&self.paseto_key, &message, None, None)
            .map_err(|e| Error::Token(e.to_string()))
    }

    // Claims are not validated by pasetors: its rules read the system clock,
    // and expiry is decided by `verify` against the caller's `now`.
    fn decrypt_paseto(&self, token: &str) -> Result<SessionClaims, Error> {
        if !token.starts_with(LocalToken::HEADER) {
            return Err(Error::Token("invalid token format".into()));
        }

        let untrusted_token = UntrustedToken::<Local, V4>::try_from(token)
            .map_err(|e| Error::Token(e.to_string()))?;
        let trusted_token = LocalToken::decrypt(&self.paseto_key, &untrusted_token, None, None)
            .map_err(|e| Error::Token(e.to_string()))?;

        let payload: PasetoPayload = serde_json::from_str(trusted_token.payload())
            .map_err(|e| Error::Token(format!("claims: {e}")))?;

        Ok(SessionClaims {
            sub: payload.sub,
            telegram_id: payload.telegram_id,
            iat: payload.iat.unix_timestamp(),
            exp: payload.exp.unix_timestamp(),
        })
    }
}

fn whole_seconds(t: OffsetDateTime) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::from_unix_timestamp(t.unix_timestamp()).map_err(|e| Error::Token(e.to_string()))
}
