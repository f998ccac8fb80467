use crate::store::StoreError;

/// Reasons a credential or account lookup was refused.
///
/// Variants are for logging. Callers that decide on retries or responses
/// should treat every verification variant the same way.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Launch payload or token could not be parsed.
    #[error("Malformed credential: {0}")]
    Malformed(String),

    /// Launch payload hash did not match.
    #[error("Signature mismatch")]
    SignatureMismatch,

    /// Launch payload `auth_date` is older than the allowed age.
    #[error("Launch payload is stale ({age_secs}s old)")]
    Stale { age_secs: i64 },

    /// Bot token or signing secret is empty.
    #[error("Missing secret: {0}")]
    MissingSecret(&'static str),

    /// Session token failed signature or structure checks.
    #[error("Token verification error: {0}")]
    Token(String),

    /// Session token is past its `exp`.
    #[error("Token expired")]
    TokenExpired,

    /// No account exists for the Telegram identity and none can be created.
    #[error("Account not found")]
    AccountNotFound,

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Account store failure.
    #[error("Account store error: {0}")]
    Store(#[from] StoreError),
}

/// Request-level authentication outcome.
///
/// Only [`Unauthenticated`](AuthError::Unauthenticated) and
/// [`Forbidden`](AuthError::Forbidden) are authentication decisions. The
/// underlying [`Error`] reason is logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No usable credential, or the credential failed verification.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Credential is valid but the account is banned.
    #[error("Account is banned")]
    Forbidden,

    /// Request body failed validation.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Account store operation failed.
    #[error("Account store error: {0}")]
    Store(#[from] StoreError),

    /// Token issuance or other internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}
