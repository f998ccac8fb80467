use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use time::OffsetDateTime;

use super::state::AuthState;
use crate::account::Account;
use crate::error::AuthError;
use crate::gate::Credentials;
use crate::store::AccountStore;

/// Header carrying the raw Telegram launch payload.
pub const INIT_DATA_HEADER: &str = "x-init-data";

/// Authenticated account extracted from request headers.
///
/// Use as an Axum extractor in route handlers. Returns `401 Unauthorized`
/// without a usable credential and `403 Forbidden` for banned accounts.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected(CurrentAccount(account): CurrentAccount) -> impl IntoResponse {
///     format!("Selam, {}", account.display_name())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

impl<S: AccountStore> FromRequestParts<AuthState<S>> for CurrentAccount {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthState<S>,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts.headers.typed_get::<Authorization<Bearer>>();
        let credentials = Credentials {
            bearer: bearer.as_ref().map(|auth| auth.token()),
            init_data: parts
                .headers
                .get(INIT_DATA_HEADER)
                .and_then(|v| v.to_str().ok()),
        };

        state
            .gate
            .authenticate(credentials, OffsetDateTime::now_utc())
            .await
            .map(CurrentAccount)
    }
}
