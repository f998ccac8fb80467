use axum::extract::State;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use time::OffsetDateTime;

use super::extractor::CurrentAccount;
use super::state::AuthState;
use super::types::{
    AccountResponse, TelegramAuthRequest, TelegramAuthResponse, UpdateProfileRequest,
    UpdateSettingsRequest, VerifyPhoneRequest,
};
use crate::account::Account;
use crate::error::AuthError;
use crate::store::AccountStore;

/// Create the Telegram authentication and profile router.
///
/// Routes are mounted under the configured API prefix (default `/api/v1`).
pub fn auth_routes<S: AccountStore>(state: AuthState<S>) -> Router {
    let prefix = state.gate.config().api_prefix().to_string();

    Router::new()
        .route(
            &format!("{prefix}/auth/telegram"),
            post(telegram_login::<S>),
        )
        .route(
            &format!("{prefix}/users/me"),
            get(me::<S>).patch(update_profile::<S>),
        )
        .route(
            &format!("{prefix}/users/me/settings"),
            patch(update_settings::<S>),
        )
        .route(
            &format!("{prefix}/users/me/verify-phone"),
            post(verify_phone::<S>),
        )
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn telegram_login<S: AccountStore>(
    State(state): State<AuthState<S>>,
    Json(body): Json<TelegramAuthRequest>,
) -> Result<Json<TelegramAuthResponse>, AuthError> {
    let (account, issued) = state
        .gate
        .login(&body.init_data, OffsetDateTime::now_utc())
        .await?;

    Ok(Json(TelegramAuthResponse {
        access_token: issued.token,
        token_type: "bearer".into(),
        expires_at: issued.expires_at,
        user: AccountResponse::new(&account, state.gate.config()),
    }))
}

// ── Profile ────────────────────────────────────────────────────────

async fn me<S: AccountStore>(
    State(state): State<AuthState<S>>,
    CurrentAccount(account): CurrentAccount,
) -> Json<AccountResponse> {
    Json(AccountResponse::new(&account, state.gate.config()))
}

async fn update_profile<S: AccountStore>(
    State(state): State<AuthState<S>>,
    CurrentAccount(account): CurrentAccount,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<AccountResponse>, AuthError> {
    let updated = account.with_location(
        body.city.as_deref(),
        body.area.as_deref(),
        OffsetDateTime::now_utc(),
    );
    persist(&state, updated).await
}

async fn update_settings<S: AccountStore>(
    State(state): State<AuthState<S>>,
    CurrentAccount(account): CurrentAccount,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<AccountResponse>, AuthError> {
    let updated = account.with_settings_merged(&body.settings, OffsetDateTime::now_utc());
    persist(&state, updated).await
}

async fn verify_phone<S: AccountStore>(
    State(state): State<AuthState<S>>,
    CurrentAccount(account): CurrentAccount,
    Json(body): Json<VerifyPhoneRequest>,
) -> Result<Json<AccountResponse>, AuthError> {
    if body.phone_number.trim().is_empty() {
        return Err(AuthError::BadRequest("phone_number is required".into()));
    }
    let updated = account.with_verified_phone(&body.phone_number, OffsetDateTime::now_utc());
    tracing::info!(account_id = %updated.id, "Phone number verified");
    persist(&state, updated).await
}

// ── Helpers ────────────────────────────────────────────────────────

async fn persist<S: AccountStore>(
    state: &AuthState<S>,
    account: Account,
) -> Result<Json<AccountResponse>, AuthError> {
    state.gate.store().save(&account).await.map_err(|e| {
        tracing::error!(error = %e, account_id = %account.id, "Account save failed");
        AuthError::Store(e)
    })?;
    Ok(Json(AccountResponse::new(&account, state.gate.config())))
}
