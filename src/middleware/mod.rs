//! Axum integration for Telegram Mini App authentication.
//!
//! Mounts the login and profile endpoints and provides the
//! [`CurrentAccount`] extractor for the rest of the application.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gebeya_auth::middleware::{AuthState, CurrentAccount, auth_routes};
//! use gebeya_auth::{AuthConfig, MemoryAccountStore};
//!
//! // 1. Configure from environment
//! let config = AuthConfig::from_env()?;
//!
//! // 2. Build state around an account store
//! let state = AuthState::new(config, MemoryAccountStore::new())?;
//!
//! // 3. Mount auth routes
//! let app = axum::Router::new().merge(auth_routes(state.clone()));
//!
//! // 4. Use CurrentAccount in your own handlers with `.with_state(state)`
//! ```

mod error;
mod extractor;
mod routes;
mod state;
mod types;

pub use extractor::{CurrentAccount, INIT_DATA_HEADER};
pub use routes::auth_routes;
pub use state::AuthState;
pub use types::{
    AccountResponse, TelegramAuthRequest, TelegramAuthResponse, UpdateProfileRequest,
    UpdateSettingsRequest, VerifyPhoneRequest,
};
