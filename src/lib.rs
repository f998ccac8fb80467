#![doc = include_str!("../README.md")]

pub mod account;
pub mod config;
pub mod error;
pub mod gate;
pub mod init_data;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod resolver;
pub mod store;
pub mod token;
pub mod types;

// Re-exports for convenient access
pub use account::{Account, NewAccount, TelegramUser};
pub use config::AuthConfig;
pub use error::{AuthError, Error};
pub use gate::{AuthGate, Credentials};
pub use init_data::{InitData, sign_init_data, verify_init_data};
pub use resolver::IdentityResolver;
#[cfg(feature = "postgres")]
pub use store::PgAccountStore;
pub use store::{AccountStore, MemoryAccountStore, StoreError};
pub use token::{IssuedToken, SessionClaims, SessionIssuer, SessionSubject, TokenAlgorithm};
pub use types::{AccountId, TelegramId};
