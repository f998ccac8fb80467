use std::sync::Arc;

use crate::config::AuthConfig;
use crate::error::Error;
use crate::gate::AuthGate;
use crate::store::AccountStore;

/// Shared state for auth route handlers and the [`CurrentAccount`](super::CurrentAccount) extractor.
pub struct AuthState<S> {
    pub(super) gate: Arc<AuthGate<S>>,
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for AuthState<S> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

impl<S: AccountStore> AuthState<S> {
    /// # Errors
    ///
    /// Returns the [`AuthGate::new`] error if the config is unusable.
    pub fn new(config: AuthConfig, store: S) -> Result<Self, Error> {
        Ok(Self::from_gate(AuthGate::new(config, Arc::new(store))?))
    }

    #[must_use]
    pub fn from_gate(gate: AuthGate<S>) -> Self {
        Self {
            gate: Arc::new(gate),
        }
    }

    #[must_use]
    pub fn gate(&self) -> &AuthGate<S> {
        &self.gate
    }
}
