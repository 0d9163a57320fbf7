//! Session token manager.
//!
//! Owns the one current token. Tokens are replaced wholesale on refresh,
//! never mutated, and there is no local expiry clock: the provider's token
//! lifetime is long relative to a session, so staleness is detected
//! reactively when a call comes back 401 and recovered with a single
//! invalidate + acquire cycle driven by the controller.

use tokio::sync::Mutex;

use super::{ComputeProvider, ProviderError};

/// Holds at most one current session token.
#[derive(Default)]
pub struct TokenManager {
    /// The async lock also serializes concurrent refreshes: the slot stays
    /// locked across the identity exchange, so racing callers wait and then
    /// see the fresh token instead of issuing duplicate logins.
    current: Mutex<Option<String>>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current token, acquiring one first if none is held.
    pub async fn ensure<P: ComputeProvider>(&self, provider: &P) -> Result<String, ProviderError> {
        let mut slot = self.current.lock().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }
        let token = provider.authenticate().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Discard the current token; the next `ensure` re-authenticates.
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    /// Discard and immediately re-acquire.
    pub async fn refresh<P: ComputeProvider>(&self, provider: &P) -> Result<String, ProviderError> {
        self.invalidate().await;
        self.ensure(provider).await
    }

    /// Whether a token is currently held (no validity claim).
    #[allow(dead_code)]
    pub async fn has_token(&self) -> bool {
        self.current.lock().await.is_some()
    }
}
