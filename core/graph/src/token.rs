//! Token storage with atomic refresh.

use async_trait::async_trait;
use tokio::sync::RwLock;

use cirrusdrive_common::{Error, Result};

use crate::auth::Tokens;

/// Exchanges a refresh token for a fresh token pair.
///
/// Implemented by [`crate::auth::AuthManager`] against the real identity
/// provider; tests substitute a scripted implementation.
#[async_trait]
pub trait RefreshTokens: Send + Sync {
    /// Perform one refresh-token grant. Failures map to
    /// [`Error::Authentication`]; implementations never retry.
    async fn refresh(&self, refresh_token: &str) -> Result<Tokens>;
}

/// Owns a session's token pair.
///
/// Exactly one store exists per session; there is no process-wide token
/// state. The store never decides retry policy — the request path does.
pub struct TokenStore {
    refresher: Box<dyn RefreshTokens>,
    tokens: RwLock<Tokens>,
}

impl TokenStore {
    /// Create a store around an initial token pair.
    pub fn new(refresher: Box<dyn RefreshTokens>, tokens: Tokens) -> Self {
        Self {
            refresher,
            tokens: RwLock::new(tokens),
        }
    }

    /// Current access token.
    pub async fn access_token(&self) -> String {
        self.tokens.read().await.access_token.clone()
    }

    /// Snapshot of the current token pair.
    pub async fn tokens(&self) -> Tokens {
        self.tokens.read().await.clone()
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// # Postconditions
    /// - On success, both stored tokens are replaced in a single write
    /// - On failure, the stored pair is left untouched
    ///
    /// # Errors
    /// - No refresh token held (the provider withheld offline access)
    /// - The provider rejected the refresh token, or the exchange failed
    pub async fn refresh(&self) -> Result<()> {
        let current = self.tokens.read().await.clone();
        if !current.can_refresh() {
            return Err(Error::Authentication(
                "No refresh token held; re-authentication required".to_string(),
            ));
        }

        tracing::info!("Refreshing access token");
        let renewed = self.refresher.refresh(&current.refresh_token).await?;

        *self.tokens.write().await = renewed;
        Ok(())
    }
}
