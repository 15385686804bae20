//! OAuth2 authentication and token management for Microsoft OneDrive.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, ClientSecret, RedirectUrl, Scope, TokenResponse,
    TokenUrl,
};
use serde::{Deserialize, Serialize};

use cirrusdrive_common::{Error, Result};

use crate::token::RefreshTokens;

/// Identity authority for both personal and organizational accounts.
const MS_AUTHORITY: &str = "https://login.microsoftonline.com/common";
/// Redirect URL for the OAuth2 flow (localhost for desktop apps).
const REDIRECT_URL: &str = "http://localhost:8000/callback";

/// Scopes required for drive access plus refresh-token issuance.
const SCOPES: [&str; 3] = ["Files.ReadWrite.All", "User.Read", "offline_access"];

/// OAuth2 tokens with expiration tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Access token for API requests.
    pub access_token: String,
    /// Refresh token; empty when the provider did not grant offline access.
    pub refresh_token: String,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Check if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        self.expires_at < Utc::now() + Duration::minutes(5)
    }

    /// Whether a refresh token is held at all.
    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

/// Configuration for OAuth2 authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Application (client) id from the Azure app registration.
    pub client_id: String,
    /// Client secret from the Azure app registration.
    pub client_secret: String,
    /// Identity authority; override for tenant-specific endpoints.
    pub authority: String,
    /// Redirect URL registered for the application.
    pub redirect_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            authority: MS_AUTHORITY.to_string(),
            redirect_url: REDIRECT_URL.to_string(),
        }
    }
}

/// OAuth2 authentication manager for the Microsoft identity platform.
pub struct AuthManager {
    client: BasicClient,
    config: AuthConfig,
}

impl AuthManager {
    /// Create a new authentication manager.
    ///
    /// # Errors
    /// - Empty client id
    /// - Malformed authority or redirect URL
    pub fn new(config: AuthConfig) -> Result<Self> {
        if config.client_id.is_empty() {
            return Err(Error::InvalidInput("Client id cannot be empty".to_string()));
        }

        let authority = config.authority.trim_end_matches('/');
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(format!("{}/oauth2/v2.0/authorize", authority))
                .map_err(|e| Error::InvalidInput(format!("Invalid authority URL: {}", e)))?,
            Some(
                TokenUrl::new(format!("{}/oauth2/v2.0/token", authority))
                    .map_err(|e| Error::InvalidInput(format!("Invalid authority URL: {}", e)))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_url.clone())
                .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
        );

        Ok(Self { client, config })
    }

    /// Generate the authorization URL for the user to visit.
    ///
    /// Returns the URL and a CSRF state that should be verified on callback.
    pub fn authorization_url(&self) -> (String, String) {
        let mut request = self.client.authorize_url(oauth2::CsrfToken::new_random);
        for scope in SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (auth_url, csrf_token) = request.url();

        (auth_url.to_string(), csrf_token.secret().clone())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Preconditions
    /// - `code` is a valid authorization code from the OAuth2 callback
    ///
    /// # Postconditions
    /// - Returns the access token; the refresh token is empty when the
    ///   provider withheld one
    ///
    /// # Errors
    /// - Invalid or already-redeemed authorization code
    /// - Network errors
    pub async fn exchange_code(&self, code: &str) -> Result<Tokens> {
        use oauth2::reqwest::async_http_client;
        use oauth2::AuthorizationCode;

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Authentication(format!("Token exchange failed: {}", e)))?;

        let refresh_token = token_result
            .refresh_token()
            .map(|t| t.secret().clone())
            .unwrap_or_default();

        Ok(Tokens {
            access_token: token_result.access_token().secret().clone(),
            refresh_token,
            expires_at: expiry_from(token_result.expires_in()),
        })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

#[async_trait]
impl RefreshTokens for AuthManager {
    async fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        use oauth2::reqwest::async_http_client;
        use oauth2::RefreshToken;

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Authentication(format!("Token refresh failed: {}", e)))?;

        // The provider may or may not rotate the refresh token
        let new_refresh_token = token_result
            .refresh_token()
            .map(|t| t.secret().clone())
            .unwrap_or_else(|| refresh_token.to_string());

        Ok(Tokens {
            access_token: token_result.access_token().secret().clone(),
            refresh_token: new_refresh_token,
            expires_at: expiry_from(token_result.expires_in()),
        })
    }
}

/// Absolute expiry timestamp from a token lifetime, defaulting to one hour
/// when the provider omits it.
fn expiry_from(expires_in: Option<std::time::Duration>) -> DateTime<Utc> {
    let expires_in = expires_in.unwrap_or_else(|| std::time::Duration::from_secs(3600));
    Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            client_id: "test_id".to_string(),
            client_secret: "test_secret".to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_tokens_expiration() {
        let tokens = Tokens {
            access_token: "test".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() - Duration::hours(1),
        };

        assert!(tokens.is_expired());

        let valid_tokens = Tokens {
            access_token: "test".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        };

        assert!(!valid_tokens.is_expired());
    }

    #[test]
    fn test_tokens_near_expiration() {
        // Token expiring in 4 minutes should be considered expired (5 min margin)
        let tokens = Tokens {
            access_token: "test".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + Duration::minutes(4),
        };

        assert!(tokens.is_expired());
    }

    #[test]
    fn test_tokens_can_refresh() {
        let mut tokens = Tokens {
            access_token: "test".to_string(),
            refresh_token: String::new(),
            expires_at: Utc::now(),
        };
        assert!(!tokens.can_refresh());

        tokens.refresh_token = "refresh".to_string();
        assert!(tokens.can_refresh());
    }

    #[test]
    fn test_auth_config_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.authority, "https://login.microsoftonline.com/common");
        assert_eq!(config.redirect_url, "http://localhost:8000/callback");
        assert!(config.client_id.is_empty());
    }

    #[test]
    fn test_auth_manager_requires_client_id() {
        let result = AuthManager::new(AuthConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_auth_manager_creation() {
        let manager = AuthManager::new(test_config()).unwrap();
        assert_eq!(manager.config().client_id, "test_id");
    }

    #[test]
    fn test_authorization_url_generation() {
        let manager = AuthManager::new(test_config()).unwrap();
        let (url, csrf_token) = manager.authorization_url();

        assert!(url.contains("login.microsoftonline.com"));
        assert!(url.contains("client_id=test_id"));
        assert!(url.contains("offline_access"));
        assert!(!csrf_token.is_empty());
    }

    #[test]
    fn test_tokens_serialization() {
        let tokens = Tokens {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now(),
        };

        let json = serde_json::to_string(&tokens).unwrap();
        let deserialized: Tokens = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.access_token, tokens.access_token);
        assert_eq!(deserialized.refresh_token, tokens.refresh_token);
    }
}
