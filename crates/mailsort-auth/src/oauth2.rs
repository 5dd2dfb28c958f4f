//! OAuth2 authorization code flow with PKCE
//!
//! The authorization URL is opened in the user's browser and the redirect
//! is received by a [`LoopbackServer`](crate::LoopbackServer).

use crate::loopback::{AuthCallback, LoopbackServer};
use crate::{AuthError, AuthResult};
use oauth2::{
    basic::BasicClient, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use std::time::Duration;
use tracing::{debug, info};

/// OAuth2 provider configuration
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret (optional for native apps using PKCE)
    pub client_secret: Option<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Required scopes
    pub scopes: Vec<String>,
    /// Redirect URI registered for the app
    pub redirect_uri: String,
    /// Local port the redirect URI points at
    pub redirect_port: u16,
}

/// Token pair containing access and refresh tokens
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenPair {
    /// Access token for API calls
    pub access_token: String,
    /// Refresh token for obtaining new access tokens
    pub refresh_token: Option<String>,
    /// Token expiration timestamp (Unix seconds)
    pub expires_at: Option<i64>,
}

impl TokenPair {
    /// Check if the access token is expired or about to expire
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let now = chrono::Utc::now().timestamp();
                // Consider expired if less than 5 minutes remaining
                expires_at - now < 300
            }
            None => false,
        }
    }
}

/// Manages an OAuth2 authorization flow
pub struct OAuth2Flow {
    config: OAuth2Config,
    client: BasicClient,
    pkce_verifier: Option<PkceCodeVerifier>,
    csrf_token: Option<CsrfToken>,
}

impl OAuth2Flow {
    /// Create a new OAuth2 flow
    pub fn new(config: OAuth2Config) -> AuthResult<Self> {
        if config.client_id.trim().is_empty() {
            return Err(AuthError::InvalidConfig("client_id is empty".to_string()));
        }

        let client_id = ClientId::new(config.client_id.clone());
        let client_secret = config.client_secret.clone().map(ClientSecret::new);
        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid redirect URL: {}", e)))?;

        // Microsoft expects client credentials in the form body
        let client = BasicClient::new(client_id, client_secret, auth_url, Some(token_url))
            .set_auth_type(AuthType::RequestBody)
            .set_redirect_uri(redirect_url);

        Ok(Self {
            config,
            client,
            pkce_verifier: None,
            csrf_token: None,
        })
    }

    /// Generate the authorization URL for the user to visit
    pub fn get_auth_url(&mut self) -> String {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);

        for scope in &self.config.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_token) = auth_request.url();

        // Store verifier and CSRF token for later use
        self.pkce_verifier = Some(pkce_verifier);
        self.csrf_token = Some(csrf_token);

        auth_url.to_string()
    }

    /// Check the callback's `state` against the CSRF token we sent.
    /// Providers that omit `state` are accepted.
    fn verify_state(&self, callback: &AuthCallback) -> AuthResult<()> {
        match (&callback.state, &self.csrf_token) {
            (Some(state), Some(expected)) if state != expected.secret() => {
                Err(AuthError::StateMismatch)
            }
            _ => Ok(()),
        }
    }

    /// Run the interactive flow: print and open the sign-in link, wait for the
    /// redirect on the loopback server, then exchange the code for tokens.
    pub async fn authenticate(&mut self, timeout: Duration) -> AuthResult<TokenPair> {
        let auth_url = self.get_auth_url();
        // Listen before the browser can redirect
        let server = LoopbackServer::bind_loopback(self.config.redirect_port).await?;

        info!("Open this link in your browser to sign in:");
        info!("{}", auth_url);
        info!("Waiting for authorization...");

        match crate::open_browser(&auth_url) {
            Ok(()) => debug!("Browser opened automatically"),
            Err(e) => debug!("Automatic opening failed ({}), use the link above", e),
        }

        let callback = server.wait(timeout).await?;
        self.verify_state(&callback)?;
        self.exchange_code(callback.code).await
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&mut self, code: String) -> AuthResult<TokenPair> {
        let pkce_verifier = self
            .pkce_verifier
            .take()
            .ok_or_else(|| AuthError::InvalidConfig("Auth URL not generated".to_string()))?;

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        let expires_at = token_response
            .expires_in()
            .map(|duration| chrono::Utc::now().timestamp() + duration.as_secs() as i64);

        info!("Authentication successful");
        Ok(TokenPair {
            access_token: token_response.access_token().secret().clone(),
            refresh_token: token_response.refresh_token().map(|t| t.secret().clone()),
            expires_at,
        })
    }
}
