//! Authentication module for mailsort
//!
//! Signs in to a Microsoft account with the OAuth2 authorization code flow
//! (PKCE) and a short-lived loopback server that receives the redirect.

mod error;
mod loopback;
mod oauth2;
mod pages;

pub use error::{AuthError, AuthResult};
pub use loopback::{
    await_authorization_code, AuthCallback, LoopbackServer, CALLBACK_PATH,
    DEFAULT_CALLBACK_TIMEOUT, MISSING_CODE_GRACE,
};
pub use oauth2::{OAuth2Config, OAuth2Flow, TokenPair};

/// Microsoft identity platform configuration
pub mod microsoft {
    use super::{AuthError, AuthResult, OAuth2Config};

    /// Scopes needed to read mail and move it between folders
    pub const MAIL_SCOPES: &[&str] = &[
        "https://graph.microsoft.com/Mail.Read",
        "https://graph.microsoft.com/Mail.ReadWrite",
        "offline_access",
    ];

    /// Tenant used for personal accounts (outlook.com, hotmail.com)
    pub const DEFAULT_TENANT: &str = "consumers";

    pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";

    /// Port a loopback redirect URI points at (80 when none is given)
    pub fn redirect_port(redirect_uri: &str) -> AuthResult<u16> {
        let url = url::Url::parse(redirect_uri)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid redirect URI: {}", e)))?;
        url.port_or_known_default().ok_or_else(|| {
            AuthError::InvalidConfig(format!("Redirect URI has no port: {}", redirect_uri))
        })
    }

    /// Create the OAuth2 configuration for a Microsoft app registration
    ///
    /// Register the app at https://portal.azure.com (App registrations) and
    /// add `redirect_uri` as a "Mobile and desktop" redirect.
    pub fn oauth2_config(
        client_id: &str,
        tenant: &str,
        client_secret: Option<String>,
        redirect_uri: &str,
    ) -> AuthResult<OAuth2Config> {
        let authority = format!("https://login.microsoftonline.com/{}", tenant);
        Ok(OAuth2Config {
            client_id: client_id.to_string(),
            client_secret,
            auth_url: format!("{}/oauth2/v2.0/authorize", authority),
            token_url: format!("{}/oauth2/v2.0/token", authority),
            scopes: MAIL_SCOPES.iter().map(|s| s.to_string()).collect(),
            redirect_uri: redirect_uri.to_string(),
            redirect_port: redirect_port(redirect_uri)?,
        })
    }

}

/// Open `url` in the system browser
pub fn open_browser(url: &str) -> Result<(), opener::OpenError> {
    opener::open_browser(url)
}
