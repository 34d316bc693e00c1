//! Google OAuth flow for Gmail access
//!
//! The flow is the standard authorization-code dance: build a consent URL
//! carrying the user id as `state`, then exchange the returned code for
//! tokens. Only the refresh token is persisted; access tokens are minted on
//! demand when syncing.

use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested at consent time. Read-only mail access plus labels
/// (the import label is created if missing) and basic identity.
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.labels",
    "openid",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Tokens returned by the code exchange
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Only present on first consent (or with prompt=consent)
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
}

/// Build the consent URL for a user.
///
/// `access_type=offline` with `prompt=consent` forces Google to issue a
/// refresh token even if the user consented before.
pub fn authorization_url(config: &Config, user_id: i64) -> Result<String> {
    let url = Url::parse_with_params(
        AUTH_ENDPOINT,
        &[
            ("client_id", config.google_client_id.as_str()),
            ("redirect_uri", config.google_redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", &SCOPES.join(" ")),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", &user_id.to_string()),
        ],
    )
    .map_err(|e| Error::Config(format!("Invalid OAuth endpoint: {}", e)))?;

    Ok(url.to_string())
}

/// Exchange an authorization code for tokens
pub async fn exchange_code(client: &Client, config: &Config, code: &str) -> Result<TokenResponse> {
    debug!("Exchanging authorization code for tokens");

    let response = client
        .post(TOKEN_ENDPOINT)
        .form(&[
            ("client_id", config.google_client_id.as_str()),
            ("client_secret", config.google_client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", config.google_redirect_uri.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Mail(format!(
            "Token exchange failed with {}: {}",
            status, body
        )));
    }

    Ok(response.json().await?)
}

/// Mint a fresh access token from a stored refresh token
pub async fn refresh_access_token(
    client: &Client,
    config: &Config,
    refresh_token: &str,
) -> Result<String> {
    let response = client
        .post(TOKEN_ENDPOINT)
        .form(&[
            ("client_id", config.google_client_id.as_str()),
            ("client_secret", config.google_client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        return Err(Error::Mail(format!(
            "Token refresh failed with {}; reconnect Gmail",
            status
        )));
    }

    #[derive(Deserialize)]
    struct RefreshResponse {
        access_token: String,
    }
    let parsed: RefreshResponse = response.json().await?;
    Ok(parsed.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_url_carries_state_and_scopes() {
        let config = Config::for_tests();
        let url = authorization_url(&config, 42).unwrap();

        assert!(url.starts_with(AUTH_ENDPOINT));
        assert!(url.contains("state=42"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("gmail.readonly"));
        assert!(url.contains("gmail.labels"));
    }
}
