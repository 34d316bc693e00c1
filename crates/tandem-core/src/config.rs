//! Application configuration
//!
//! Configuration is read from the environment once at startup and passed
//! explicitly to the components that need it. Every missing required value is
//! collected so a misconfigured deployment fails with one complete error
//! instead of one variable at a time.

use crate::error::{Error, Result};

/// Default OAuth callback when `GOOGLE_REDIRECT_URI` is not set
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8000/auth/google/callback";

/// Default frontend origin when `FRONTEND_URL` is not set
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

/// Gmail label that marks expense emails
const DEFAULT_EMAIL_LABEL: &str = "Expenses";

/// Default Gemini model
const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Google OAuth client id
    pub google_client_id: String,
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// OAuth callback URL registered with Google
    pub google_redirect_uri: String,
    /// Gemini API key
    pub gemini_api_key: String,
    /// Gemini model name
    pub gemini_model: String,
    /// Frontend base URL, used for CORS and post-OAuth redirects
    pub frontend_url: String,
    /// Application secret
    pub secret_key: String,
    /// Gmail label to sync expenses from
    pub expense_email_label: String,
}

impl Config {
    /// Build configuration from environment variables.
    ///
    /// Returns a single error naming every missing required variable.
    pub fn from_env() -> Result<Self> {
        let mut missing = Vec::new();

        let google_client_id = require("GOOGLE_CLIENT_ID", &mut missing);
        let google_client_secret = require("GOOGLE_CLIENT_SECRET", &mut missing);
        let gemini_api_key = require("GEMINI_API_KEY", &mut missing);
        let secret_key = require("TANDEM_SECRET_KEY", &mut missing);

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            google_client_id,
            google_client_secret,
            google_redirect_uri: optional("GOOGLE_REDIRECT_URI", DEFAULT_REDIRECT_URI),
            gemini_api_key,
            gemini_model: optional("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            frontend_url: optional("FRONTEND_URL", DEFAULT_FRONTEND_URL),
            secret_key,
            expense_email_label: optional("EXPENSE_EMAIL_LABEL", DEFAULT_EMAIL_LABEL),
        })
    }

    /// Minimal configuration for tests (no real credentials)
    pub fn for_tests() -> Self {
        Self {
            google_client_id: "test-client-id".to_string(),
            google_client_secret: "test-client-secret".to_string(),
            google_redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            gemini_api_key: "test-api-key".to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            secret_key: "test-secret".to_string(),
            expense_email_label: DEFAULT_EMAIL_LABEL.to_string(),
        }
    }
}

fn require(name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
