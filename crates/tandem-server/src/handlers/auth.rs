//! Profile and Google OAuth handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use tandem_core::models::Profile;
use tandem_core::oauth;

use crate::{AppError, AppState};

use super::UserQuery;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: Option<String>,
}

/// Create a profile, or return the existing one for this email
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Profile>, AppError> {
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("A valid email is required"));
    }

    let profile = state.db.upsert_profile(&email, request.name.as_deref())?;
    Ok(Json(profile))
}

/// Get the acting user's profile
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .db
        .get_profile(query.user_id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;
    Ok(Json(profile))
}

/// Return the Google consent URL for the acting user
pub async fn google_login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    // Fail fast on an unknown user rather than at the callback
    state
        .db
        .get_profile(query.user_id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    let auth_url = oauth::authorization_url(&state.config, query.user_id)?;
    Ok(Json(serde_json::json!({ "auth_url": auth_url })))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    /// The user id we put into the consent URL
    pub state: Option<String>,
    pub error: Option<String>,
}

/// OAuth callback. Google redirects the browser here; we exchange the code,
/// store the refresh token, and bounce back to the frontend settings page
/// with a success or error marker.
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let settings_url = format!("{}/settings", state.config.frontend_url);

    match handle_callback(&state, &query).await {
        Ok(user_id) => {
            info!(user_id, "Gmail connected");
            Redirect::to(&format!("{}?gmail=connected", settings_url))
        }
        Err(e) => {
            warn!("Gmail connection failed: {}", e);
            Redirect::to(&format!("{}?gmail=error", settings_url))
        }
    }
}

async fn handle_callback(state: &AppState, query: &CallbackQuery) -> anyhow::Result<i64> {
    if let Some(error) = &query.error {
        anyhow::bail!("Consent denied: {}", error);
    }

    let code = query
        .code
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Callback missing code"))?;
    let user_id: i64 = query
        .state
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Callback missing state"))?
        .parse()?;

    state
        .db
        .get_profile(user_id)?
        .ok_or_else(|| anyhow::anyhow!("Unknown user in callback state"))?;

    let tokens = oauth::exchange_code(&state.http_client, &state.config, code).await?;
    let refresh_token = tokens
        .refresh_token
        .ok_or_else(|| anyhow::anyhow!("Google did not return a refresh token"))?;

    state.db.set_gmail_credentials(user_id, &refresh_token)?;
    Ok(user_id)
}
