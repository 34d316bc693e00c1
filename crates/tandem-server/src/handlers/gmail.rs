//! Gmail import handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use tandem_core::ai::AIBackend;
use tandem_core::analysis;
use tandem_core::mail::GmailClient;
use tandem_core::Error;

use crate::{AppError, AppState};

use serde::Deserialize;
use tandem_core::models::Expense;

use super::UserQuery;

/// Default lookback when the request doesn't say how far
const SYNC_WINDOW_DAYS: i64 = 30;

/// Gmail connection status for the settings page
pub async fn gmail_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let profile = state
        .db
        .get_profile(query.user_id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    Ok(Json(serde_json::json!({
        "connected": profile.gmail_connected,
        "label": state.config.expense_email_label,
    })))
}

/// Disconnect Gmail, dropping the stored refresh token
pub async fn gmail_disconnect(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .db
        .get_profile(query.user_id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    state.db.clear_gmail_credentials(query.user_id)?;
    info!(user_id = query.user_id, "Gmail disconnected");
    Ok(Json(serde_json::json!({ "success": true })))
}

fn default_days_back() -> i64 {
    SYNC_WINDOW_DAYS
}

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    pub user_id: i64,
    /// How many days of mail to scan
    #[serde(default = "default_days_back")]
    pub days_back: i64,
}

#[derive(Debug, Serialize)]
pub struct SyncResult {
    /// Messages considered this run
    pub processed: usize,
    /// Messages looked at but not imported (already known, or no amount)
    pub skipped: usize,
    /// Expenses created this run
    pub expenses: Vec<Expense>,
}

/// Import labeled messages as expenses.
///
/// Messages already imported (by Gmail message id) and messages with no
/// recognizable amount are skipped, so the endpoint is safe to call
/// repeatedly.
pub async fn gmail_sync(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SyncQuery>,
) -> Result<Json<SyncResult>, AppError> {
    if query.days_back < 1 || query.days_back > 365 {
        return Err(AppError::bad_request("days_back must be between 1 and 365"));
    }

    let profile = state
        .db
        .get_profile(query.user_id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    let refresh_token = profile
        .gmail_refresh_token
        .filter(|_| profile.gmail_connected)
        .ok_or_else(|| AppError::bad_request("Gmail is not connected"))?;

    let client = GmailClient::for_user(&state.config, &refresh_token)
        .await
        .map_err(AppError::from)?;

    let label = &state.config.expense_email_label;
    client.get_or_create_label(label).await?;

    let after = (Utc::now() - Duration::days(query.days_back)).date_naive();
    let message_ids = client.list_message_ids(label, after).await?;
    let known = state.db.imported_email_ids(query.user_id)?;

    let processed = message_ids.len();
    let mut expenses = Vec::new();
    let mut skipped = 0;

    for message_id in message_ids {
        if known.contains(&message_id) {
            skipped += 1;
            continue;
        }

        let email = match client.fetch_message(&message_id).await {
            Ok(email) => email,
            Err(e) => {
                warn!(message_id = %message_id, "Failed to fetch message: {}", e);
                skipped += 1;
                continue;
            }
        };

        let Some(mut draft) = state.extractor.extract(&email) else {
            debug!(message_id = %message_id, "No amount found, skipping");
            skipped += 1;
            continue;
        };

        draft.category = Some(suggest_category(&state, &draft.description, draft.merchant.as_deref()).await);
        let category_id = state
            .db
            .category_id_by_name(query.user_id, draft.category.as_deref().unwrap_or("Other"))?;

        match state.db.create_expense(query.user_id, &draft, category_id) {
            Ok(expense) => expenses.push(expense),
            // Raced with a concurrent sync; the expense exists already
            Err(Error::Conflict(_)) => skipped += 1,
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        user_id = query.user_id,
        processed,
        imported = expenses.len(),
        skipped,
        "Gmail sync finished"
    );
    Ok(Json(SyncResult {
        processed,
        skipped,
        expenses,
    }))
}

/// Ask the model for a category, falling back to "Other" when it fails
pub(crate) async fn suggest_category(
    state: &AppState,
    description: &str,
    merchant: Option<&str>,
) -> String {
    let prompt = analysis::build_categorize_prompt(description, merchant);
    match state.ai.generate(&prompt).await {
        Ok(response) => analysis::validate_category(&response).to_string(),
        Err(e) => {
            debug!("Category suggestion failed: {}", e);
            "Other".to_string()
        }
    }
}
