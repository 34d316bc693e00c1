//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod analysis;
pub mod auth;
pub mod categories;
pub mod expenses;
pub mod gmail;
pub mod partners;

// Re-export all handlers for use in router
pub use analysis::*;
pub use auth::*;
pub use categories::*;
pub use expenses::*;
pub use gmail::*;
pub use partners::*;

use serde::Deserialize;

use crate::{AppError, AppState};

/// Query parameter identifying the acting user
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: i64,
}

/// Service identity at the root path
pub async fn root() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "tandem",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Health check
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// Resolve the set of user ids a read should cover: the user alone, or the
/// user plus their linked partner when `include_partner` is set.
pub(crate) fn scope_user_ids(
    state: &AppState,
    user_id: i64,
    include_partner: bool,
) -> Result<Vec<i64>, AppError> {
    let mut ids = vec![user_id];
    if include_partner {
        if let Some(partner_id) = state.db.partner_of(user_id)? {
            ids.push(partner_id);
        }
    }
    Ok(ids)
}

/// Verify the acting user may read an expense: the owner or their linked
/// partner. Returns the expense on success.
pub(crate) fn authorize_expense(
    state: &AppState,
    user_id: i64,
    expense_id: i64,
) -> Result<tandem_core::models::Expense, AppError> {
    let expense = state
        .db
        .get_expense(expense_id)?
        .ok_or_else(|| AppError::not_found("Expense not found"))?;

    if expense.user_id != user_id && state.db.partner_of(user_id)? != Some(expense.user_id) {
        return Err(AppError::forbidden("Not your expense"));
    }
    Ok(expense)
}

/// Mutations are owner-only; a partner can see an expense but not change
/// it. Non-owners get the same 404 a missing row would.
pub(crate) fn authorize_owner(
    state: &AppState,
    user_id: i64,
    expense_id: i64,
) -> Result<tandem_core::models::Expense, AppError> {
    let expense = state
        .db
        .get_expense(expense_id)?
        .ok_or_else(|| AppError::not_found("Expense not found"))?;

    if expense.user_id != user_id {
        return Err(AppError::not_found("Expense not found"));
    }
    Ok(expense)
}
