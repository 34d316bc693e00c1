//! Expense CRUD and dashboard stats handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use tandem_core::db::ExpenseFilter;
use tandem_core::models::{DashboardStats, Expense, ExpenseUpdate, NewExpense, Timeframe};

use crate::{AppError, AppState, MAX_PAGE_LIMIT};

use super::{authorize_expense, authorize_owner, scope_user_ids, UserQuery};

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct ListExpensesQuery {
    pub user_id: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub include_partner: bool,
}

/// List expenses, newest first
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListExpensesQuery>,
) -> Result<Json<Vec<Expense>>, AppError> {
    if query.limit < 1 || query.limit > MAX_PAGE_LIMIT {
        return Err(AppError::bad_request(&format!(
            "limit must be between 1 and {}",
            MAX_PAGE_LIMIT
        )));
    }
    if query.offset < 0 {
        return Err(AppError::bad_request("offset must not be negative"));
    }

    let user_ids = scope_user_ids(&state, query.user_id, query.include_partner)?;
    let filter = ExpenseFilter::for_users(user_ids)
        .start_date(query.start_date)
        .end_date(query.end_date)
        .category(query.category.as_deref())
        .limit(Some(query.limit))
        .offset(query.offset);

    let expenses = state.db.list_expenses(&filter)?;
    Ok(Json(expenses))
}

/// Create an expense. The category is given by name and resolved within
/// the user's visible scope; unknown names are rejected. When no category
/// is given the model suggests one from the fixed label set.
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
    Json(expense): Json<NewExpense>,
) -> Result<Json<Expense>, AppError> {
    if expense.amount <= 0.0 {
        return Err(AppError::bad_request("amount must be positive"));
    }
    if expense.description.trim().is_empty() {
        return Err(AppError::bad_request("description is required"));
    }
    state
        .db
        .get_profile(query.user_id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    let category_id = match expense.category.as_deref() {
        Some(name) => Some(
            state
                .db
                .category_id_by_name(query.user_id, name)?
                .ok_or_else(|| AppError::bad_request("Unknown category"))?,
        ),
        None => {
            let suggested = super::gmail::suggest_category(
                &state,
                &expense.description,
                expense.merchant.as_deref(),
            )
            .await;
            state.db.category_id_by_name(query.user_id, &suggested)?
        }
    };

    let created = state.db.create_expense(query.user_id, &expense, category_id)?;
    Ok(Json(created))
}

/// Get one expense (owner or partner)
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Expense>, AppError> {
    let expense = authorize_expense(&state, query.user_id, id)?;
    Ok(Json(expense))
}

/// Update an expense (owner only)
pub async fn update_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
    Json(update): Json<ExpenseUpdate>,
) -> Result<Json<Expense>, AppError> {
    let expense = authorize_owner(&state, query.user_id, id)?;

    if let Some(amount) = update.amount {
        if amount <= 0.0 {
            return Err(AppError::bad_request("amount must be positive"));
        }
    }

    // Resolve a category rename within the owner's scope
    let category_id = match update.category.as_deref() {
        Some(name) => Some(
            state
                .db
                .category_id_by_name(expense.user_id, name)?
                .ok_or_else(|| AppError::bad_request("Unknown category"))?,
        ),
        None => None,
    };

    let updated = state.db.update_expense(id, &update, category_id)?;
    Ok(Json(updated))
}

/// Delete an expense (owner only)
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize_owner(&state, query.user_id, id)?;
    state.db.delete_expense(id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub user_id: i64,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub include_partner: bool,
}

/// Dashboard statistics over the requested timeframe
pub async fn expense_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<DashboardStats>, AppError> {
    let user_ids = scope_user_ids(&state, query.user_id, query.include_partner)?;
    let since = Utc::now() - Duration::days(query.timeframe.days());

    let stats = state.db.expense_stats(user_ids, since)?;
    Ok(Json(stats))
}
