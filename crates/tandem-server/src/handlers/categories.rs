//! Category handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use tandem_core::models::{Category, CategoryUpdate, NewCategory};

use crate::{AppError, AppState};

use super::UserQuery;

/// List shared defaults plus the user's custom categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = state.db.list_categories(query.user_id)?;
    Ok(Json(categories))
}

/// Create a custom category
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
    Json(category): Json<NewCategory>,
) -> Result<Json<Category>, AppError> {
    if category.name.trim().is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    state
        .db
        .get_profile(query.user_id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    let created = state.db.create_category(query.user_id, &category)?;
    Ok(Json(created))
}

/// Update one of the user's own categories
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
    Json(update): Json<CategoryUpdate>,
) -> Result<Json<Category>, AppError> {
    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            return Err(AppError::bad_request("name must not be empty"));
        }
    }

    let updated = state.db.update_category(query.user_id, id, &update)?;
    Ok(Json(updated))
}

/// Delete one of the user's own categories; its expenses become uncategorized
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.delete_category(query.user_id, id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}
