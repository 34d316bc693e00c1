//! Spending analysis handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::warn;

use tandem_core::ai::AIBackend;
use tandem_core::analysis;
use tandem_core::db::ExpenseFilter;
use tandem_core::models::{AnalysisReport, AnalysisRequest, Comparison, Timeframe};

use crate::{AppError, AppState};

use super::{scope_user_ids, UserQuery};

/// Run a spending analysis over the requested timeframe.
///
/// The numbers always come from the database; the model only writes the
/// prose. A failed or malformed model response degrades to a numeric
/// report instead of an error.
pub async fn run_analysis(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisReport>, AppError> {
    state
        .db
        .get_profile(query.user_id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    let user_ids = scope_user_ids(&state, query.user_id, request.include_partner)?;
    let since = Utc::now() - Duration::days(request.timeframe.days());
    let filter = ExpenseFilter::for_users(user_ids).start_date(Some(since));
    let expenses = state.db.list_expenses(&filter)?;

    let total: f64 = expenses.iter().map(|e| e.amount).sum();
    let by_category = analysis::spending_by_category(&expenses);
    let trends = analysis::weekly_trend(&expenses);

    // Nothing to analyze; skip the model call entirely
    if expenses.is_empty() {
        return Ok(Json(analysis::fallback_report(
            request.timeframe,
            0.0,
            by_category,
            trends,
        )));
    }

    let prompt = analysis::build_analysis_prompt(
        request.timeframe,
        total,
        &by_category,
        &trends,
        request.include_partner,
    );

    let report = match state.ai.generate(&prompt).await {
        Ok(response) => {
            let (summary, insights, recommendations) = analysis::parse_ai_response(&response);
            if summary.is_empty() && insights.is_empty() {
                warn!("Model response had no usable content, using fallback");
                analysis::fallback_report(request.timeframe, total, by_category, trends)
            } else {
                AnalysisReport {
                    summary,
                    insights,
                    recommendations,
                    spending_by_category: by_category,
                    trends,
                }
            }
        }
        Err(e) => {
            warn!("Analysis model call failed: {}", e);
            analysis::fallback_report(request.timeframe, total, by_category, trends)
        }
    };

    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct ComparisonQuery {
    pub user_id: i64,
    #[serde(default)]
    pub timeframe: Timeframe,
}

/// Side-by-side spending comparison with the linked partner
pub async fn partner_comparison(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ComparisonQuery>,
) -> Result<Json<Comparison>, AppError> {
    let partner_id = state
        .db
        .partner_of(query.user_id)?
        .ok_or_else(|| AppError::bad_request("No partner linked"))?;

    let since = Utc::now() - Duration::days(query.timeframe.days());

    let filter = ExpenseFilter::for_users(vec![query.user_id]).start_date(Some(since));
    let user_expenses = state.db.list_expenses(&filter)?;
    let filter = ExpenseFilter::for_users(vec![partner_id]).start_date(Some(since));
    let partner_expenses = state.db.list_expenses(&filter)?;

    Ok(Json(analysis::compare(&user_expenses, &partner_expenses)))
}

#[derive(Debug, Deserialize)]
pub struct CategorizeRequest {
    pub description: String,
    pub merchant: Option<String>,
}

/// Suggest a category for a single expense description
pub async fn categorize_expense(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CategorizeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.description.trim().is_empty() {
        return Err(AppError::bad_request("description is required"));
    }

    let category =
        super::gmail::suggest_category(&state, &request.description, request.merchant.as_deref())
            .await;
    Ok(Json(serde_json::json!({ "category": category })))
}
