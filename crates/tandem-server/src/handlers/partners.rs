//! Partner link and invite handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use tandem_core::db::InviteBox;
use tandem_core::models::{PartnerInvite, Profile};

use crate::{AppError, AppState};

use super::UserQuery;

/// Get the linked partner's profile, if any
pub async fn get_partner(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Option<Profile>>, AppError> {
    let partner = match state.db.partner_of(query.user_id)? {
        Some(partner_id) => state.db.get_profile(partner_id)?,
        None => None,
    };
    Ok(Json(partner))
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

/// Invite a partner by email
pub async fn create_invite(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
    Json(request): Json<InviteRequest>,
) -> Result<Json<PartnerInvite>, AppError> {
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("A valid email is required"));
    }

    let invite = state.db.create_invite(query.user_id, &email)?;
    info!(user_id = query.user_id, invitee = %email, "Partner invite sent");
    Ok(Json(invite))
}

#[derive(Debug, Serialize)]
pub struct InviteList {
    pub sent: Vec<PartnerInvite>,
    pub received: Vec<PartnerInvite>,
}

/// List the user's sent invites and pending received invites
pub async fn list_invites(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<InviteList>, AppError> {
    state
        .db
        .get_profile(query.user_id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    Ok(Json(InviteList {
        sent: state.db.list_invites(query.user_id, InviteBox::Sent)?,
        received: state.db.list_invites(query.user_id, InviteBox::Received)?,
    }))
}

/// Accept an invite; links both profiles atomically
pub async fn accept_invite(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.accept_invite(query.user_id, id)?;
    info!(user_id = query.user_id, invite_id = id, "Partner invite accepted");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Decline an invite
pub async fn decline_invite(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.decline_invite(query.user_id, id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Dissolve the partner link from either side
pub async fn unlink_partner(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.unlink_partners(query.user_id)?;
    info!(user_id = query.user_id, "Partner link dissolved");
    Ok(Json(serde_json::json!({ "success": true })))
}
