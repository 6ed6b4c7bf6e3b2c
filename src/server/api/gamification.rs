use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::body;
use crate::error::ApiError;
use crate::gamification::{self, LeaderboardEntry, UserStats};
use crate::models::Badge;
use crate::server::{AppState, CurrentUser};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::server) struct CheckBadgesRequest {
    project_id: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::server) struct CheckBadgesResponse {
    badges: Vec<Badge>,
    new_badges: Vec<Badge>,
    has_new_badges: bool,
}

/// GET /api/gamification/badges — badges the user holds.
pub(in crate::server) async fn badges(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Badge>>, ApiError> {
    Ok(Json(state.store.user_badges(user.id)?))
}

/// GET /api/gamification/badges/all — the full catalogue.
pub(in crate::server) async fn all_badges(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<Badge>>, ApiError> {
    Ok(Json(state.store.all_badges()?))
}

/// POST /api/gamification/check-badges
pub(in crate::server) async fn check_badges(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CheckBadgesRequest>, JsonRejection>,
) -> Result<Json<CheckBadgesResponse>, ApiError> {
    let project_id = body(payload)?
        .project_id
        .ok_or_else(|| ApiError::BadRequest("Project ID is required".into()))?;
    let project = state
        .store
        .get_project(project_id)?
        .ok_or_else(|| ApiError::NotFound("Project not found".into()))?;
    if project.user_id != user.id {
        return Err(ApiError::Forbidden("You don't have access to this project".into()));
    }

    let new_badges = gamification::check_and_assign(state.store.as_ref(), user.id, project_id)?;
    if !new_badges.is_empty() {
        info!(user_id = user.id, project_id, earned = new_badges.len(), "new badges earned");
    }
    Ok(Json(CheckBadgesResponse {
        badges: state.store.user_badges(user.id)?,
        has_new_badges: !new_badges.is_empty(),
        new_badges,
    }))
}

/// GET /api/gamification/leaderboard
pub(in crate::server) async fn leaderboard(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    Ok(Json(gamification::leaderboard(state.store.as_ref())?))
}

/// GET /api/gamification/stats
pub(in crate::server) async fn stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<UserStats>, ApiError> {
    Ok(Json(gamification::stats(state.store.as_ref(), user.id)?))
}
