use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::{blocking, body, present};
use crate::auth::session::{clear_cookie, session_cookie, token_from_headers};
use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, AppError};
use crate::models::{NewUser, PublicUser, UserUpdate};
use crate::server::{AppState, CurrentUser};

#[derive(Deserialize)]
pub(in crate::server) struct RegisterRequest {
    username: Option<String>,
    password: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
pub(in crate::server) struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::server) struct UpdateUserRequest {
    name: Option<String>,
    email: Option<String>,
    profile_picture: Option<String>,
}

fn start_session(state: &AppState, user_id: i64) -> String {
    let token = state.sessions.create(user_id);
    session_cookie(&token, state.sessions.ttl(), state.config.auth.secure_cookie)
}

/// POST /api/register
pub(in crate::server) async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body(payload)?;
    let (Some(username), Some(password), Some(email)) = (
        present(req.username),
        req.password.filter(|p| !p.is_empty()),
        present(req.email),
    ) else {
        return Err(ApiError::BadRequest("Username, password, and email are required".into()));
    };

    if state.store.get_user_by_username(&username)?.is_some() {
        return Err(ApiError::BadRequest("Username already exists".into()));
    }
    if state.store.get_user_by_email(&email)?.is_some() {
        return Err(ApiError::BadRequest("Email already exists".into()));
    }

    let password_hash = blocking(move || hash_password(&password)).await??;
    let user = state.store.create_user(NewUser {
        name: Some(present(req.name).unwrap_or_else(|| username.clone())),
        username,
        password_hash,
        email,
        profile_picture: None,
    })?;
    info!(user_id = user.id, username = %user.username, "user registered");

    let cookie = start_session(&state, user.id);
    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(user.public())))
}

/// POST /api/login
pub(in crate::server) async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body(payload)?;
    let invalid = || ApiError::Unauthorized("Invalid username or password".into());
    let (Some(username), Some(password)) = (present(req.username), req.password) else {
        return Err(invalid());
    };

    let user = state.store.get_user_by_username(&username)?.ok_or_else(invalid)?;
    let stored = user.password_hash.clone();
    if !blocking(move || verify_password(&password, &stored)).await? {
        debug!(user_id = user.id, "login rejected");
        return Err(invalid());
    }
    info!(user_id = user.id, "user logged in");

    let cookie = start_session(&state, user.id);
    Ok(([(header::SET_COOKIE, cookie)], Json(user.public())))
}

/// POST /api/logout
pub(in crate::server) async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = token_from_headers(&headers) {
        if state.sessions.destroy(&token) {
            debug!("session ended");
        }
    }
    (StatusCode::OK, [(header::SET_COOKIE, clear_cookie(state.config.auth.secure_cookie))])
}

/// GET /api/user
pub(in crate::server) async fn current_user(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.public())
}

/// PATCH /api/user
pub(in crate::server) async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<PublicUser>, ApiError> {
    let req = body(payload)?;
    let update = UserUpdate {
        name: present(req.name),
        email: present(req.email),
        profile_picture: present(req.profile_picture),
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update".into()));
    }
    if let Some(email) = &update.email {
        if state.store.get_user_by_email(email)?.is_some_and(|other| other.id != user.id) {
            return Err(ApiError::BadRequest("Email already in use".into()));
        }
    }

    // A concurrent update can still claim the email between the check and the write.
    let updated = match state.store.update_user(user.id, update) {
        Err(AppError::Duplicate("email")) => {
            return Err(ApiError::BadRequest("Email already in use".into()));
        }
        result => result?.ok_or_else(|| ApiError::NotFound("User not found".into()))?,
    };
    info!(user_id = updated.id, "profile updated");
    Ok(Json(updated.public()))
}
