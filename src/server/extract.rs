use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use super::AppState;
use crate::auth::session::token_from_headers;
use crate::error::ApiError;
use crate::models::User;

/// The signed-in user behind the request's session cookie.
///
/// Rejects with 401 when the cookie is missing, the session has expired, or
/// the user no longer exists.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or_else(ApiError::auth_required)?;
        let user_id = state.sessions.resolve(&token).ok_or_else(ApiError::auth_required)?;
        match state.store.get_user(user_id)? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                debug!(user_id, "session refers to a missing user");
                state.sessions.destroy(&token);
                Err(ApiError::auth_required())
            }
        }
    }
}
