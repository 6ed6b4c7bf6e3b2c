use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::{body, present};
use crate::chatbot;
use crate::error::ApiError;
use crate::models::{ChatMessage, NewChatMessage, ROLE_ASSISTANT, ROLE_USER};
use crate::server::{AppState, CurrentUser};

#[derive(Deserialize)]
pub(in crate::server) struct SendMessageRequest {
    content: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::server) struct SendMessageResponse {
    user_message: ChatMessage,
    ai_response: ChatMessage,
}

/// GET /api/chatbot/messages — history, oldest first.
pub(in crate::server) async fn messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    Ok(Json(state.store.chat_messages_by_user(user.id)?))
}

/// POST /api/chatbot/messages
pub(in crate::server) async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let content = present(body(payload)?.content)
        .ok_or_else(|| ApiError::BadRequest("Message content is required".into()))?;

    let user_message = state.store.create_chat_message(NewChatMessage {
        user_id: user.id,
        content: content.clone(),
        role: ROLE_USER.into(),
    })?;

    let insights = chatbot::insights(state.llm.as_ref(), &content).await;
    let ai_response = state.store.create_chat_message(NewChatMessage {
        user_id: user.id,
        content: chatbot::format_response(&insights),
        role: ROLE_ASSISTANT.into(),
    })?;
    info!(user_id = user.id, message_id = ai_response.id, "assistant replied");

    Ok(Json(SendMessageResponse { user_message, ai_response }))
}

/// GET /api/chatbot/tip (public)
pub(in crate::server) async fn tip() -> Json<Value> {
    Json(json!({ "tip": chatbot::random_tip() }))
}
