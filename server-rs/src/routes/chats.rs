use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::models::chat::{ChatMessage, PostMessageRequest};
use crate::AppState;

const MAX_MESSAGE_CHARS: usize = 1000;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub before: Option<DateTime<Utc>>,
}

/// Every event has one chat, keyed by the event id.
async fn require_participant(state: &AppState, chat_id: Uuid, user_id: Uuid) -> AppResult<()> {
    let participant: Option<bool> =
        sqlx::query_scalar("SELECT $2 = ANY(participant_ids) FROM chats WHERE id = $1")
            .bind(chat_id)
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?;
    match participant {
        None => Err(AppError::NotFound("Chat not found".into())),
        Some(false) => Err(AppError::Forbidden("Join the event to use its chat".into())),
        Some(true) => Ok(()),
    }
}

pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
    Query(params): Query<HistoryQuery>,
) -> AppResult<Json<Value>> {
    require_participant(&state, event_id, user.id).await?;
    let limit = params.limit.unwrap_or(50).clamp(1, 200);

    let mut messages: Vec<ChatMessage> = sqlx::query_as(
        r#"SELECT * FROM chat_messages
        WHERE chat_id = $1 AND ($2::timestamptz IS NULL OR created_at < $2)
        ORDER BY created_at DESC LIMIT $3"#,
    )
    .bind(event_id)
    .bind(params.before)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;
    messages.reverse();

    Ok(Json(json!({ "messages": messages })))
}

pub async fn post_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(body): Json<PostMessageRequest>,
) -> AppResult<Json<Value>> {
    let text = body.text.trim();
    if text.is_empty() || text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::BadRequest("Messages must be 1-1000 characters".into()));
    }
    require_participant(&state, event_id, user.id).await?;

    let message: ChatMessage = sqlx::query_as(
        r#"INSERT INTO chat_messages (id, chat_id, sender_id, text, created_at)
        VALUES ($1, $2, $3, $4, NOW()) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(event_id)
    .bind(user.id)
    .bind(text)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "message": message })))
}
