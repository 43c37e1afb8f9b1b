use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::admin;
use crate::middleware::auth::AuthUser;
use crate::models::memory::{CreateMemoryRequest, Memory};
use crate::models::notification::{NewNotification, NotificationKind};
use crate::services::events::fetch_event;
use crate::services::membership;
use crate::AppState;

#[derive(Deserialize)]
pub struct FeedQuery {
    pub limit: Option<i64>,
    pub before: Option<chrono::DateTime<Utc>>,
}

pub async fn list_event_memories(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let memories: Vec<Memory> =
        sqlx::query_as("SELECT * FROM memories WHERE event_id = $1 ORDER BY created_at DESC")
            .bind(event_id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(json!({ "memories": memories })))
}

pub async fn create_memory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(body): Json<CreateMemoryRequest>,
) -> AppResult<Json<Value>> {
    let event = fetch_event(&state.db, event_id).await?;
    if !membership::is_player_in_event(&event.players.0, user.id) {
        return Err(AppError::Forbidden("Only players can share memories".into()));
    }
    if !event.accepts_memories(Utc::now()) {
        return Err(AppError::Conflict("Memories open once the match is over".into()));
    }
    if body.image_url.trim().is_empty() {
        return Err(AppError::BadRequest("imageUrl required".into()));
    }
    if body.description.as_deref().is_some_and(|d| d.chars().count() > 500) {
        return Err(AppError::BadRequest("Description is limited to 500 characters".into()));
    }

    let memory: Memory = sqlx::query_as(
        r#"INSERT INTO memories (id, event_id, image_url, description, created_by, like_ids, created_at)
        VALUES ($1, $2, $3, $4, $5, '{}', NOW()) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(event_id)
    .bind(body.image_url.trim())
    .bind(&body.description)
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "memory": memory })))
}

/// Memories from public events, newest first, with their author and event.
pub async fn community_feed(
    State(state): State<AppState>,
    Query(params): Query<FeedQuery>,
) -> AppResult<Json<Value>> {
    let limit = params.limit.unwrap_or(30).clamp(1, 100);

    let rows: Vec<(Uuid, Uuid, String, Option<String>, Vec<Uuid>, chrono::DateTime<Utc>, String, String, Uuid, String)> =
        sqlx::query_as(
            r#"SELECT m.id, m.event_id, m.image_url, m.description, m.like_ids, m.created_at,
                e.title, e.sport, u.id, u.display_name
            FROM memories m
            JOIN events e ON e.id = m.event_id
            JOIN users u ON u.id = m.created_by
            WHERE NOT e.is_private AND ($1::timestamptz IS NULL OR m.created_at < $1)
            ORDER BY m.created_at DESC
            LIMIT $2"#,
        )
        .bind(params.before)
        .bind(limit)
        .fetch_all(&state.db)
        .await?;

    let memories: Vec<Value> = rows
        .into_iter()
        .map(|(id, event_id, image, desc, likes, created, title, sport, author, name)| {
            json!({
                "id": id,
                "eventId": event_id,
                "imageUrl": image,
                "description": desc,
                "likes": likes.len(),
                "likeIds": likes,
                "createdAt": created,
                "eventTitle": title,
                "sport": sport,
                "createdBy": author,
                "authorName": name,
            })
        })
        .collect();

    Ok(Json(json!({ "memories": memories })))
}

pub async fn like_memory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let row: Option<(Uuid, Uuid, bool)> = sqlx::query_as(
        r#"UPDATE memories m SET like_ids = CASE
            WHEN $2 = ANY(m.like_ids) THEN m.like_ids
            ELSE array_append(m.like_ids, $2)
        END
        FROM memories old
        WHERE m.id = $1 AND old.id = m.id
        RETURNING m.created_by, m.event_id, NOT ($2 = ANY(old.like_ids))"#,
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?;
    let (creator, event_id, newly_liked) =
        row.ok_or_else(|| AppError::NotFound("Memory not found".into()))?;

    if newly_liked && creator != user.id {
        let title: Option<String> = sqlx::query_scalar("SELECT title FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&state.db)
            .await?;
        state
            .notifier
            .notify(NewNotification {
                kind: NotificationKind::MemoryLiked,
                user_id: creator,
                event_id: Some(event_id),
                event_title: title,
                created_by: user.id,
            })
            .await;
    }

    Ok(Json(json!({ "liked": true })))
}

pub async fn unlike_memory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let result = sqlx::query("UPDATE memories SET like_ids = array_remove(like_ids, $2) WHERE id = $1")
        .bind(id)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Memory not found".into()));
    }
    Ok(Json(json!({ "liked": false })))
}

pub async fn delete_memory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let creator: Uuid = sqlx::query_scalar("SELECT created_by FROM memories WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Memory not found".into()))?;
    if creator != user.id && !admin::is_admin(&state.db, user.id).await? {
        return Err(AppError::Forbidden("Only the author can delete this memory".into()));
    }

    sqlx::query("DELETE FROM memories WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    Ok(Json(json!({ "deleted": true })))
}
