use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::models::notification::Notification;
use crate::AppState;

#[derive(Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PageQuery>,
) -> AppResult<Json<Value>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    let offset = params.offset.unwrap_or(0).max(0);

    let notifications: Vec<Notification> = sqlx::query_as(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "notifications": notifications })))
}

pub async fn unread_count(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read")
            .bind(user.id)
            .fetch_one(&state.db)
            .await?;
    Ok(Json(json!({ "unread": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let result = sqlx::query("UPDATE notifications SET read = true WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Notification not found".into()));
    }
    Ok(Json(json!({ "read": true })))
}

pub async fn mark_all_read(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    let result = sqlx::query("UPDATE notifications SET read = true WHERE user_id = $1 AND NOT read")
        .bind(user.id)
        .execute(&state.db)
        .await?;
    Ok(Json(json!({ "updated": result.rows_affected() })))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Notification not found".into()));
    }
    Ok(Json(json!({ "deleted": true })))
}
