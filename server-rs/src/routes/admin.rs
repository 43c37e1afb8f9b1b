use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::contains_pattern;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::models::event::{Event, EventView};
use crate::models::user::{User, UserPrivate};
use crate::services::events::{self as event_service, fetch_event};
use crate::AppState;

#[derive(Deserialize)]
pub struct AdminQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct AdminFlagRequest {
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

pub async fn analytics(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*)::bigint FROM users").fetch_one(&state.db).await?;
    let banned: i64 = sqlx::query_scalar("SELECT COUNT(*)::bigint FROM users WHERE is_banned").fetch_one(&state.db).await?;
    let (events, active, completed): (i64, i64, i64) = sqlx::query_as(
        r#"SELECT COUNT(*)::bigint,
            COUNT(*) FILTER (WHERE status = 'active')::bigint,
            COUNT(*) FILTER (WHERE status = 'completed')::bigint
        FROM events"#,
    )
    .fetch_one(&state.db)
    .await?;

    let per_sport: Vec<(String, i64)> = sqlx::query_as(
        "SELECT sport, COUNT(*)::bigint FROM events GROUP BY sport ORDER BY 2 DESC",
    )
    .fetch_all(&state.db)
    .await?;

    let signups: Vec<(String, i64)> = sqlx::query_as(
        r#"SELECT to_char(date_trunc('month', created_at), 'YYYY-MM'), COUNT(*)::bigint
        FROM users WHERE created_at >= date_trunc('month', NOW()) - INTERVAL '11 months'
        GROUP BY 1 ORDER BY 1"#,
    )
    .fetch_all(&state.db)
    .await?;

    let events_per_month: Vec<(String, i64)> = sqlx::query_as(
        r#"SELECT to_char(date_trunc('month', date), 'YYYY-MM'), COUNT(*)::bigint
        FROM events WHERE date >= (date_trunc('month', NOW()) - INTERVAL '11 months')::date
        GROUP BY 1 ORDER BY 1"#,
    )
    .fetch_all(&state.db)
    .await?;

    let series = |rows: Vec<(String, i64)>| -> Vec<Value> {
        rows.into_iter()
            .map(|(month, count)| json!({"month": month, "count": count}))
            .collect()
    };

    Ok(Json(json!({
        "users": users,
        "bannedUsers": banned,
        "events": events,
        "activeEvents": active,
        "completedEvents": completed,
        "eventsBySport": per_sport.into_iter().map(|(sport, count)| json!({"sport": sport, "count": count})).collect::<Vec<_>>(),
        "signupsPerMonth": series(signups),
        "eventsPerMonth": series(events_per_month),
    })))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(q): Query<AdminQuery>,
) -> AppResult<Json<Value>> {
    let limit = q.limit.unwrap_or(20).clamp(1, 100);
    let offset = q.page.unwrap_or(0).max(0) * limit;
    let search = contains_pattern(q.search.as_deref().unwrap_or("").trim());

    let users: Vec<User> = sqlx::query_as(
        r#"SELECT * FROM users WHERE display_name ILIKE $1 OR email ILIKE $1
        ORDER BY created_at DESC LIMIT $2 OFFSET $3"#,
    )
    .bind(&search)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*)::bigint FROM users WHERE display_name ILIKE $1 OR email ILIKE $1")
            .bind(&search)
            .fetch_one(&state.db)
            .await?;

    let users: Vec<UserPrivate> = users.iter().map(UserPrivate::from).collect();
    Ok(Json(json!({ "users": users, "total": total })))
}

async fn set_flag(state: &AppState, admin: &AuthUser, id: Uuid, column: &'static str, value: bool) -> AppResult<User> {
    if id == admin.id {
        return Err(AppError::BadRequest("You cannot change your own account flags".into()));
    }
    // `column` is one of two literals chosen by the handlers below.
    let user: User = sqlx::query_as(&format!("UPDATE users SET {} = $2 WHERE id = $1 RETURNING *", column))
        .bind(id)
        .bind(value)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    tracing::info!(admin = %admin.id, user_id = %id, column, value, "Account flag changed");
    Ok(user)
}

pub async fn ban_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let user = set_flag(&state, &admin, id, "is_banned", true).await?;
    Ok(Json(json!({ "user": UserPrivate::from(&user) })))
}

pub async fn unban_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let user = set_flag(&state, &admin, id, "is_banned", false).await?;
    Ok(Json(json!({ "user": UserPrivate::from(&user) })))
}

pub async fn set_admin(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AdminFlagRequest>,
) -> AppResult<Json<Value>> {
    let user = set_flag(&state, &admin, id, "is_admin", body.is_admin).await?;
    Ok(Json(json!({ "user": UserPrivate::from(&user) })))
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(q): Query<AdminQuery>,
) -> AppResult<Json<Value>> {
    let limit = q.limit.unwrap_or(50).clamp(1, 100);
    let offset = q.page.unwrap_or(0).max(0) * limit;

    let events: Vec<Event> = sqlx::query_as(
        r#"SELECT * FROM events
        WHERE ($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR title ILIKE $2)
        ORDER BY date DESC, start_time DESC LIMIT $3 OFFSET $4"#,
    )
    .bind(&q.status)
    .bind(q.search.as_deref().map(|s| contains_pattern(s.trim())))
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    let events: Vec<EventView> = events.iter().map(EventView::from).collect();
    Ok(Json(json!({ "events": events })))
}

pub async fn delete_event(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let event = fetch_event(&state.db, id).await?;
    event_service::delete_event(&state, &event, admin.id).await?;
    Ok(Json(json!({ "deleted": true })))
}
