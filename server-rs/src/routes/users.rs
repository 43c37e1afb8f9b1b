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
use crate::models::event::LEVELS;
use crate::models::user::*;
use crate::services::friendships;
use crate::services::wizard::{check_display_name, check_sports};
use crate::AppState;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub(crate) async fn load_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn get_me(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    let me = load_user(&state, user.id).await?;
    Ok(Json(json!({ "user": UserPrivate::from(&me) })))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ProfileUpdateRequest>,
) -> AppResult<Json<Value>> {
    if let Some(name) = &body.display_name {
        check_display_name(name).map_err(|e| AppError::BadRequest(e.into()))?;
    }
    if let Some(level) = &body.level {
        if !LEVELS.contains(&level.as_str()) {
            return Err(AppError::BadRequest("Unknown level".into()));
        }
    }
    if let Some(sports) = &body.sports {
        check_sports(sports).map_err(|e| AppError::BadRequest(e.into()))?;
    }

    let updated: User = sqlx::query_as(
        r#"UPDATE users SET
            display_name = COALESCE($2, display_name),
            photo_url = COALESCE($3, photo_url),
            phone = COALESCE($4, phone),
            level = COALESCE($5, level),
            sports = COALESCE($6, sports)
        WHERE id = $1 RETURNING *"#,
    )
    .bind(user.id)
    .bind(body.display_name.as_deref().map(str::trim))
    .bind(&body.photo_url)
    .bind(&body.phone)
    .bind(&body.level)
    .bind(&body.sports)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(Json(json!({ "user": UserPrivate::from(&updated) })))
}

/// Counters shown on the profile page.
pub async fn my_stats(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    let me = user.id.to_string();

    let organized: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE organizer_id = $1")
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;
    let (played, upcoming): (i64, i64) = sqlx::query_as(
        r#"SELECT
            COUNT(*) FILTER (WHERE status = 'completed' OR date < CURRENT_DATE),
            COUNT(*) FILTER (WHERE status = 'active' AND date >= CURRENT_DATE)
        FROM events
        WHERE players @> jsonb_build_array(jsonb_build_object('id', $1::text))"#,
    )
    .bind(&me)
    .fetch_one(&state.db)
    .await?;
    let friends = friendships::friend_ids(&state.db, user.id).await?.len();
    let memories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memories WHERE created_by = $1")
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(json!({
        "eventsOrganized": organized,
        "eventsPlayed": played,
        "eventsUpcoming": upcoming,
        "friends": friends,
        "memories": memories,
    })))
}

pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let profile = load_user(&state, id).await?;
    let friendship = friendships::state_between(&state.db, user.id, id).await?;

    Ok(Json(json!({
        "user": UserPublic::from(&profile),
        "friendship": friendship,
    })))
}

pub async fn search_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Value>> {
    let q = params.q.unwrap_or_default();
    let q = q.trim();
    if q.chars().count() < 2 {
        return Err(AppError::BadRequest("Query must be at least 2 characters".into()));
    }

    let users: Vec<User> = sqlx::query_as(
        r#"SELECT * FROM users
        WHERE (display_name ILIKE $1 OR email ILIKE $1) AND id != $2 AND NOT is_banned
        ORDER BY display_name LIMIT 20"#,
    )
    .bind(contains_pattern(q))
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let users: Vec<UserPublic> = users.iter().map(UserPublic::from).collect();
    Ok(Json(json!({ "users": users })))
}
