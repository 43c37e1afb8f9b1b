use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::models::event::{Event, EventView};
use crate::models::saved_event::{saved_event_id, SavedEvent};
use crate::services::events::fetch_event;
use crate::AppState;

pub async fn list_saved(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    let events: Vec<Event> = sqlx::query_as(
        r#"SELECT e.* FROM saved_events s JOIN events e ON e.id = s.event_id
        WHERE s.user_id = $1
        ORDER BY e.date, e.start_time"#,
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let events: Vec<EventView> = events.iter().map(EventView::from).collect();
    Ok(Json(json!({ "events": events })))
}

/// Saving an already saved event is a no-op.
pub async fn save_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    fetch_event(&state.db, event_id).await?;

    let id = saved_event_id(user.id, event_id);
    sqlx::query(
        r#"INSERT INTO saved_events (id, user_id, event_id, created_at) VALUES ($1, $2, $3, NOW())
        ON CONFLICT (id) DO NOTHING"#,
    )
    .bind(&id)
    .bind(user.id)
    .bind(event_id)
    .execute(&state.db)
    .await?;
    let saved: SavedEvent = sqlx::query_as("SELECT * FROM saved_events WHERE id = $1")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(json!({ "saved": true, "savedEvent": saved })))
}

pub async fn unsave_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    sqlx::query("DELETE FROM saved_events WHERE id = $1")
        .bind(saved_event_id(user.id, event_id))
        .execute(&state.db)
        .await?;
    Ok(Json(json!({ "saved": false })))
}
