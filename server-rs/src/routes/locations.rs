use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::cache::VENUES_KEY;
use crate::error::{AppError, AppResult};
use crate::models::event::{Event, EventView};
use crate::models::venue::Venue;
use crate::AppState;

#[derive(Deserialize)]
pub struct GeocodeQuery {
    pub q: Option<String>,
}

pub async fn list_venues(State(state): State<AppState>) -> AppResult<Json<Value>> {
    if let Some(venues) = state.cache.get_json::<Vec<Venue>>(VENUES_KEY).await {
        return Ok(Json(json!({ "venues": venues })));
    }

    let venues: Vec<Venue> = sqlx::query_as("SELECT * FROM venues ORDER BY city, name")
        .fetch_all(&state.db)
        .await?;
    state
        .cache
        .set_json(VENUES_KEY, &venues, state.config.redis.venue_ttl_secs)
        .await;

    Ok(Json(json!({ "venues": venues })))
}

pub async fn get_venue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let venue: Venue = sqlx::query_as("SELECT * FROM venues WHERE id = $1")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Venue not found".into()))?;

    let events: Vec<Event> = sqlx::query_as(
        r#"SELECT * FROM events
        WHERE venue_id = $1 AND status = 'active' AND NOT is_private AND date >= CURRENT_DATE
        ORDER BY date, start_time LIMIT 50"#,
    )
    .bind(&id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({
        "venue": venue,
        "events": events.iter().map(EventView::from).collect::<Vec<_>>(),
    })))
}

/// Address lookup for custom locations.
pub async fn geocode(
    State(state): State<AppState>,
    Query(params): Query<GeocodeQuery>,
) -> AppResult<Json<Value>> {
    let q = params.q.unwrap_or_default();
    let q = q.trim();
    if q.chars().count() < 3 {
        return Err(AppError::BadRequest("Query must be at least 3 characters".into()));
    }
    let results = state.geocoder.search(q).await?;
    Ok(Json(json!({ "results": results })))
}
