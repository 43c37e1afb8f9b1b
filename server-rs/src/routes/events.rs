use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::admin;
use crate::middleware::auth::AuthUser;
use crate::models::event::*;
use crate::models::notification::{NewNotification, NotificationKind};
use crate::models::user::User;
use crate::models::venue::Venue;
use crate::routes::users::load_user;
use crate::services::events::{self as event_service, fetch_event};
use crate::services::mailer::EmailTemplate;
use crate::services::wizard::{self, EventWizard, Wizard, MAX_INVITES};
use crate::services::{friendships, membership};
use crate::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub sport: Option<String>,
    pub level: Option<String>,
    #[serde(rename = "venueId")]
    pub venue_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

struct ResolvedLocation {
    kind: &'static str,
    venue_id: Option<String>,
    name: String,
    address: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
}

/// A known venue wins over free-text fields.
async fn resolve_location(state: &AppState, input: &LocationInput) -> AppResult<ResolvedLocation> {
    if let Some(venue_id) = input.venue_id.as_deref().filter(|v| !v.trim().is_empty()) {
        let venue: Venue = sqlx::query_as("SELECT * FROM venues WHERE id = $1")
            .bind(venue_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Venue not found".into()))?;
        return Ok(ResolvedLocation {
            kind: LOCATION_VENUE,
            venue_id: Some(venue.id),
            name: venue.name,
            address: Some(venue.address),
            lat: Some(venue.lat),
            lng: Some(venue.lng),
        });
    }
    Ok(ResolvedLocation {
        kind: LOCATION_CUSTOM,
        venue_id: None,
        name: input.name.as_deref().unwrap_or_default().trim().to_string(),
        address: input.address.clone(),
        lat: input.lat,
        lng: input.lng,
    })
}

fn hash_event_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, 10).map_err(|e| AppError::Internal(e.to_string()))
}

fn require_organizer(event: &Event, user: &AuthUser) -> AppResult<()> {
    if event.organizer_id != user.id {
        return Err(AppError::Forbidden("Only the organizer can do this".into()));
    }
    Ok(())
}

fn when(event: &Event) -> String {
    format!(
        "{} {}-{}",
        event.date.format("%a %-d %b"),
        event.start_time.format("%H:%M"),
        event.end_time.format("%H:%M")
    )
}

/// In-app invites for friends, email invites for everyone.
async fn send_invites(
    state: &AppState,
    event: &Event,
    inviter: &User,
    friend_ids: &[Uuid],
    emails: &[String],
) {
    let template = EmailTemplate::EventInvite {
        inviter: inviter.display_name.clone(),
        event_title: event.title.clone(),
        link: state.config.event_link(&event.id),
    };

    for friend in friend_ids {
        state
            .notifier
            .notify(NewNotification {
                kind: NotificationKind::EventInvite,
                user_id: *friend,
                event_id: Some(event.id),
                event_title: Some(event.title.clone()),
                created_by: inviter.id,
            })
            .await;
    }
    if !friend_ids.is_empty() {
        let friend_emails: Result<Vec<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT email FROM users WHERE id = ANY($1)")
                .bind(friend_ids)
                .fetch_all(&state.db)
                .await;
        match friend_emails {
            Ok(addresses) => {
                for to in addresses {
                    state.notifier.email(to, template.clone());
                }
            }
            Err(e) => tracing::warn!(event_id = %event.id, "Failed to look up invitee emails: {e}"),
        }
    }
    for to in emails {
        state.notifier.email(to.trim().to_string(), template.clone());
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    let offset = params.offset.unwrap_or(0).max(0);
    let from = params.from.unwrap_or_else(|| Utc::now().date_naive());

    let events: Vec<Event> = sqlx::query_as(
        r#"SELECT * FROM events
        WHERE status = 'active' AND NOT is_private AND date >= $1
            AND ($2::text IS NULL OR sport = $2)
            AND ($3::text IS NULL OR level = $3 OR level = 'all')
            AND ($4::text IS NULL OR venue_id = $4)
        ORDER BY date, start_time
        LIMIT $5 OFFSET $6"#,
    )
    .bind(from)
    .bind(&params.sport)
    .bind(&params.level)
    .bind(&params.venue_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    let events: Vec<EventView> = events.iter().map(EventView::from).collect();
    Ok(Json(json!({ "events": events })))
}

/// Events the user organizes or plays in, split around today.
pub async fn my_events(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    let events: Vec<Event> = sqlx::query_as(
        r#"SELECT * FROM events
        WHERE organizer_id = $1
            OR players @> jsonb_build_array(jsonb_build_object('id', $2::text))
        ORDER BY date, start_time"#,
    )
    .bind(user.id)
    .bind(user.id.to_string())
    .fetch_all(&state.db)
    .await?;

    let now = Utc::now();
    let (past, upcoming): (Vec<&Event>, Vec<&Event>) = events
        .iter()
        .partition(|e| e.is_completed() || e.ends_at() <= now);

    Ok(Json(json!({
        "upcoming": upcoming.into_iter().map(EventView::from).collect::<Vec<_>>(),
        "past": past.into_iter().rev().map(EventView::from).collect::<Vec<_>>(),
    })))
}

pub async fn get_event(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let event = event_service::event_view(&state, id).await?;
    let joined = user
        .as_ref()
        .is_some_and(|u| membership::is_player_in_event(&event.players, u.id));

    Ok(Json(json!({
        "event": event,
        "joined": joined,
    })))
}

pub async fn create_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateEventRequest>,
) -> AppResult<Json<Value>> {
    let friends = friendships::friend_ids(&state.db, user.id).await?;
    EventWizard {
        draft: &body,
        friends: &friends,
        today: Utc::now().date_naive(),
    }
    .validate()?;

    let organizer = load_user(&state, user.id).await?;
    let location = resolve_location(&state, &body.location).await?;
    let password_hash = match (body.is_private, body.password.as_deref()) {
        (true, Some(password)) => Some(hash_event_password(password)?),
        _ => None,
    };
    let (Some(date), Some(start_time), Some(end_time)) = (body.date, body.start_time, body.end_time)
    else {
        return Err(AppError::BadRequest("Date, start time and end time are required".into()));
    };

    let mut tx = state.db.begin().await?;
    let event: Event = sqlx::query_as(
        r#"INSERT INTO events (
            id, title, description, date, start_time, end_time,
            location_kind, venue_id, location_name, location_address, lat, lng,
            level, price, max_players, is_private, password_hash, sport,
            players, status, cover_url, organizer_id, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, NOW(), NOW())
        RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(body.title.trim())
    .bind(&body.description)
    .bind(date)
    .bind(start_time)
    .bind(end_time)
    .bind(location.kind)
    .bind(&location.venue_id)
    .bind(&location.name)
    .bind(&location.address)
    .bind(location.lat)
    .bind(location.lng)
    .bind(&body.level)
    .bind(body.price)
    .bind(body.max_players)
    .bind(body.is_private)
    .bind(&password_hash)
    .bind(&body.sport)
    .bind(SqlJson(vec![organizer.player_entry()]))
    .bind(STATUS_ACTIVE)
    .bind(&body.cover_url)
    .bind(organizer.id)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("INSERT INTO chats (id, participant_ids) VALUES ($1, ARRAY[$2]::uuid[])")
        .bind(event.id)
        .bind(organizer.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(event_id = %event.id, organizer = %organizer.id, "Event created");

    send_invites(&state, &event, &organizer, &body.invited_friends, &body.email_invites).await;

    Ok(Json(json!({ "event": EventView::from(&event) })))
}

pub async fn update_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateEventRequest>,
) -> AppResult<Json<Value>> {
    let mut event = fetch_event(&state.db, id).await?;
    require_organizer(&event, &user)?;
    if event.is_completed() {
        return Err(AppError::Conflict("Completed events cannot be edited".into()));
    }

    let bad = |e: &str| AppError::BadRequest(e.to_string());

    if let Some(title) = &body.title {
        wizard::check_title(title).map_err(bad)?;
        event.title = title.trim().to_string();
    }
    if body.description.is_some() {
        event.description = body.description.clone();
    }
    if body.date.is_some() || body.start_time.is_some() || body.end_time.is_some() {
        let date = body.date.unwrap_or(event.date);
        let start = body.start_time.unwrap_or(event.start_time);
        let end = body.end_time.unwrap_or(event.end_time);
        wizard::check_schedule(Some(date), Some(start), Some(end), Utc::now().date_naive())
            .map_err(bad)?;
        event.date = date;
        event.start_time = start;
        event.end_time = end;
    }
    if let Some(input) = &body.location {
        wizard::check_location(input).map_err(bad)?;
        let location = resolve_location(&state, input).await?;
        event.location_kind = location.kind.to_string();
        event.venue_id = location.venue_id;
        event.location_name = location.name;
        event.location_address = location.address;
        event.lat = location.lat;
        event.lng = location.lng;
    }
    if let Some(level) = &body.level {
        wizard::check_event_level(level).map_err(bad)?;
        event.level = level.clone();
    }
    if let Some(price) = body.price {
        wizard::check_price(price).map_err(bad)?;
        event.price = price;
    }
    if let Some(max_players) = body.max_players {
        wizard::check_capacity(max_players).map_err(bad)?;
        if (max_players as usize) < event.players.0.len() {
            return Err(AppError::Conflict(
                "Capacity cannot drop below the number of joined players".into(),
            ));
        }
        event.max_players = max_players;
    }
    if let Some(is_private) = body.is_private {
        event.is_private = is_private;
    }
    if let Some(password) = body.password.as_deref().filter(|p| !p.is_empty()) {
        wizard::check_password(true, Some(password)).map_err(bad)?;
        event.password_hash = Some(hash_event_password(password)?);
    }
    if event.is_private && event.password_hash.is_none() {
        return Err(bad("Private events need a password of at least 4 characters"));
    }
    if !event.is_private {
        event.password_hash = None;
    }
    if body.cover_url.is_some() {
        event.cover_url = body.cover_url.clone();
    }

    let updated: Event = sqlx::query_as(
        r#"UPDATE events SET
            title = $2, description = $3, date = $4, start_time = $5, end_time = $6,
            location_kind = $7, venue_id = $8, location_name = $9, location_address = $10,
            lat = $11, lng = $12, level = $13, price = $14, max_players = $15,
            is_private = $16, password_hash = $17, cover_url = $18, updated_at = NOW()
        WHERE id = $1 AND jsonb_array_length(players) <= $15
        RETURNING *"#,
    )
    .bind(id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.date)
    .bind(event.start_time)
    .bind(event.end_time)
    .bind(&event.location_kind)
    .bind(&event.venue_id)
    .bind(&event.location_name)
    .bind(&event.location_address)
    .bind(event.lat)
    .bind(event.lng)
    .bind(&event.level)
    .bind(event.price)
    .bind(event.max_players)
    .bind(event.is_private)
    .bind(&event.password_hash)
    .bind(&event.cover_url)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| {
        AppError::Conflict("Capacity cannot drop below the number of joined players".into())
    })?;

    event_service::invalidate(&state, id).await;

    state
        .notifier
        .notify_all(
            &updated.player_ids(),
            &NewNotification {
                kind: NotificationKind::EventUpdated,
                user_id: user.id,
                event_id: Some(id),
                event_title: Some(updated.title.clone()),
                created_by: user.id,
            },
        )
        .await;
    event_service::email_players(
        &state,
        &updated,
        user.id,
        EmailTemplate::EventUpdated {
            event_title: updated.title.clone(),
            link: state.config.event_link(&id),
        },
    )
    .await;

    Ok(Json(json!({ "event": EventView::from(&updated) })))
}

pub async fn delete_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let event = fetch_event(&state.db, id).await?;
    if event.organizer_id != user.id && !admin::is_admin(&state.db, user.id).await? {
        return Err(AppError::Forbidden("Only the organizer can delete this event".into()));
    }
    event_service::delete_event(&state, &event, user.id).await?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn join_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<JoinEventRequest>>,
) -> AppResult<Json<Value>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let me = load_user(&state, user.id).await?;

    let event = membership::join_event(&state.db, id, &me, body.password.as_deref()).await?;

    event_service::add_chat_participant(&state, id, me.id).await;
    event_service::invalidate(&state, id).await;

    state
        .notifier
        .notify_all(
            &[event.organizer_id],
            &NewNotification {
                kind: NotificationKind::PlayerJoined,
                user_id: me.id,
                event_id: Some(id),
                event_title: Some(event.title.clone()),
                created_by: me.id,
            },
        )
        .await;
    state.notifier.queue_email(
        me.email.clone(),
        EmailTemplate::JoinConfirmation {
            event_title: event.title.clone(),
            when: when(&event),
            link: state.config.event_link(&id),
        },
    );

    Ok(Json(json!({ "event": EventView::from(&event) })))
}

pub async fn leave_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let event = membership::leave_event(&state.db, id, user.id).await?;

    event_service::remove_chat_participant(&state, id, user.id).await;
    event_service::invalidate(&state, id).await;

    state
        .notifier
        .notify_all(
            &[event.organizer_id],
            &NewNotification {
                kind: NotificationKind::PlayerLeft,
                user_id: user.id,
                event_id: Some(id),
                event_title: Some(event.title.clone()),
                created_by: user.id,
            },
        )
        .await;

    Ok(Json(json!({ "event": EventView::from(&event) })))
}

/// Players invite more friends or email addresses after creation.
pub async fn invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<InviteRequest>,
) -> AppResult<Json<Value>> {
    let event = fetch_event(&state.db, id).await?;
    if !membership::is_player_in_event(&event.players.0, user.id) {
        return Err(AppError::Forbidden("Only players can invite others".into()));
    }
    if event.is_completed() {
        return Err(AppError::Conflict("Event is already completed".into()));
    }
    if body.friend_ids.is_empty() && body.emails.is_empty() {
        return Err(AppError::BadRequest("Pick at least one friend or email".into()));
    }
    if body.friend_ids.len() + body.emails.len() > MAX_INVITES {
        return Err(AppError::BadRequest(format!(
            "You can send at most {} invites at once",
            MAX_INVITES
        )));
    }
    let friends = friendships::friend_ids(&state.db, user.id).await?;
    if body.friend_ids.iter().any(|id| !friends.contains(id)) {
        return Err(AppError::BadRequest("You can only invite your friends".into()));
    }
    if body.emails.iter().any(|e| !wizard::is_valid_email(e)) {
        return Err(AppError::BadRequest("Invalid invite email".into()));
    }

    let inviter = load_user(&state, user.id).await?;
    let friend_ids: Vec<Uuid> = body
        .friend_ids
        .into_iter()
        .filter(|id| !membership::is_player_in_event(&event.players.0, *id))
        .collect();
    send_invites(&state, &event, &inviter, &friend_ids, &body.emails).await;

    Ok(Json(json!({
        "invitedFriends": friend_ids.len(),
        "invitedEmails": body.emails.len(),
    })))
}

fn check_results(event: &Event, results: &MatchResults) -> AppResult<()> {
    if results.sets.is_empty() {
        return Err(AppError::BadRequest("Record at least one set".into()));
    }
    if results.team_a.is_empty() || results.team_b.is_empty() {
        return Err(AppError::BadRequest("Both teams need players".into()));
    }
    let players = event.player_ids();
    let mut seen = Vec::new();
    for id in results.team_a.iter().chain(results.team_b.iter()) {
        if !players.contains(id) {
            return Err(AppError::BadRequest("Teams may only contain event players".into()));
        }
        if seen.contains(id) {
            return Err(AppError::BadRequest("A player cannot be on both teams".into()));
        }
        seen.push(*id);
    }
    if results.winner_from_sets() != Some(results.winner) {
        return Err(AppError::BadRequest("Winner does not match the set scores".into()));
    }
    Ok(())
}

/// Records the score and closes the event.
pub async fn record_results(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<MatchResults>,
) -> AppResult<Json<Value>> {
    let event = fetch_event(&state.db, id).await?;
    require_organizer(&event, &user)?;
    if event.date.and_time(event.start_time).and_utc() > Utc::now() {
        return Err(AppError::Conflict("Results can be recorded once the match has started".into()));
    }
    check_results(&event, &body)?;

    let updated: Event = sqlx::query_as(
        "UPDATE events SET results = $2, status = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(SqlJson(body))
    .bind(STATUS_COMPLETED)
    .fetch_one(&state.db)
    .await?;
    event_service::invalidate(&state, id).await;

    tracing::info!(event_id = %id, "Match results recorded");
    Ok(Json(json!({ "event": EventView::from(&updated) })))
}

pub async fn complete_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let event = fetch_event(&state.db, id).await?;
    require_organizer(&event, &user)?;
    if event.is_completed() {
        return Err(AppError::Conflict("Event is already completed".into()));
    }

    let updated: Event = sqlx::query_as(
        "UPDATE events SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(STATUS_COMPLETED)
    .fetch_one(&state.db)
    .await?;
    event_service::invalidate(&state, id).await;

    Ok(Json(json!({ "event": EventView::from(&updated) })))
}
