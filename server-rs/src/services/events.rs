use sqlx::PgPool;
use uuid::Uuid;

use crate::cache;
use crate::error::{AppError, AppResult};
use crate::models::event::{Event, EventView};
use crate::models::notification::{NewNotification, NotificationKind};
use crate::services::mailer::EmailTemplate;
use crate::AppState;

pub async fn fetch_event(db: &PgPool, event_id: Uuid) -> AppResult<Event> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

/// Event detail through the cache.
pub async fn event_view(state: &AppState, event_id: Uuid) -> AppResult<EventView> {
    let key = cache::event_key(&event_id);
    if let Some(view) = state.cache.get_json::<EventView>(&key).await {
        return Ok(view);
    }
    let event = fetch_event(&state.db, event_id).await?;
    let view = EventView::from(&event);
    state
        .cache
        .set_json(&key, &view, state.config.redis.event_ttl_secs)
        .await;
    Ok(view)
}

pub async fn invalidate(state: &AppState, event_id: Uuid) {
    state.cache.del(&cache::event_key(&event_id)).await;
}

/// Adds a new player to the event chat. Failures are logged; the join
/// has already been committed.
pub async fn add_chat_participant(state: &AppState, event_id: Uuid, user_id: Uuid) {
    let result = sqlx::query(
        r#"UPDATE chats SET participant_ids = array_append(participant_ids, $2)
        WHERE id = $1 AND NOT ($2 = ANY(participant_ids))"#,
    )
    .bind(event_id)
    .bind(user_id)
    .execute(&state.db)
    .await;
    if let Err(e) = result {
        tracing::warn!(event_id = %event_id, user_id = %user_id, "Failed to add chat participant: {e}");
    }
}

pub async fn remove_chat_participant(state: &AppState, event_id: Uuid, user_id: Uuid) {
    let result = sqlx::query(
        "UPDATE chats SET participant_ids = array_remove(participant_ids, $2) WHERE id = $1",
    )
    .bind(event_id)
    .bind(user_id)
    .execute(&state.db)
    .await;
    if let Err(e) = result {
        tracing::warn!(event_id = %event_id, user_id = %user_id, "Failed to remove chat participant: {e}");
    }
}

/// Deletes the event with its bookmarks, notifications, memories and chat,
/// then tells the remaining players.
pub async fn delete_event(state: &AppState, event: &Event, actor: Uuid) -> AppResult<()> {
    let mut tx = state.db.begin().await?;
    sqlx::query("DELETE FROM saved_events WHERE event_id = $1")
        .bind(event.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM notifications WHERE event_id = $1")
        .bind(event.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM memories WHERE event_id = $1")
        .bind(event.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chats WHERE id = $1")
        .bind(event.id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(event.id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound("Event not found".into()));
    }
    tx.commit().await?;
    invalidate(state, event.id).await;

    tracing::info!(event_id = %event.id, actor = %actor, "Event deleted");

    // Cancellation notices reference an event that no longer exists, so
    // they carry the title only.
    state
        .notifier
        .notify_all(
            &event.player_ids(),
            &NewNotification {
                kind: NotificationKind::EventCancelled,
                user_id: actor,
                event_id: None,
                event_title: Some(event.title.clone()),
                created_by: actor,
            },
        )
        .await;
    email_players(state, event, actor, EmailTemplate::EventCancelled {
        event_title: event.title.clone(),
    })
    .await;
    Ok(())
}

/// Emails every player except `actor`.
pub async fn email_players(state: &AppState, event: &Event, actor: Uuid, template: EmailTemplate) {
    let recipients: Vec<Uuid> = event
        .player_ids()
        .into_iter()
        .filter(|id| *id != actor)
        .collect();
    if recipients.is_empty() {
        return;
    }
    let emails: Result<Vec<String>, sqlx::Error> =
        sqlx::query_scalar("SELECT email FROM users WHERE id = ANY($1)")
            .bind(&recipients)
            .fetch_all(&state.db)
            .await;
    match emails {
        Ok(emails) => {
            for email in emails {
                state.notifier.email(email, template.clone());
            }
        }
        Err(e) => tracing::warn!(event_id = %event.id, "Failed to look up player emails: {e}"),
    }
}
