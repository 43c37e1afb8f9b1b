//! Event membership: who is on an event's player list.
//!
//! `join` and `leave` are pure functions over the list. `join_event` and
//! `leave_event` apply them to the stored event while holding its row lock,
//! so the capacity check always sees the committed list and concurrent
//! joins cannot overfill an event.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::event::{Event, PlayerEntry};
use crate::models::notification::NotificationKind;
use crate::models::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MembershipError {
    #[error("Event is full")]
    EventFull,
    #[error("You already joined this event")]
    AlreadyJoined,
    #[error("You are not a player in this event")]
    NotAMember,
    #[error("Event is already completed")]
    EventClosed,
    #[error("Incorrect event password")]
    WrongPassword,
}

impl MembershipError {
    pub fn code(&self) -> &'static str {
        match self {
            MembershipError::EventFull => "EVENT_FULL",
            MembershipError::AlreadyJoined => "ALREADY_JOINED",
            MembershipError::NotAMember => "NOT_A_MEMBER",
            MembershipError::EventClosed => "EVENT_CLOSED",
            MembershipError::WrongPassword => "WRONG_PASSWORD",
        }
    }
}

pub fn is_player_in_event(players: &[PlayerEntry], user_id: Uuid) -> bool {
    players.iter().any(|p| p.id == user_id)
}

/// Appends `entry` when there is room and the user is not already listed.
pub fn join(
    players: &[PlayerEntry],
    entry: PlayerEntry,
    max_players: i32,
) -> Result<Vec<PlayerEntry>, MembershipError> {
    if is_player_in_event(players, entry.id) {
        return Err(MembershipError::AlreadyJoined);
    }
    if players.len() >= max_players.max(0) as usize {
        return Err(MembershipError::EventFull);
    }
    let mut next = players.to_vec();
    next.push(entry);
    Ok(next)
}

/// Removes every entry for `user_id`.
pub fn leave(players: &[PlayerEntry], user_id: Uuid) -> Result<Vec<PlayerEntry>, MembershipError> {
    if !is_player_in_event(players, user_id) {
        return Err(MembershipError::NotAMember);
    }
    Ok(players.iter().filter(|p| p.id != user_id).cloned().collect())
}

async fn lock_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event_id: Uuid,
) -> AppResult<Event> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

async fn write_players(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event_id: Uuid,
    players: Vec<PlayerEntry>,
) -> AppResult<Event> {
    let event = sqlx::query_as::<_, Event>(
        "UPDATE events SET players = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(sqlx::types::Json(players))
    .bind(event_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(event)
}

async fn may_enter_private(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &Event,
    user_id: Uuid,
    password: Option<&str>,
) -> AppResult<()> {
    if !event.is_private || event.organizer_id == user_id {
        return Ok(());
    }

    let invited: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM notifications WHERE user_id = $1 AND event_id = $2 AND kind = $3)",
    )
    .bind(user_id)
    .bind(event.id)
    .bind(NotificationKind::EventInvite.as_str())
    .fetch_one(&mut **tx)
    .await?;
    if invited {
        return Ok(());
    }

    let (Some(hash), Some(password)) = (event.password_hash.as_deref(), password) else {
        return Err(MembershipError::WrongPassword.into());
    };
    let valid = bcrypt::verify(password, hash).map_err(|e| AppError::Internal(e.to_string()))?;
    if !valid {
        return Err(MembershipError::WrongPassword.into());
    }
    Ok(())
}

pub async fn join_event(
    db: &PgPool,
    event_id: Uuid,
    user: &User,
    password: Option<&str>,
) -> AppResult<Event> {
    let mut tx = db.begin().await?;
    let event = lock_event(&mut tx, event_id).await?;

    if event.is_completed() {
        return Err(MembershipError::EventClosed.into());
    }
    let players = join(&event.players.0, user.player_entry(), event.max_players)?;
    may_enter_private(&mut tx, &event, user.id, password).await?;

    let updated = write_players(&mut tx, event_id, players).await?;
    tx.commit().await?;

    tracing::info!(event_id = %event_id, user_id = %user.id, players = updated.players.0.len(), "Player joined event");
    Ok(updated)
}

pub async fn leave_event(db: &PgPool, event_id: Uuid, user_id: Uuid) -> AppResult<Event> {
    let mut tx = db.begin().await?;
    let event = lock_event(&mut tx, event_id).await?;

    if event.is_completed() {
        return Err(MembershipError::EventClosed.into());
    }
    if event.organizer_id == user_id {
        return Err(AppError::Conflict(
            "The organizer cannot leave; delete the event instead".into(),
        ));
    }
    let players = leave(&event.players.0, user_id)?;

    let updated = write_players(&mut tx, event_id, players).await?;
    tx.commit().await?;

    tracing::info!(event_id = %event_id, user_id = %user_id, "Player left event");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u128) -> PlayerEntry {
        PlayerEntry {
            id: Uuid::from_u128(n),
            name: format!("player {}", n),
            photo: None,
        }
    }

    fn roster(n: u128) -> Vec<PlayerEntry> {
        (1..=n).map(entry).collect()
    }

    #[test]
    fn filling_the_last_spot() {
        let players = roster(3);
        let x = entry(10);

        let after = join(&players, x.clone(), 4).unwrap();
        assert_eq!(after.len(), 4);
        assert!(is_player_in_event(&after, x.id));

        assert_eq!(join(&after, x, 4), Err(MembershipError::AlreadyJoined));
        assert_eq!(join(&after, entry(11), 4), Err(MembershipError::EventFull));
    }

    #[test]
    fn full_event_never_grows() {
        for max in 0..6 {
            let players = roster(max as u128);
            assert_eq!(
                join(&players, entry(99), max),
                Err(MembershipError::EventFull)
            );
        }
    }

    #[test]
    fn already_joined_wins_over_full() {
        let players = roster(4);
        assert_eq!(
            join(&players, entry(2), 4),
            Err(MembershipError::AlreadyJoined)
        );
    }

    #[test]
    fn join_then_leave_restores_roster() {
        let players = roster(2);
        let joined = join(&players, entry(7), 4).unwrap();
        let left = leave(&joined, Uuid::from_u128(7)).unwrap();
        assert_eq!(left, players);
    }

    #[test]
    fn leave_requires_membership() {
        assert_eq!(
            leave(&roster(2), Uuid::from_u128(5)),
            Err(MembershipError::NotAMember)
        );
    }

    #[test]
    fn leave_drops_stray_duplicates() {
        let mut players = roster(2);
        players.push(entry(2));
        let left = leave(&players, Uuid::from_u128(2)).unwrap();
        assert_eq!(left, roster(1));
    }

    #[test]
    fn negative_capacity_is_treated_as_full() {
        assert_eq!(join(&[], entry(1), -1), Err(MembershipError::EventFull));
    }
}
