//! Friend requests and friend lists.
//!
//! Two users move `none -> pending -> friends`, back to `none` on reject,
//! cancel or remove. Accepting writes both users' lists and deletes the
//! request in one transaction.

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::friendship::{FriendList, FriendRequest};
use crate::models::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FriendshipError {
    #[error("You cannot add yourself as a friend")]
    SelfRequest,
    #[error("You are already friends")]
    AlreadyFriends,
    #[error("Friend request already sent")]
    AlreadyRequested,
    #[error("Friend request not found")]
    NoSuchRequest,
    #[error("Only the recipient can answer this request")]
    NotRecipient,
    #[error("You are not friends")]
    NotFriends,
}

impl FriendshipError {
    pub fn code(&self) -> &'static str {
        match self {
            FriendshipError::SelfRequest => "SELF_REQUEST",
            FriendshipError::AlreadyFriends => "ALREADY_FRIENDS",
            FriendshipError::AlreadyRequested => "ALREADY_REQUESTED",
            FriendshipError::NoSuchRequest => "NO_SUCH_REQUEST",
            FriendshipError::NotRecipient => "NOT_RECIPIENT",
            FriendshipError::NotFriends => "NOT_FRIENDS",
        }
    }
}

/// Relationship between the acting user and another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipState {
    None,
    /// The acting user sent a request that is still open.
    PendingOutgoing,
    /// The other user sent a request that is still open.
    PendingIncoming,
    Friends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendAction {
    Send,
    Accept,
    Reject,
    Cancel,
    Remove,
}

impl FriendshipState {
    pub fn between(are_friends: bool, outgoing: bool, incoming: bool) -> Self {
        if are_friends {
            FriendshipState::Friends
        } else if incoming {
            FriendshipState::PendingIncoming
        } else if outgoing {
            FriendshipState::PendingOutgoing
        } else {
            FriendshipState::None
        }
    }
}

pub fn transition(
    state: FriendshipState,
    action: FriendAction,
) -> Result<FriendshipState, FriendshipError> {
    use FriendAction as A;
    use FriendshipState as S;

    match (state, action) {
        (S::None, A::Send) => Ok(S::PendingOutgoing),
        // Sending back to someone who already asked accepts their request.
        (S::PendingIncoming, A::Send | A::Accept) => Ok(S::Friends),
        (S::PendingIncoming, A::Reject) => Ok(S::None),
        (S::PendingOutgoing, A::Cancel) => Ok(S::None),
        (S::Friends, A::Remove) => Ok(S::None),

        (S::PendingOutgoing, A::Send) => Err(FriendshipError::AlreadyRequested),
        (S::Friends, A::Send) => Err(FriendshipError::AlreadyFriends),
        (S::PendingOutgoing, A::Accept | A::Reject) => Err(FriendshipError::NotRecipient),
        (S::PendingIncoming, A::Cancel) => Err(FriendshipError::NotRecipient),
        (S::None | S::Friends, A::Accept | A::Reject | A::Cancel) => {
            Err(FriendshipError::NoSuchRequest)
        }
        (S::None | S::PendingOutgoing | S::PendingIncoming, A::Remove) => {
            Err(FriendshipError::NotFriends)
        }
    }
}

/// Serialises every friendship write between two users, whichever side
/// starts it. Held until the transaction ends.
async fn lock_pair(tx: &mut Transaction<'_, Postgres>, a: Uuid, b: Uuid) -> AppResult<()> {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1 || ':' || $2, 0))")
        .bind(lo.to_string())
        .bind(hi.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn state_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    me: Uuid,
    other: Uuid,
) -> AppResult<(FriendshipState, Option<FriendRequest>)> {
    let are_friends: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM friend_lists WHERE user_id = $1 AND $2 = ANY(friend_ids))",
    )
    .bind(me)
    .bind(other)
    .fetch_one(&mut **tx)
    .await?;

    let outgoing: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM friend_requests WHERE from_id = $1 AND to_id = $2 AND status = 'pending')",
    )
    .bind(me)
    .bind(other)
    .fetch_one(&mut **tx)
    .await?;

    let incoming: Option<FriendRequest> = sqlx::query_as(
        "SELECT * FROM friend_requests WHERE from_id = $1 AND to_id = $2 AND status = 'pending' FOR UPDATE",
    )
    .bind(other)
    .bind(me)
    .fetch_optional(&mut **tx)
    .await?;

    Ok((
        FriendshipState::between(are_friends, outgoing, incoming.is_some()),
        incoming,
    ))
}

pub async fn state_between(db: &PgPool, me: Uuid, other: Uuid) -> AppResult<FriendshipState> {
    let mut tx = db.begin().await?;
    let (state, _) = state_in_tx(&mut tx, me, other).await?;
    tx.commit().await?;
    Ok(state)
}

async fn append_friend(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    friend_id: Uuid,
) -> AppResult<()> {
    sqlx::query(
        r#"INSERT INTO friend_lists (user_id, friend_ids) VALUES ($1, ARRAY[$2]::uuid[])
        ON CONFLICT (user_id) DO UPDATE SET friend_ids = CASE
            WHEN $2 = ANY(friend_lists.friend_ids) THEN friend_lists.friend_ids
            ELSE array_append(friend_lists.friend_ids, $2)
        END"#,
    )
    .bind(user_id)
    .bind(friend_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Both lists and the request row change together or not at all.
async fn link(tx: &mut Transaction<'_, Postgres>, request: &FriendRequest) -> AppResult<()> {
    append_friend(tx, request.from_id, request.to_id).await?;
    append_friend(tx, request.to_id, request.from_id).await?;
    sqlx::query("DELETE FROM friend_requests WHERE id = $1")
        .bind(request.id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub enum SendOutcome {
    Requested(FriendRequest),
    /// The target had already asked; the two are now friends.
    Accepted(FriendRequest),
}

pub async fn send_request(db: &PgPool, me: Uuid, other: Uuid) -> AppResult<SendOutcome> {
    if me == other {
        return Err(FriendshipError::SelfRequest.into());
    }

    let mut tx = db.begin().await?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(other)
        .fetch_one(&mut *tx)
        .await?;
    if !exists {
        return Err(AppError::NotFound("User not found".into()));
    }

    lock_pair(&mut tx, me, other).await?;
    let (state, incoming) = state_in_tx(&mut tx, me, other).await?;
    transition(state, FriendAction::Send)?;

    let outcome = match incoming {
        Some(request) => {
            link(&mut tx, &request).await?;
            SendOutcome::Accepted(request)
        }
        None => {
            let request: FriendRequest = sqlx::query_as(
                r#"INSERT INTO friend_requests (id, from_id, to_id, status, created_at)
                VALUES ($1, $2, $3, 'pending', NOW()) RETURNING *"#,
            )
            .bind(Uuid::new_v4())
            .bind(me)
            .bind(other)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if db::is_unique_violation(&e) {
                    FriendshipError::AlreadyRequested.into()
                } else {
                    AppError::from(e)
                }
            })?;
            SendOutcome::Requested(request)
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

async fn lock_request(
    tx: &mut Transaction<'_, Postgres>,
    request_id: Uuid,
) -> AppResult<FriendRequest> {
    sqlx::query_as::<_, FriendRequest>(
        "SELECT * FROM friend_requests WHERE id = $1 AND status = 'pending' FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| FriendshipError::NoSuchRequest.into())
}

fn state_for(request: &FriendRequest, me: Uuid) -> Result<FriendshipState, FriendshipError> {
    if request.to_id == me {
        Ok(FriendshipState::PendingIncoming)
    } else if request.from_id == me {
        Ok(FriendshipState::PendingOutgoing)
    } else {
        Err(FriendshipError::NoSuchRequest)
    }
}

/// Accepts, rejects or cancels an open request on behalf of `me`.
pub async fn answer_request(
    db: &PgPool,
    me: Uuid,
    request_id: Uuid,
    action: FriendAction,
) -> AppResult<FriendRequest> {
    let mut tx = db.begin().await?;
    let pair: Option<(Uuid, Uuid)> =
        sqlx::query_as("SELECT from_id, to_id FROM friend_requests WHERE id = $1")
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await?;
    if let Some((from, to)) = pair {
        lock_pair(&mut tx, from, to).await?;
    }
    let request = lock_request(&mut tx, request_id).await?;
    let next = transition(state_for(&request, me)?, action)?;

    if next == FriendshipState::Friends {
        link(&mut tx, &request).await?;
    } else {
        sqlx::query("DELETE FROM friend_requests WHERE id = $1")
            .bind(request.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(request)
}

pub async fn remove_friend(db: &PgPool, me: Uuid, other: Uuid) -> AppResult<()> {
    let mut tx = db.begin().await?;
    lock_pair(&mut tx, me, other).await?;
    let (state, _) = state_in_tx(&mut tx, me, other).await?;
    transition(state, FriendAction::Remove)?;

    for (owner, friend) in [(me, other), (other, me)] {
        sqlx::query(
            "UPDATE friend_lists SET friend_ids = array_remove(friend_ids, $2) WHERE user_id = $1",
        )
        .bind(owner)
        .bind(friend)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn friend_ids(db: &PgPool, user_id: Uuid) -> AppResult<Vec<Uuid>> {
    let list: Option<FriendList> = sqlx::query_as("SELECT * FROM friend_lists WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(list.map(|l| l.friend_ids).unwrap_or_default())
}

pub async fn list_friends(db: &PgPool, user_id: Uuid) -> AppResult<Vec<User>> {
    let users: Vec<User> = sqlx::query_as(
        r#"SELECT u.* FROM users u
        JOIN friend_lists f ON u.id = ANY(f.friend_ids)
        WHERE f.user_id = $1
        ORDER BY u.display_name"#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use FriendAction as A;
    use FriendshipState as S;

    #[test]
    fn request_then_accept() {
        let sent = transition(S::None, A::Send).unwrap();
        assert_eq!(sent, S::PendingOutgoing);
        // The recipient sees the same request as incoming.
        assert_eq!(transition(S::PendingIncoming, A::Accept), Ok(S::Friends));
    }

    #[test]
    fn reject_and_cancel_return_to_none() {
        assert_eq!(transition(S::PendingIncoming, A::Reject), Ok(S::None));
        assert_eq!(transition(S::PendingOutgoing, A::Cancel), Ok(S::None));
        assert_eq!(transition(S::Friends, A::Remove), Ok(S::None));
    }

    #[test]
    fn crossing_requests_become_friends() {
        assert_eq!(transition(S::PendingIncoming, A::Send), Ok(S::Friends));
    }

    #[test]
    fn sender_cannot_answer_own_request() {
        assert_eq!(
            transition(S::PendingOutgoing, A::Accept),
            Err(FriendshipError::NotRecipient)
        );
        assert_eq!(
            transition(S::PendingOutgoing, A::Reject),
            Err(FriendshipError::NotRecipient)
        );
    }

    #[test]
    fn duplicates_are_rejected() {
        assert_eq!(
            transition(S::PendingOutgoing, A::Send),
            Err(FriendshipError::AlreadyRequested)
        );
        assert_eq!(
            transition(S::Friends, A::Send),
            Err(FriendshipError::AlreadyFriends)
        );
        assert_eq!(
            transition(S::None, A::Remove),
            Err(FriendshipError::NotFriends)
        );
        assert_eq!(
            transition(S::None, A::Accept),
            Err(FriendshipError::NoSuchRequest)
        );
    }

    #[test]
    fn friendship_outranks_stale_requests() {
        assert_eq!(FriendshipState::between(true, true, true), S::Friends);
        assert_eq!(FriendshipState::between(false, true, true), S::PendingIncoming);
        assert_eq!(FriendshipState::between(false, true, false), S::PendingOutgoing);
        assert_eq!(FriendshipState::between(false, false, false), S::None);
    }

    #[test]
    fn request_side_is_derived_from_ids() {
        let me = Uuid::from_u128(1);
        let other = Uuid::from_u128(2);
        let request = FriendRequest {
            id: Uuid::from_u128(9),
            from_id: other,
            to_id: me,
            status: "pending".into(),
            created_at: chrono::Utc::now(),
        };
        assert_eq!(state_for(&request, me), Ok(S::PendingIncoming));
        assert_eq!(state_for(&request, other), Ok(S::PendingOutgoing));
        assert_eq!(
            state_for(&request, Uuid::from_u128(3)),
            Err(FriendshipError::NoSuchRequest)
        );
    }
}
