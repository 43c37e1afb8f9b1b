use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::models::friendship::{FriendRequest, SendFriendRequest};
use crate::models::notification::{NewNotification, NotificationKind};
use crate::models::user::UserPublic;
use crate::services::friendships::{self, FriendAction, SendOutcome};
use crate::AppState;

pub async fn list_friends(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    let friends = friendships::list_friends(&state.db, user.id).await?;
    let friends: Vec<UserPublic> = friends.iter().map(UserPublic::from).collect();
    Ok(Json(json!({ "friends": friends })))
}

pub async fn friend_requests(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Value>> {
    let incoming: Vec<(Uuid, Uuid, String, Option<String>, DateTime<Utc>)> = sqlx::query_as(
        r#"SELECT r.id, u.id, u.display_name, u.photo_url, r.created_at
        FROM friend_requests r JOIN users u ON u.id = r.from_id
        WHERE r.to_id = $1 AND r.status = 'pending'
        ORDER BY r.created_at DESC"#,
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let outgoing: Vec<(Uuid, Uuid, String, Option<String>, DateTime<Utc>)> = sqlx::query_as(
        r#"SELECT r.id, u.id, u.display_name, u.photo_url, r.created_at
        FROM friend_requests r JOIN users u ON u.id = r.to_id
        WHERE r.from_id = $1 AND r.status = 'pending'
        ORDER BY r.created_at DESC"#,
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let render = |rows: Vec<(Uuid, Uuid, String, Option<String>, DateTime<Utc>)>| -> Vec<Value> {
        rows.into_iter()
            .map(|(id, uid, name, photo, created)| {
                json!({"id": id, "userId": uid, "displayName": name, "photoUrl": photo, "createdAt": created})
            })
            .collect()
    };

    Ok(Json(json!({
        "incoming": render(incoming),
        "outgoing": render(outgoing),
    })))
}

pub async fn send_request(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<SendFriendRequest>,
) -> AppResult<Json<Value>> {
    let outcome = friendships::send_request(&state.db, user.id, body.user_id).await?;

    let (request, accepted) = match outcome {
        SendOutcome::Requested(r) => (r, false),
        SendOutcome::Accepted(r) => (r, true),
    };
    let (kind, recipient) = if accepted {
        (NotificationKind::FriendAccepted, request.from_id)
    } else {
        (NotificationKind::FriendRequest, request.to_id)
    };
    state
        .notifier
        .notify(NewNotification {
            kind,
            user_id: recipient,
            event_id: None,
            event_title: None,
            created_by: user.id,
        })
        .await;

    tracing::info!(from = %user.id, to = %body.user_id, accepted, "Friend request sent");
    let status = if accepted { "friends" } else { "pending" };
    Ok(Json(json!({ "request": request, "status": status })))
}

async fn answer(state: &AppState, user: &AuthUser, id: Uuid, action: FriendAction) -> AppResult<FriendRequest> {
    friendships::answer_request(&state.db, user.id, id, action).await
}

pub async fn accept_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let request = answer(&state, &user, id, FriendAction::Accept).await?;
    state
        .notifier
        .notify(NewNotification {
            kind: NotificationKind::FriendAccepted,
            user_id: request.from_id,
            event_id: None,
            event_title: None,
            created_by: user.id,
        })
        .await;
    Ok(Json(json!({ "status": "friends", "friendId": request.from_id })))
}

pub async fn reject_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    answer(&state, &user, id, FriendAction::Reject).await?;
    Ok(Json(json!({ "status": "none" })))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    answer(&state, &user, id, FriendAction::Cancel).await?;
    Ok(Json(json!({ "status": "none" })))
}

pub async fn remove_friend(
    State(state): State<AppState>,
    user: AuthUser,
    Path(friend_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    friendships::remove_friend(&state.db, user.id, friend_id).await?;
    Ok(Json(json!({ "status": "none" })))
}

pub async fn friendship_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(other): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let status = friendships::state_between(&state.db, user.id, other).await?;
    Ok(Json(json!({ "status": status })))
}
