use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    EventInvite,
    PlayerJoined,
    PlayerLeft,
    FriendRequest,
    FriendAccepted,
    EventUpdated,
    EventCancelled,
    MemoryLiked,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::EventInvite => "event_invite",
            NotificationKind::PlayerJoined => "player_joined",
            NotificationKind::PlayerLeft => "player_left",
            NotificationKind::FriendRequest => "friend_request",
            NotificationKind::FriendAccepted => "friend_accepted",
            NotificationKind::EventUpdated => "event_updated",
            NotificationKind::EventCancelled => "event_cancelled",
            NotificationKind::MemoryLiked => "memory_liked",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub kind: String,
    pub user_id: Uuid,
    pub event_id: Option<Uuid>,
    pub event_title: Option<String>,
    pub created_by: Uuid,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification about to be written.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub user_id: Uuid,
    pub event_id: Option<Uuid>,
    pub event_title: Option<String>,
    pub created_by: Uuid,
}
