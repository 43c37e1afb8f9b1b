use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FriendList {
    pub user_id: Uuid,
    pub friend_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub id: Uuid,
    pub from_id: Uuid,
    pub to_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SendFriendRequest {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}
