use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SavedEvent {
    pub id: String,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Bookmarks are keyed by user and event so saving twice is a no-op.
pub fn saved_event_id(user_id: Uuid, event_id: Uuid) -> String {
    format!("{}_{}", user_id, event_id)
}
