use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: Uuid,
    pub event_id: Uuid,
    pub image_url: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub like_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMemoryRequest {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub description: Option<String>,
}
