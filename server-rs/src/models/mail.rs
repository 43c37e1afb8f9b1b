use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Row in the `mail` table, drained by the external mail sender.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MailMessage {
    pub id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub html: String,
    pub template: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}
