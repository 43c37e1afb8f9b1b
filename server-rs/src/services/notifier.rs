//! Best-effort side channels that follow a successful primary write.
//!
//! Nothing here returns an error to the caller: failures are logged and
//! dropped, and the write that triggered them stays committed.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::notification::NewNotification;
use crate::services::mailer::{self, EmailClient, EmailTemplate};

#[derive(Clone)]
pub struct Notifier {
    db: PgPool,
    email: Option<EmailClient>,
}

pub async fn insert_notification(db: &PgPool, n: &NewNotification) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO notifications (id, kind, user_id, event_id, event_title, created_by, read, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, false, NOW())"#,
    )
    .bind(id)
    .bind(n.kind.as_str())
    .bind(n.user_id)
    .bind(n.event_id)
    .bind(&n.event_title)
    .bind(n.created_by)
    .execute(db)
    .await?;
    Ok(id)
}

impl Notifier {
    pub fn new(db: PgPool, email: Option<EmailClient>) -> Self {
        Self { db, email }
    }

    pub async fn notify(&self, n: NewNotification) {
        if let Err(e) = insert_notification(&self.db, &n).await {
            tracing::warn!(
                kind = n.kind.as_str(),
                user_id = %n.user_id,
                "Failed to create notification: {e}"
            );
        }
    }

    /// Sends `template` to every recipient except its author.
    pub async fn notify_all(&self, recipients: &[Uuid], template: &NewNotification) {
        for user_id in recipients.iter().filter(|id| **id != template.created_by) {
            self.notify(NewNotification {
                user_id: *user_id,
                ..template.clone()
            })
            .await;
        }
    }

    /// Direct send through the email API, falling back to the mail queue
    /// when the API is not configured or the call fails. Runs detached.
    pub fn email(&self, to: String, template: EmailTemplate) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Some(client) = &this.email {
                match client.send(&to, &template).await {
                    Ok(()) => return,
                    Err(e) => tracing::warn!(
                        template = template.name(),
                        "Email API send failed, queueing instead: {e}"
                    ),
                }
            }
            this.enqueue(&to, &template).await;
        });
    }

    /// Queue-only delivery. Runs detached.
    pub fn queue_email(&self, to: String, template: EmailTemplate) {
        let this = self.clone();
        tokio::spawn(async move {
            this.enqueue(&to, &template).await;
        });
    }

    async fn enqueue(&self, to: &str, template: &EmailTemplate) {
        match mailer::enqueue(&self.db, to, template).await {
            Ok(message) => tracing::debug!(mail_id = %message.id, template = template.name(), "Email queued"),
            Err(e) => tracing::warn!(template = template.name(), "Failed to queue email: {e}"),
        }
    }
}
