use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::{MailConfig, MailingListConfig};
use crate::error::{AppError, AppResult};
use crate::models::mail::MailMessage;

/// Outbound emails the service knows how to render.
#[derive(Debug, Clone)]
pub enum EmailTemplate {
    Verification { name: String, link: String },
    Welcome { name: String },
    EventInvite { inviter: String, event_title: String, link: String },
    JoinConfirmation { event_title: String, when: String, link: String },
    EventUpdated { event_title: String, link: String },
    EventCancelled { event_title: String },
}

impl EmailTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            EmailTemplate::Verification { .. } => "verification",
            EmailTemplate::Welcome { .. } => "welcome",
            EmailTemplate::EventInvite { .. } => "invitation",
            EmailTemplate::JoinConfirmation { .. } => "join_confirmation",
            EmailTemplate::EventUpdated { .. } => "event_update",
            EmailTemplate::EventCancelled { .. } => "event_cancelled",
        }
    }

    pub fn subject(&self) -> String {
        match self {
            EmailTemplate::Verification { .. } => "Verify your WeTeamUp email".to_string(),
            EmailTemplate::Welcome { .. } => "Welcome to WeTeamUp!".to_string(),
            EmailTemplate::EventInvite { inviter, .. } => {
                format!("{} invited you to play", inviter)
            }
            EmailTemplate::JoinConfirmation { event_title, .. } => {
                format!("You're in: {}", event_title)
            }
            EmailTemplate::EventUpdated { event_title, .. } => {
                format!("{} has been updated", event_title)
            }
            EmailTemplate::EventCancelled { event_title } => {
                format!("{} has been cancelled", event_title)
            }
        }
    }

    pub fn html(&self) -> String {
        match self {
            EmailTemplate::Verification { name, link } => format!(
                "<p>Hi {},</p><p>Confirm your email address to start joining matches.</p><p><a href=\"{}\">Verify email</a></p>",
                name, link
            ),
            EmailTemplate::Welcome { name } => format!(
                "<p>Hi {},</p><p>Welcome to WeTeamUp. Find a match near you or create your own.</p>",
                name
            ),
            EmailTemplate::EventInvite { inviter, event_title, link } => format!(
                "<p>{} invited you to <strong>{}</strong>.</p><p><a href=\"{}\">See the event</a></p>",
                inviter, event_title, link
            ),
            EmailTemplate::JoinConfirmation { event_title, when, link } => format!(
                "<p>You joined <strong>{}</strong> on {}.</p><p><a href=\"{}\">Event details</a></p>",
                event_title, when, link
            ),
            EmailTemplate::EventUpdated { event_title, link } => format!(
                "<p>The organizer changed <strong>{}</strong>.</p><p><a href=\"{}\">Check the new details</a></p>",
                event_title, link
            ),
            EmailTemplate::EventCancelled { event_title } => format!(
                "<p><strong>{}</strong> was cancelled by the organizer.</p>",
                event_title
            ),
        }
    }

    fn data(&self) -> Value {
        match self {
            EmailTemplate::Verification { name, link } => json!({"name": name, "link": link}),
            EmailTemplate::Welcome { name } => json!({"name": name}),
            EmailTemplate::EventInvite { inviter, event_title, link } => {
                json!({"inviter": inviter, "eventTitle": event_title, "link": link})
            }
            EmailTemplate::JoinConfirmation { event_title, when, link } => {
                json!({"eventTitle": event_title, "when": when, "link": link})
            }
            EmailTemplate::EventUpdated { event_title, link } => {
                json!({"eventTitle": event_title, "link": link})
            }
            EmailTemplate::EventCancelled { event_title } => json!({"eventTitle": event_title}),
        }
    }
}

/// Writes a message to the `mail` table, which an external sender drains.
pub async fn enqueue(db: &sqlx::PgPool, to: &str, template: &EmailTemplate) -> AppResult<MailMessage> {
    let message = sqlx::query_as::<_, MailMessage>(
        r#"INSERT INTO mail (id, recipient, subject, html, template, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(to)
    .bind(template.subject())
    .bind(template.html())
    .bind(template.name())
    .fetch_one(db)
    .await?;
    Ok(message)
}

/// Client for the self-hosted `/api/send-email` endpoint.
#[derive(Clone)]
pub struct EmailClient {
    base_url: String,
    from: String,
    client: reqwest::Client,
}

impl EmailClient {
    pub fn new(config: &MailConfig) -> Option<Self> {
        if config.api_url.is_empty() {
            return None;
        }
        Some(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            from: config.from_address.clone(),
            client: reqwest::Client::new(),
        })
    }

    pub async fn send(&self, to: &str, template: &EmailTemplate) -> AppResult<()> {
        let url = format!("{}/api/send-email", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "from": self.from,
                "to": to,
                "template": template.name(),
                "subject": template.subject(),
                "html": template.html(),
                "data": template.data(),
            }))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Email request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Email API error: {} - {}",
                status, text
            )));
        }
        Ok(())
    }
}

/// Marketing-automation client used for the welcome series.
#[derive(Clone)]
pub struct MailingListClient {
    api_url: String,
    api_key: String,
    welcome_group: String,
    client: reqwest::Client,
}

impl MailingListClient {
    pub fn new(config: &MailingListConfig) -> Option<Self> {
        if config.api_key.is_empty() {
            return None;
        }
        Some(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            welcome_group: config.welcome_group.clone(),
            client: reqwest::Client::new(),
        })
    }

    pub async fn subscribe(&self, email: &str, name: &str) -> AppResult<()> {
        let mut body = json!({
            "email": email,
            "fields": { "name": name },
        });
        if !self.welcome_group.is_empty() {
            body["groups"] = json!([self.welcome_group]);
        }

        let resp = self
            .client
            .post(format!("{}/subscribers", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Mailing list request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Mailing list error: {} - {}",
                status, text
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_mentions_inviter_and_link() {
        let t = EmailTemplate::EventInvite {
            inviter: "Marta".into(),
            event_title: "Friday doubles".into(),
            link: "https://weteamup.app/event/1".into(),
        };
        assert_eq!(t.name(), "invitation");
        assert_eq!(t.subject(), "Marta invited you to play");
        assert!(t.html().contains("Friday doubles"));
        assert!(t.html().contains("https://weteamup.app/event/1"));
    }

    #[test]
    fn clients_are_disabled_without_settings() {
        let mail = MailConfig {
            api_url: String::new(),
            from_address: "x@y.z".into(),
            verification_expiry_secs: 60,
        };
        assert!(EmailClient::new(&mail).is_none());

        let list = MailingListConfig {
            api_url: "https://example.test".into(),
            api_key: String::new(),
            welcome_group: String::new(),
        };
        assert!(MailingListClient::new(&list).is_none());
    }
}
