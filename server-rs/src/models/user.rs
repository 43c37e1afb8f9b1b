use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::event::PlayerEntry;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub phone: Option<String>,
    pub level: String,
    pub sports: Vec<String>,
    pub is_admin: bool,
    pub is_banned: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Snapshot embedded in an event's player list.
    pub fn player_entry(&self) -> PlayerEntry {
        PlayerEntry {
            id: self.id,
            name: self.display_name.clone(),
            photo: self.photo_url.clone(),
        }
    }

    pub fn role(&self) -> Option<&'static str> {
        self.is_admin.then_some("admin")
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub phone: Option<String>,
    pub level: Option<String>,
    #[serde(default)]
    pub sports: Vec<String>,
    #[serde(rename = "photoUrl")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "photoUrl")]
    pub photo_url: Option<String>,
    pub phone: Option<String>,
    pub level: Option<String>,
    pub sports: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct UserPublic {
    pub id: Uuid,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "photoUrl")]
    pub photo_url: Option<String>,
    pub level: String,
    pub sports: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserPublic {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            display_name: u.display_name.clone(),
            photo_url: u.photo_url.clone(),
            level: u.level.clone(),
            sports: u.sports.clone(),
            created_at: u.created_at,
        }
    }
}

/// Profile as seen by its owner or an admin.
#[derive(Debug, Serialize)]
pub struct UserPrivate {
    #[serde(flatten)]
    pub public: UserPublic,
    pub email: String,
    pub phone: Option<String>,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
    #[serde(rename = "isBanned")]
    pub is_banned: bool,
    #[serde(rename = "emailVerified")]
    pub email_verified: bool,
}

impl From<&User> for UserPrivate {
    fn from(u: &User) -> Self {
        Self {
            public: UserPublic::from(u),
            email: u.email.clone(),
            phone: u.phone.clone(),
            is_admin: u.is_admin,
            is_banned: u.is_banned,
            email_verified: u.email_verified,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmailVerification {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}
