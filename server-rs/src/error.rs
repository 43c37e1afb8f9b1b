use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::services::friendships::FriendshipError;
use crate::services::membership::MembershipError;
use crate::services::wizard::WizardError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error(transparent)]
    Friendship(#[from] FriendshipError),

    #[error(transparent)]
    Wizard(#[from] WizardError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable code for the domain failures clients branch on.
    fn code(&self) -> Option<&'static str> {
        match self {
            AppError::Membership(e) => Some(e.code()),
            AppError::Friendship(e) => Some(e.code()),
            AppError::Wizard(_) => Some("VALIDATION_FAILED"),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Wizard(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Membership(MembershipError::NotAMember) => StatusCode::NOT_FOUND,
            AppError::Membership(MembershipError::WrongPassword) => StatusCode::FORBIDDEN,
            AppError::Membership(_) => StatusCode::CONFLICT,
            AppError::Friendship(FriendshipError::NoSuchRequest) => StatusCode::NOT_FOUND,
            AppError::Friendship(FriendshipError::NotRecipient) => StatusCode::FORBIDDEN,
            AppError::Friendship(FriendshipError::SelfRequest) => StatusCode::BAD_REQUEST,
            AppError::Friendship(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::RateLimited => "Too many requests".to_string(),
            AppError::Membership(e) => e.to_string(),
            AppError::Friendship(e) => e.to_string(),
            AppError::Wizard(e) => e.to_string(),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                "Internal server error".to_string()
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {e}");
                "Internal server error".to_string()
            }
            AppError::Jwt(_) => "Invalid token".to_string(),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                "Internal server error".to_string()
            }
        };

        let mut body = json!({ "error": message });
        if let Some(code) = self.code() {
            body["code"] = json!(code);
        }
        if let AppError::Wizard(e) = &self {
            body["step"] = json!(e.step);
        }
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::wizard::{WizardError, WizardStep};

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn membership_errors_carry_codes() {
        let (status, body) = body_json(MembershipError::EventFull.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "EVENT_FULL");

        let (status, body) = body_json(MembershipError::NotAMember.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_A_MEMBER");
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let (status, body) = body_json(AppError::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("code").is_none());
    }

    #[tokio::test]
    async fn wizard_errors_name_the_step() {
        let err = WizardError::new(WizardStep::Schedule, "End time must be after start time");
        let (status, body) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["step"], "schedule");
        assert_eq!(body["code"], "VALIDATION_FAILED");
    }
}
